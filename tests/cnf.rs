//! Scenario tests for the CNF conversion engine.

use dagcnf::{is_literal, Clause, CnfConverter, CnfError, Node, NodeKind, NodeManager};

/// Runs a conversion and returns (clauses, true placeholder).
fn convert(mngr: &mut NodeManager, root: &Node) -> (Vec<Clause>, Node) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut conv = CnfConverter::new(mngr);
    let out = conv.run(root).expect("conversion failed");
    let tv = conv.true_var().clone();
    (out.into_clauses(), tv)
}

fn clause(lits: &[&Node]) -> Vec<Node> {
    lits.iter().map(|n| (*n).clone()).collect()
}

fn as_vecs(clauses: &[Clause]) -> Vec<Vec<Node>> {
    clauses.iter().map(|c| c.to_vec()).collect()
}

#[test]
fn and_of_atoms_yields_unit_clauses() {
    let mut mngr = NodeManager::default();
    let a = mngr.bool_symbol("a");
    let b = mngr.bool_symbol("b");
    let root = mngr.and(vec![a.clone(), b.clone()]);
    let (clauses, tv) = convert(&mut mngr, &root);
    assert_eq!(
        as_vecs(&clauses),
        vec![clause(&[&a]), clause(&[&b]), clause(&[&tv])]
    );
}

#[test]
fn or_of_atoms_yields_one_clause() {
    let mut mngr = NodeManager::default();
    let a = mngr.bool_symbol("a");
    let b = mngr.bool_symbol("b");
    let root = mngr.or(vec![a.clone(), b.clone()]);
    let (clauses, tv) = convert(&mut mngr, &root);
    assert_eq!(as_vecs(&clauses), vec![clause(&[&a, &b]), clause(&[&tv])]);
}

#[test]
fn negated_and_uses_the_negative_rule() {
    let mut mngr = NodeManager::default();
    let a = mngr.bool_symbol("a");
    let b = mngr.bool_symbol("b");
    let na = mngr.not(a.clone());
    let nb = mngr.not(b.clone());
    let conj = mngr.and(vec![a, b]);
    let root = mngr.not(conj);
    let (clauses, tv) = convert(&mut mngr, &root);
    assert_eq!(as_vecs(&clauses), vec![clause(&[&na, &nb]), clause(&[&tv])]);
}

#[test]
fn ite_of_atoms_yields_two_guarded_clauses() {
    let mut mngr = NodeManager::default();
    let c = mngr.bool_symbol("c");
    let t = mngr.bool_symbol("t");
    let e = mngr.bool_symbol("e");
    let nc = mngr.not(c.clone());
    let root = mngr.ite(c.clone(), t.clone(), e.clone());
    let (clauses, tv) = convert(&mut mngr, &root);
    assert_eq!(
        as_vecs(&clauses),
        vec![clause(&[&nc, &t]), clause(&[&c, &e]), clause(&[&tv])]
    );
}

#[test]
fn implies_yields_one_clause() {
    let mut mngr = NodeManager::default();
    let a = mngr.bool_symbol("a");
    let b = mngr.bool_symbol("b");
    let na = mngr.not(a.clone());
    let root = mngr.implies(a.clone(), b.clone());
    let (clauses, tv) = convert(&mut mngr, &root);
    assert_eq!(as_vecs(&clauses), vec![clause(&[&na, &b]), clause(&[&tv])]);
}

#[test]
fn nand_and_nor_are_de_morgan_duals() {
    let mut mngr = NodeManager::default();
    let a = mngr.bool_symbol("a");
    let b = mngr.bool_symbol("b");
    let na = mngr.not(a.clone());
    let nb = mngr.not(b.clone());

    let nand = mngr.nand(vec![a.clone(), b.clone()]);
    let (clauses, tv) = convert(&mut mngr, &nand);
    assert_eq!(as_vecs(&clauses), vec![clause(&[&na, &nb]), clause(&[&tv])]);

    let nor = mngr.nor(vec![a, b]);
    let (clauses, tv) = convert(&mut mngr, &nor);
    assert_eq!(
        as_vecs(&clauses),
        vec![clause(&[&na]), clause(&[&nb]), clause(&[&tv])]
    );
}

#[test]
fn binary_xor_gives_both_parity_clauses() {
    let mut mngr = NodeManager::default();
    let a = mngr.bool_symbol("a");
    let b = mngr.bool_symbol("b");
    let na = mngr.not(a.clone());
    let nb = mngr.not(b.clone());
    let root = mngr.xor(vec![a.clone(), b.clone()]);
    let (clauses, tv) = convert(&mut mngr, &root);
    assert_eq!(
        as_vecs(&clauses),
        vec![clause(&[&a, &b]), clause(&[&na, &nb]), clause(&[&tv])]
    );
}

#[test]
fn ternary_xor_expands_to_odd_parity() {
    let mut mngr = NodeManager::default();
    let a = mngr.bool_symbol("a");
    let b = mngr.bool_symbol("b");
    let c = mngr.bool_symbol("c");
    let root = mngr.xor(vec![a.clone(), b.clone(), c.clone()]);
    let (clauses, tv) = convert(&mut mngr, &root);
    // four parity clauses plus the placeholder unit
    assert_eq!(clauses.len(), 5);
    assert_eq!(clauses[4].as_slice(), &[tv]);
    for cl in &clauses[..4] {
        assert_eq!(cl.len(), 3);
    }
}

#[test]
fn truth_constants_convert_to_the_placeholder() {
    let mut mngr = NodeManager::default();
    let a = mngr.bool_symbol("a");
    let tt = mngr.ttrue();
    let ff = mngr.ffalse();
    let root = mngr.and(vec![tt, ff, a.clone()]);
    let (clauses, tv) = convert(&mut mngr, &root);
    let ntv = clauses[1][0].clone();
    assert_eq!(*ntv.kind(), NodeKind::Not);
    assert_eq!(ntv.children()[0], tv);
    assert_eq!(
        as_vecs(&clauses),
        vec![clause(&[&tv]), clause(&[&ntv]), clause(&[&a]), clause(&[&tv])]
    );
}

#[test]
fn shared_multi_clause_set_is_renamed_once() {
    let mut mngr = NodeManager::default();
    let p = mngr.bool_symbol("p");
    let q = mngr.bool_symbol("q");
    let x = mngr.bool_symbol("x");
    let y = mngr.bool_symbol("y");
    // AND(p, q) contributes two clauses; demanded positively by both
    // disjunctions, it must be renamed before either product.
    let shared = mngr.and(vec![p.clone(), q.clone()]);
    let left = mngr.or(vec![x.clone(), shared.clone()]);
    let right = mngr.or(vec![y.clone(), shared.clone()]);
    let root = mngr.and(vec![left, right]);

    let (clauses, tv) = convert(&mut mngr, &root);

    // the surrogate is deterministically keyed by the shared node's id
    let s = mngr.symbol(format!("cnf{{{}}}", shared.id()), 0, 0);
    let ns = mngr.not(s.clone());
    assert_eq!(
        as_vecs(&clauses),
        vec![
            clause(&[&x, &s]),
            clause(&[&y, &s]),
            clause(&[&tv]),
            clause(&[&p, &ns]),
            clause(&[&q, &ns]),
        ]
    );
}

#[test]
fn child_of_doubly_shared_node_counts_as_shared() {
    let mut mngr = NodeManager::default();
    let p = mngr.bool_symbol("p");
    let q = mngr.bool_symbol("q");
    let x = mngr.bool_symbol("x");
    let a = mngr.bool_symbol("a");
    let b = mngr.bool_symbol("b");
    // OR(x, AND(p, q)) is demanded twice. The second scan of the
    // disjunction descends once more, so the inner conjunction counts as
    // shared and its two-clause set is renamed; the disjunction itself
    // collapses to a single clause and is not.
    let m = mngr.and(vec![p.clone(), q.clone()]);
    let shared = mngr.or(vec![x.clone(), m.clone()]);
    let left = mngr.and(vec![a.clone(), shared.clone()]);
    let right = mngr.and(vec![b.clone(), shared.clone()]);
    let root = mngr.and(vec![left, right]);

    let (clauses, tv) = convert(&mut mngr, &root);

    let s = mngr.symbol(format!("cnf{{{}}}", m.id()), 0, 0);
    let ns = mngr.not(s.clone());
    assert_eq!(
        as_vecs(&clauses),
        vec![
            clause(&[&a]),
            clause(&[&x, &s]),
            clause(&[&b]),
            clause(&[&x, &s]),
            clause(&[&tv]),
            clause(&[&p, &ns]),
            clause(&[&q, &ns]),
        ]
    );
    let or_surrogate = format!("cnf{{{}}}", shared.id());
    assert!(!clauses
        .iter()
        .flatten()
        .any(|lit| matches!(lit.kind(), NodeKind::Symbol(name) if *name == or_surrogate)));
}

#[test]
fn shared_single_clause_set_is_not_renamed() {
    let mut mngr = NodeManager::default();
    let p = mngr.bool_symbol("p");
    let q = mngr.bool_symbol("q");
    // OR(p, q) is a single clause: sharing alone does not trigger
    // renaming, only a multi-clause set does.
    let shared = mngr.or(vec![p.clone(), q.clone()]);
    let a = mngr.bool_symbol("a");
    let b = mngr.bool_symbol("b");
    let left = mngr.and(vec![a.clone(), shared.clone()]);
    let right = mngr.and(vec![b.clone(), shared.clone()]);
    let root = mngr.and(vec![left, right]);
    let (clauses, tv) = convert(&mut mngr, &root);
    assert_eq!(
        as_vecs(&clauses),
        vec![
            clause(&[&a]),
            clause(&[&p, &q]),
            clause(&[&b]),
            clause(&[&p, &q]),
            clause(&[&tv]),
        ]
    );
}

#[test]
fn sibling_with_multi_clause_set_forces_renaming() {
    let mut mngr = NodeManager::default();
    let p = mngr.bool_symbol("p");
    let q = mngr.bool_symbol("q");
    let r = mngr.bool_symbol("r");
    let t = mngr.bool_symbol("t");
    let left = mngr.and(vec![p.clone(), q.clone()]);
    let right = mngr.and(vec![r.clone(), t.clone()]);
    // both operands of the disjunction are two-clause sets; the first
    // forces the second to rename itself, so the product stays linear
    let root = mngr.or(vec![left, right.clone()]);
    let (clauses, tv) = convert(&mut mngr, &root);

    let s = mngr.symbol(format!("cnf{{{}}}", right.id()), 0, 0);
    let ns = mngr.not(s.clone());
    assert_eq!(
        as_vecs(&clauses),
        vec![
            clause(&[&p, &s]),
            clause(&[&q, &s]),
            clause(&[&tv]),
            clause(&[&r, &ns]),
            clause(&[&t, &ns]),
        ]
    );
}

#[test]
fn node_renamed_in_both_polarities_shares_one_surrogate() {
    let mut mngr = NodeManager::default();
    let p = mngr.bool_symbol("p");
    let q = mngr.bool_symbol("q");
    let a = mngr.bool_symbol("a");
    let b = mngr.bool_symbol("b");
    let x = mngr.bool_symbol("x");
    let y = mngr.bool_symbol("y");
    // XOR(p, q) has two clauses in both polarities; two positive and two
    // negative demands rename both sides onto the same surrogate.
    let shared = mngr.xor(vec![p.clone(), q.clone()]);
    let o1 = mngr.or(vec![a.clone(), shared.clone()]);
    let o2 = mngr.or(vec![b.clone(), shared.clone()]);
    let i1 = mngr.implies(shared.clone(), x.clone());
    let i2 = mngr.implies(shared.clone(), y.clone());
    let root = mngr.and(vec![o1, o2, i1, i2]);
    let (clauses, tv) = convert(&mut mngr, &root);

    let s = mngr.symbol(format!("cnf{{{}}}", shared.id()), 0, 0);
    let ns = mngr.not(s.clone());
    let np = mngr.not(p.clone());
    let nq = mngr.not(q.clone());
    assert_eq!(
        as_vecs(&clauses),
        vec![
            clause(&[&a, &s]),
            clause(&[&b, &s]),
            clause(&[&ns, &x]),
            clause(&[&ns, &y]),
            clause(&[&tv]),
            // positive definition: clauses of XOR with the negated
            // surrogate appended
            clause(&[&p, &q, &ns]),
            clause(&[&np, &nq, &ns]),
            // negative definition: clauses of not-XOR with the surrogate
            // appended
            clause(&[&np, &q, &s]),
            clause(&[&p, &nq, &s]),
        ]
    );
}

#[test]
fn term_ite_is_renamed_with_two_guarded_fragments() {
    let mut mngr = NodeManager::default();
    let c = mngr.bool_symbol("c");
    let nc = mngr.not(c.clone());
    let x = mngr.symbol("x", 0, 8);
    let y = mngr.symbol("y", 0, 8);
    let z = mngr.symbol("z", 0, 8);
    let ite = mngr.ite(c.clone(), x.clone(), y.clone());
    let root = mngr.eq(ite.clone(), z.clone());
    let (clauses, tv) = convert(&mut mngr, &root);

    let s = mngr.symbol(format!("cnf{{{}}}", ite.id()), 0, 8);
    assert_eq!(s.value_width(), 8);
    let s_is_x = mngr.eq(s.clone(), x);
    let s_is_y = mngr.eq(s.clone(), y);
    let flat = mngr.eq(s.clone(), z);
    assert_eq!(
        as_vecs(&clauses),
        vec![
            clause(&[&flat]),
            clause(&[&tv]),
            clause(&[&nc, &s_is_x]),
            clause(&[&c, &s_is_y]),
        ]
    );
}

#[test]
fn nested_term_ites_flatten_inside_out() {
    let mut mngr = NodeManager::default();
    let c1 = mngr.bool_symbol("c1");
    let c2 = mngr.bool_symbol("c2");
    let x = mngr.symbol("x", 0, 4);
    let y = mngr.symbol("y", 0, 4);
    let z = mngr.symbol("z", 0, 4);
    let inner = mngr.ite(c2.clone(), x.clone(), y.clone());
    let sum = mngr.bv_add(vec![inner.clone(), z.clone()]);
    let outer = mngr.ite(c1.clone(), sum.clone(), z.clone());
    let w = mngr.symbol("w", 0, 4);
    let root = mngr.eq(outer.clone(), w.clone());
    let (clauses, _) = convert(&mut mngr, &root);

    // both case-splits surface as surrogates; the rebuilt sum refers to
    // the inner surrogate, never to the original ite node
    let s_inner = mngr.symbol(format!("cnf{{{}}}", inner.id()), 0, 4);
    let s_outer = mngr.symbol(format!("cnf{{{}}}", outer.id()), 0, 4);
    let flat_sum = mngr.bv_add(vec![s_inner.clone(), z.clone()]);
    let outer_then = mngr.eq(s_outer.clone(), flat_sum);
    let root_flat = mngr.eq(s_outer.clone(), w);
    assert_eq!(clauses[0].as_slice(), &[root_flat]);
    assert!(clauses
        .iter()
        .any(|cl| cl.iter().any(|lit| *lit == outer_then)));
    // two case-splits, two guarded fragments each
    assert_eq!(clauses.len(), 6);
}

#[test]
fn surrogates_of_distinct_nodes_are_distinct() {
    let mut mngr = NodeManager::default();
    let p = mngr.bool_symbol("p");
    let q = mngr.bool_symbol("q");
    let r = mngr.bool_symbol("r");
    let t = mngr.bool_symbol("t");
    let u = mngr.bool_symbol("u");
    let v = mngr.bool_symbol("v");
    let left = mngr.and(vec![p, q]);
    let mid = mngr.and(vec![r, t]);
    let right = mngr.and(vec![u, v]);
    // the first two-clause operand forces every later operand to rename,
    // so two distinct surrogates appear
    let root = mngr.or(vec![left, mid.clone(), right.clone()]);
    let (clauses, _) = convert(&mut mngr, &root);

    let mut surrogates: Vec<Node> = clauses
        .iter()
        .flat_map(|cl| cl.iter())
        .map(|lit| match lit.kind() {
            NodeKind::Not => lit.children()[0].clone(),
            _ => lit.clone(),
        })
        .filter(|at| matches!(at.kind(), NodeKind::Symbol(name) if name.starts_with("cnf{")))
        .collect();
    surrogates.sort_by_key(|n| n.id());
    surrogates.dedup();
    let s_mid = mngr.symbol(format!("cnf{{{}}}", mid.id()), 0, 0);
    let s_right = mngr.symbol(format!("cnf{{{}}}", right.id()), 0, 0);
    assert_eq!(surrogates, vec![s_mid, s_right]);
    // keyed by node id, so re-deriving the names must match
    for s in &surrogates {
        let name = match s.kind() {
            NodeKind::Symbol(name) => name.clone(),
            _ => unreachable!(),
        };
        let id: usize = name[4..name.len() - 1].parse().unwrap();
        assert!(id < s.id());
    }
}

#[test]
fn every_output_literal_is_atomic() {
    let mut mngr = NodeManager::default();
    let p = mngr.bool_symbol("p");
    let q = mngr.bool_symbol("q");
    let r = mngr.bool_symbol("r");
    let c = mngr.bool_symbol("c");
    let x = mngr.symbol("x", 0, 8);
    let y = mngr.symbol("y", 0, 8);
    let ite = mngr.ite(c.clone(), x, y);
    let z = mngr.symbol("z", 0, 8);
    let pred = mngr.eq(ite, z);
    let xor = mngr.xor(vec![p.clone(), q.clone()]);
    let imp = mngr.implies(xor, r.clone());
    let root = mngr.and(vec![imp, pred]);
    let (clauses, _) = convert(&mut mngr, &root);
    for cl in &clauses {
        for lit in cl {
            assert!(is_literal(lit), "not a literal: {}", lit);
        }
    }
}

#[test]
fn unsupported_kind_is_reported() {
    let mut mngr = NodeManager::default();
    let x = mngr.symbol("x", 0, 8);
    let y = mngr.symbol("y", 0, 8);
    let root = mngr.bv_add(vec![x, y]);
    let mut conv = CnfConverter::new(&mut mngr);
    match conv.run(&root) {
        Err(CnfError::UnsupportedKind(kind)) => assert_eq!(kind, NodeKind::BvAdd),
        other => panic!(
            "expected an unsupported-kind error, got {:?}",
            other.map(|cs| cs.len())
        ),
    }
}

#[test]
fn conversion_output_is_deterministic() {
    let build = || {
        let mut mngr = NodeManager::default();
        let p = mngr.bool_symbol("p");
        let q = mngr.bool_symbol("q");
        let r = mngr.bool_symbol("r");
        let left = mngr.and(vec![p, q]);
        let root = mngr.or(vec![left, r]);
        let (clauses, _) = convert(&mut mngr, &root);
        clauses
            .iter()
            .map(|cl| cl.iter().map(|l| l.to_string()).collect::<Vec<_>>())
            .collect::<Vec<_>>()
    };
    assert_eq!(build(), build());
}
