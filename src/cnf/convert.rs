//! The polarity-driven conversion rules, renaming, and term flattening.
//!
//! Each connective has one rule per polarity, built from the two clause
//! set combinators: conjunctive composition is a union of the children's
//! sets, disjunctive composition is a cross product (distribution into
//! CNF). The product is the sole source of blow-up, so every product
//! site feeds the renaming heuristic: a multi-clause operand forces the
//! next sibling to rename itself before being multiplied in.

use crate::node::{Node, NodeKind};

use super::clauses::ClauseSet;
use super::info::Share;
use super::{CnfConverter, CnfError};

impl<'m> CnfConverter<'m> {
    /// Converts `n` for every demanded polarity, memoized per run.
    ///
    /// The renaming checks run on every entry, not only the first: a
    /// sibling's renaming request can arrive after the clause set was
    /// built but before its last consumer reads it.
    pub(super) fn convert_formula(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<(), CnfError> {
        let x = self.info.get(n).expect("no annotation record");

        // term nodes take the word-level route
        if x.is_term {
            self.convert_term(n, defs)?;
            self.info_mut(n).visited = true;
            return Ok(());
        }

        let shares_pos = x.shares_pos;
        let shares_neg = x.shares_neg;
        let visited = x.visited;

        if !shares_pos.is_zero() && !visited {
            self.convert_pos_cases(n, defs)?;
        }
        let x = self.info_mut(n);
        if x.clauses_pos.as_ref().map_or(false, |c| c.len() > 1)
            && (x.sib_rename_pos || shares_pos == Share::Many)
        {
            self.rename_pos(n, defs);
        }

        if !shares_neg.is_zero() && !visited {
            self.convert_neg_cases(n, defs)?;
        }
        let x = self.info_mut(n);
        if x.clauses_neg.as_ref().map_or(false, |c| c.len() > 1)
            && (x.sib_rename_neg || shares_neg == Share::Many)
        {
            self.rename_neg(n, defs);
        }

        self.info_mut(n).visited = true;
        Ok(())
    }

    fn convert_pos_cases(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<(), CnfError> {
        if n.is_predicate() {
            return self.convert_pos_pred(n, defs);
        }
        match n.kind() {
            NodeKind::True => {
                let lit = self.true_var.clone();
                self.set_pos(n, ClauseSet::singleton(lit));
            }
            NodeKind::False => {
                let lit = self.mngr.not(self.true_var.clone());
                self.set_pos(n, ClauseSet::singleton(lit));
            }
            NodeKind::Symbol(_) => {
                self.set_pos(n, ClauseSet::singleton(n.clone()));
            }
            NodeKind::Not => self.convert_pos_not(n, defs)?,
            NodeKind::And => self.convert_pos_and(n, defs)?,
            NodeKind::Nand => self.convert_pos_nand(n, defs)?,
            NodeKind::Or => self.convert_pos_or(n, defs)?,
            NodeKind::Nor => self.convert_pos_nor(n, defs)?,
            NodeKind::Xor => self.convert_pos_xor(n, defs)?,
            NodeKind::Implies => self.convert_pos_implies(n, defs)?,
            NodeKind::Ite => self.convert_pos_ite(n, defs)?,
            kind => return Err(CnfError::UnsupportedKind(kind.clone())),
        }
        Ok(())
    }

    fn convert_neg_cases(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<(), CnfError> {
        if n.is_predicate() {
            return self.convert_neg_pred(n, defs);
        }
        match n.kind() {
            NodeKind::True => {
                let lit = self.mngr.not(self.true_var.clone());
                self.set_neg(n, ClauseSet::singleton(lit));
            }
            NodeKind::False => {
                let lit = self.true_var.clone();
                self.set_neg(n, ClauseSet::singleton(lit));
            }
            NodeKind::Symbol(_) => {
                let lit = self.mngr.not(n.clone());
                self.set_neg(n, ClauseSet::singleton(lit));
            }
            NodeKind::Not => self.convert_neg_not(n, defs)?,
            NodeKind::And => self.convert_neg_and(n, defs)?,
            NodeKind::Nand => self.convert_neg_nand(n, defs)?,
            NodeKind::Or => self.convert_neg_or(n, defs)?,
            NodeKind::Nor => self.convert_neg_nor(n, defs)?,
            NodeKind::Xor => self.convert_neg_xor(n, defs)?,
            NodeKind::Implies => self.convert_neg_implies(n, defs)?,
            NodeKind::Ite => self.convert_neg_ite(n, defs)?,
            kind => return Err(CnfError::UnsupportedKind(kind.clone())),
        }
        Ok(())
    }

    fn set_pos(&mut self, n: &Node, cs: ClauseSet) {
        self.info_mut(n).clauses_pos = Some(cs);
    }

    fn set_neg(&mut self, n: &Node, cs: ClauseSet) {
        self.info_mut(n).clauses_neg = Some(cs);
    }

    /* Predicates: one clause over the flattened arguments */

    fn convert_pos_pred(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<(), CnfError> {
        let flat = self.flatten_pred(n, defs)?;
        self.set_pos(n, ClauseSet::singleton(flat));
        Ok(())
    }

    fn convert_neg_pred(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<(), CnfError> {
        let flat = self.flatten_pred(n, defs)?;
        let lit = self.mngr.not(flat);
        self.set_neg(n, ClauseSet::singleton(lit));
        Ok(())
    }

    /// Rebuilds a predicate over the flattened substitutes of its term
    /// arguments, widths propagated unchanged.
    fn flatten_pred(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<Node, CnfError> {
        let mut psis = Vec::with_capacity(n.children().len());
        for child in n.children() {
            self.convert_term(child, defs)?;
            psis.push(self.term_for(child));
        }
        Ok(self.mngr.create_node(n.kind().clone(), psis)?)
    }

    /* NOT: swap polarities of the child */

    fn convert_pos_not(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<(), CnfError> {
        let child = n.children()[0].clone();
        self.convert_formula(&child, defs)?;
        let cs = self.take_neg(&child);
        self.set_pos(n, cs);
        Ok(())
    }

    fn convert_neg_not(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<(), CnfError> {
        let child = n.children()[0].clone();
        self.convert_formula(&child, defs)?;
        let cs = self.take_pos(&child);
        self.set_neg(n, cs);
        Ok(())
    }

    /* AND / NAND */

    // (pos) AND ~> union of the children's positive sets
    fn convert_pos_and(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<(), CnfError> {
        let children = n.children().to_vec();
        let mut psi = ClauseSet::new();
        for child in &children {
            self.convert_formula(child, defs)?;
            psi.extend(self.take_pos(child));
        }
        self.set_pos(n, psi);
        Ok(())
    }

    // (neg) AND ~> product of the children's negative sets
    fn convert_neg_and(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<(), CnfError> {
        let children = n.children().to_vec();
        let mut renamesibs = false;
        let mut psi: Option<ClauseSet> = None;
        for child in &children {
            if renamesibs {
                self.info_mut(child).sib_rename_neg = true;
            }
            self.convert_formula(child, defs)?;
            let cs = self.take_neg(child);
            if cs.len() > 1 {
                renamesibs = true;
            }
            psi = Some(match psi {
                None => cs,
                Some(mut acc) => {
                    if cs.len() == 1 {
                        acc.append_product(&cs);
                        acc
                    } else {
                        ClauseSet::product(&acc, &cs)
                    }
                }
            });
        }
        self.set_neg(n, psi.expect("connective without children"));
        Ok(())
    }

    // (pos) NAND ~> product of the children's negative sets
    fn convert_pos_nand(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<(), CnfError> {
        let children = n.children().to_vec();
        let mut renamesibs = false;
        let mut psi: Option<ClauseSet> = None;
        for child in &children {
            if renamesibs {
                self.info_mut(child).sib_rename_neg = true;
            }
            self.convert_formula(child, defs)?;
            let cs = self.take_neg(child);
            if cs.len() > 1 {
                renamesibs = true;
            }
            psi = Some(match psi {
                None => cs,
                Some(acc) => ClauseSet::product(&acc, &cs),
            });
        }
        self.set_pos(n, psi.expect("connective without children"));
        Ok(())
    }

    // (neg) NAND ~> union of the children's positive sets
    fn convert_neg_nand(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<(), CnfError> {
        let children = n.children().to_vec();
        let mut psi = ClauseSet::new();
        for child in &children {
            self.convert_formula(child, defs)?;
            psi.extend(self.take_pos(child));
        }
        self.set_neg(n, psi);
        Ok(())
    }

    /* OR / NOR */

    // (pos) OR ~> product of the children's positive sets
    fn convert_pos_or(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<(), CnfError> {
        let children = n.children().to_vec();
        let mut renamesibs = false;
        let mut psi: Option<ClauseSet> = None;
        for child in &children {
            if renamesibs {
                self.info_mut(child).sib_rename_pos = true;
            }
            self.convert_formula(child, defs)?;
            let cs = self.take_pos(child);
            if cs.len() > 1 {
                renamesibs = true;
            }
            psi = Some(match psi {
                None => cs,
                Some(acc) => ClauseSet::product(&acc, &cs),
            });
        }
        self.set_pos(n, psi.expect("connective without children"));
        Ok(())
    }

    // (neg) OR ~> union of the children's negative sets
    fn convert_neg_or(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<(), CnfError> {
        let children = n.children().to_vec();
        let mut psi = ClauseSet::new();
        for child in &children {
            self.convert_formula(child, defs)?;
            psi.extend(self.take_neg(child));
        }
        self.set_neg(n, psi);
        Ok(())
    }

    // (pos) NOR ~> union of the children's negative sets
    fn convert_pos_nor(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<(), CnfError> {
        let children = n.children().to_vec();
        let mut psi = ClauseSet::new();
        for child in &children {
            self.convert_formula(child, defs)?;
            psi.extend(self.take_neg(child));
        }
        self.set_pos(n, psi);
        Ok(())
    }

    // (neg) NOR ~> product of the children's positive sets
    fn convert_neg_nor(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<(), CnfError> {
        let children = n.children().to_vec();
        let mut renamesibs = false;
        let mut psi: Option<ClauseSet> = None;
        for child in &children {
            if renamesibs {
                self.info_mut(child).sib_rename_pos = true;
            }
            self.convert_formula(child, defs)?;
            let cs = self.take_pos(child);
            if cs.len() > 1 {
                renamesibs = true;
            }
            psi = Some(match psi {
                None => cs,
                Some(acc) => ClauseSet::product(&acc, &cs),
            });
        }
        self.set_neg(n, psi.expect("connective without children"));
        Ok(())
    }

    /* IMPLIES */

    // (pos) IMPLIES ~> product of neg(antecedent) and pos(consequent)
    fn convert_pos_implies(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<(), CnfError> {
        let a = n.children()[0].clone();
        let b = n.children()[1].clone();
        self.convert_formula(&a, defs)?;
        if self.neg_ref(&a).len() > 1 {
            self.info_mut(&b).sib_rename_pos = true;
        }
        self.convert_formula(&b, defs)?;
        let psi = ClauseSet::product(self.neg_ref(&a), self.pos_ref(&b));
        self.release_neg(&a);
        self.release_pos(&b);
        self.set_pos(n, psi);
        Ok(())
    }

    // (neg) IMPLIES ~> union of pos(antecedent) and neg(consequent)
    fn convert_neg_implies(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<(), CnfError> {
        let a = n.children()[0].clone();
        let b = n.children()[1].clone();
        self.convert_formula(&a, defs)?;
        self.convert_formula(&b, defs)?;
        let mut psi = self.take_pos(&a);
        psi.extend(self.take_neg(&b));
        self.set_neg(n, psi);
        Ok(())
    }

    /* ITE (as a connective) */

    // (pos) ITE ~> product(neg(c), pos(t)) followed by product(pos(c), pos(e))
    fn convert_pos_ite(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<(), CnfError> {
        let c = n.children()[0].clone();
        let t = n.children()[1].clone();
        let e = n.children()[2].clone();
        self.convert_formula(&c, defs)?;
        if self.neg_ref(&c).len() > 1 {
            self.info_mut(&t).sib_rename_pos = true;
        }
        self.convert_formula(&t, defs)?;
        if self.pos_ref(&c).len() > 1 {
            self.info_mut(&e).sib_rename_pos = true;
        }
        self.convert_formula(&e, defs)?;
        let mut psi = ClauseSet::product(self.neg_ref(&c), self.pos_ref(&t));
        psi.extend(ClauseSet::product(self.pos_ref(&c), self.pos_ref(&e)));
        self.release_neg(&c);
        self.release_pos(&t);
        self.release_pos(&c);
        self.release_pos(&e);
        self.set_pos(n, psi);
        Ok(())
    }

    // (neg) ITE ~> product(neg(c), neg(t)) followed by product(pos(c), neg(e))
    fn convert_neg_ite(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<(), CnfError> {
        let c = n.children()[0].clone();
        let t = n.children()[1].clone();
        let e = n.children()[2].clone();
        self.convert_formula(&c, defs)?;
        if self.neg_ref(&c).len() > 1 {
            self.info_mut(&t).sib_rename_neg = true;
        }
        self.convert_formula(&t, defs)?;
        if self.pos_ref(&c).len() > 1 {
            self.info_mut(&e).sib_rename_neg = true;
        }
        self.convert_formula(&e, defs)?;
        let mut psi = ClauseSet::product(self.neg_ref(&c), self.neg_ref(&t));
        psi.extend(ClauseSet::product(self.pos_ref(&c), self.neg_ref(&e)));
        self.release_neg(&c);
        self.release_neg(&t);
        self.release_pos(&c);
        self.release_neg(&e);
        self.set_neg(n, psi);
        Ok(())
    }

    /* XOR: a right-to-left pairwise fold. Both polarities of every child
     * are demanded, so both sets are read by reference throughout the
     * fold and only released afterwards. */

    fn convert_pos_xor(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<(), CnfError> {
        debug_assert!(n.children().len() >= 2);
        let children = n.children().to_vec();
        for child in &children {
            self.convert_formula(child, defs)?;
        }
        let psi = self.pos_xor_fold(n, 0, defs)?;
        self.set_pos(n, psi);
        for child in &children {
            self.release_pos(child);
            self.release_neg(child);
        }
        Ok(())
    }

    fn convert_neg_xor(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<(), CnfError> {
        debug_assert!(n.children().len() >= 2);
        let children = n.children().to_vec();
        for child in &children {
            self.convert_formula(child, defs)?;
        }
        let psi = self.neg_xor_fold(n, 0, defs)?;
        self.set_neg(n, psi);
        for child in &children {
            self.release_pos(child);
            self.release_neg(child);
        }
        Ok(())
    }

    // XOR[idx..] asserted true: either child idx and XOR[idx+1..] hold,
    // or their negations both hold.
    //
    // The cross-call into the negative fold (and the extra conversion
    // calls the negative fold makes, which the positive one does not)
    // reflect the identity not(xor(a, b)) = xor(not(a), b). The
    // asymmetry is kept exactly as observed in the reference behavior.
    fn pos_xor_fold(
        &mut self,
        n: &Node,
        idx: usize,
        defs: &mut ClauseSet,
    ) -> Result<ClauseSet, CnfError> {
        let children = n.children().to_vec();
        if idx == children.len() - 2 {
            if self.pos_ref(&children[idx]).len() > 1 {
                self.info_mut(&children[idx + 1]).sib_rename_pos = true;
            }
            if self.neg_ref(&children[idx]).len() > 1 {
                self.info_mut(&children[idx + 1]).sib_rename_neg = true;
            }
            let mut psi =
                ClauseSet::product(self.pos_ref(&children[idx]), self.pos_ref(&children[idx + 1]));
            psi.extend(ClauseSet::product(
                self.neg_ref(&children[idx]),
                self.neg_ref(&children[idx + 1]),
            ));
            Ok(psi)
        } else {
            let theta1 = self.pos_xor_fold(n, idx + 1, defs)?;
            if theta1.len() > 1 {
                self.info_mut(&children[idx]).sib_rename_pos = true;
            }
            let theta2 = self.neg_xor_fold(n, idx + 1, defs)?;
            if theta2.len() > 1 {
                self.info_mut(&children[idx]).sib_rename_neg = true;
            }
            let mut psi = ClauseSet::product(self.pos_ref(&children[idx]), &theta1);
            psi.extend(ClauseSet::product(self.neg_ref(&children[idx]), &theta2));
            Ok(psi)
        }
    }

    // XOR[idx..] asserted false: child idx and XOR[idx+1..] agree.
    fn neg_xor_fold(
        &mut self,
        n: &Node,
        idx: usize,
        defs: &mut ClauseSet,
    ) -> Result<ClauseSet, CnfError> {
        let children = n.children().to_vec();
        if idx == children.len() - 2 {
            self.convert_formula(&children[idx], defs)?;
            if self.neg_ref(&children[idx]).len() > 1 {
                self.info_mut(&children[idx + 1]).sib_rename_pos = true;
            }
            self.convert_formula(&children[idx], defs)?;
            if self.pos_ref(&children[idx]).len() > 1 {
                self.info_mut(&children[idx + 1]).sib_rename_neg = true;
            }
            let mut psi =
                ClauseSet::product(self.neg_ref(&children[idx]), self.pos_ref(&children[idx + 1]));
            psi.extend(ClauseSet::product(
                self.pos_ref(&children[idx]),
                self.neg_ref(&children[idx + 1]),
            ));
            Ok(psi)
        } else {
            let theta1 = self.pos_xor_fold(n, idx + 1, defs)?;
            if theta1.len() > 1 {
                self.info_mut(&children[idx]).sib_rename_neg = true;
            }
            self.convert_formula(&children[idx], defs)?;
            let theta2 = self.neg_xor_fold(n, idx + 1, defs)?;
            if theta2.len() > 1 {
                self.info_mut(&children[idx]).sib_rename_pos = true;
            }
            let mut psi = ClauseSet::product(self.neg_ref(&children[idx]), &theta1);
            psi.extend(ClauseSet::product(self.pos_ref(&children[idx]), &theta2));
            Ok(psi)
        }
    }

    /* Renaming */

    /// Replaces the positive clause set of `n` with a single surrogate
    /// literal. Each existing clause gets the negated surrogate appended
    /// and moves into the definitional accumulator; only this implication
    /// direction is emitted, since only the positive use of `n` demands
    /// it.
    pub(super) fn rename_pos(&mut self, n: &Node, defs: &mut ClauseSet) {
        let psi = self.surrogate(n);
        let not_psi = self.mngr.not(psi.clone());
        let x = self.info_mut(n);
        assert!(!x.renamed_pos, "positive clause set renamed twice: {}", n);
        let mut cl = x.clauses_pos.take().expect("positive clause set not computed");
        cl.append_to_all(not_psi);
        x.clauses_pos = Some(ClauseSet::singleton(psi));
        x.renamed_pos = true;
        log::trace!("renamed ({}, pos), {} defs", n.id(), cl.len());
        defs.extend(cl);
    }

    /// The negative counterpart: the surrogate itself is appended to the
    /// old clauses and the cached set becomes the negated surrogate.
    pub(super) fn rename_neg(&mut self, n: &Node, defs: &mut ClauseSet) {
        let psi = self.surrogate(n);
        let not_psi = self.mngr.not(psi.clone());
        let x = self.info_mut(n);
        assert!(!x.renamed_neg, "negative clause set renamed twice: {}", n);
        let mut cl = x.clauses_neg.take().expect("negative clause set not computed");
        cl.append_to_all(psi);
        x.clauses_neg = Some(ClauseSet::singleton(not_psi));
        x.renamed_neg = true;
        log::trace!("renamed ({}, neg), {} defs", n.id(), cl.len());
        defs.extend(cl);
    }

    /* Term flattening */

    /// Produces the flattened substitute of a term node, memoized per
    /// run. Atoms flatten to themselves; other operators are rebuilt over
    /// their children's substitutes. A term if-then-else is always
    /// renamed, regardless of its use count: a word-level case-split has
    /// no direct clause form.
    pub(super) fn convert_term(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<(), CnfError> {
        if self
            .info
            .get(n)
            .expect("no annotation record")
            .term_for_cnf
            .is_some()
        {
            return Ok(());
        }

        if n.is_ite() {
            let subst = self.rename_term_ite(n, defs)?;
            self.info_mut(n).term_for_cnf = Some(subst);
            let cond = n.children()[0].clone();
            self.release_pos(&cond);
            self.release_neg(&cond);
        } else if n.is_atom() {
            self.info_mut(n).term_for_cnf = Some(n.clone());
        } else {
            let mut psis = Vec::with_capacity(n.children().len());
            for child in n.children() {
                self.convert_term(child, defs)?;
                psis.push(self.term_for(child));
            }
            let psi = self.mngr.create_node(n.kind().clone(), psis)?;
            self.info_mut(n).term_for_cnf = Some(psi);
        }
        Ok(())
    }

    /// Renames a term if-then-else into a fresh surrogate: the surrogate
    /// equals the flattened branch that the condition selects, guarded by
    /// the condition's clauses.
    fn rename_term_ite(&mut self, n: &Node, defs: &mut ClauseSet) -> Result<Node, CnfError> {
        let psi = self.surrogate(n);

        let cond = n.children()[0].clone();
        let then_branch = n.children()[1].clone();
        let else_branch = n.children()[2].clone();

        self.convert_formula(&cond, defs)?;
        self.convert_term(&then_branch, defs)?;
        let t1 = self.term_for(&then_branch);
        self.convert_term(&else_branch, defs)?;
        let t2 = self.term_for(&else_branch);

        let eq_then = self.mngr.eq(psi.clone(), t1);
        let guarded_then = ClauseSet::product(self.neg_ref(&cond), &ClauseSet::singleton(eq_then));
        defs.extend(guarded_then);

        let eq_else = self.mngr.eq(psi.clone(), t2);
        let guarded_else = ClauseSet::product(self.pos_ref(&cond), &ClauseSet::singleton(eq_else));
        defs.extend(guarded_else);

        log::trace!("renamed term ite {} as {}", n.id(), psi);
        Ok(psi)
    }
}
