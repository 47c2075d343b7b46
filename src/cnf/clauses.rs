//! The clause-set algebra the conversion rules are built from.

use itertools::Itertools;
use smallvec::SmallVec;

use crate::node::{Node, NodeKind};

/// A clause: an ordered disjunction of literals. Literals are atom nodes
/// or negated atom nodes; duplicates are permitted and not pruned here.
pub type Clause = SmallVec<[Node; 4]>;

/// A collection of clauses whose conjunction is the contribution one
/// (node, polarity) pair makes to the final CNF.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClauseSet {
    clauses: Vec<Clause>,
}

impl ClauseSet {
    pub fn new() -> Self {
        Self { clauses: vec![] }
    }

    /// One clause containing exactly the given literal
    pub fn singleton(lit: Node) -> Self {
        let mut clause = Clause::new();
        clause.push(lit);
        Self {
            clauses: vec![clause],
        }
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Clause> {
        self.clauses.iter()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn into_clauses(self) -> Vec<Clause> {
        self.clauses
    }

    pub fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    /// Concatenation of two clause collections: the conjunction of two
    /// already-conjunctive fragments.
    pub fn union(a: &ClauseSet, b: &ClauseSet) -> ClauseSet {
        let mut clauses = Vec::with_capacity(a.len() + b.len());
        clauses.extend(a.clauses.iter().cloned());
        clauses.extend(b.clauses.iter().cloned());
        ClauseSet { clauses }
    }

    /// Move-append `other` onto `self` without copying clauses
    pub fn extend(&mut self, other: ClauseSet) {
        self.clauses.extend(other.clauses);
    }

    /// Append copies of `other`'s clauses onto `self`
    pub fn extend_copy(&mut self, other: &ClauseSet) {
        self.clauses.extend(other.clauses.iter().cloned());
    }

    /// Cross product: for every clause `a` in `A` and `b` in `B`, the
    /// clause `a ∪ b`. Produces |A|·|B| clauses; this is the sole source
    /// of combinatorial blow-up and the trigger for renaming.
    pub fn product(a: &ClauseSet, b: &ClauseSet) -> ClauseSet {
        let clauses = a
            .clauses
            .iter()
            .cartesian_product(b.clauses.iter())
            .map(|(ca, cb)| {
                let mut clause = ca.clone();
                clause.extend(cb.iter().cloned());
                clause
            })
            .collect();
        ClauseSet { clauses }
    }

    /// In-place product against a single-clause `other`: appends the
    /// clause's literals to every clause of `self` without reallocating.
    pub fn append_product(&mut self, other: &ClauseSet) {
        debug_assert_eq!(other.len(), 1);
        let rhs = &other.clauses[0];
        for clause in &mut self.clauses {
            clause.extend(rhs.iter().cloned());
        }
    }

    /// Appends the given literal to every clause. This is the single
    /// mutation renaming performs on already-produced clauses.
    pub fn append_to_all(&mut self, lit: Node) {
        for clause in &mut self.clauses {
            clause.push(lit.clone());
        }
    }
}

impl IntoIterator for ClauseSet {
    type Item = Clause;
    type IntoIter = std::vec::IntoIter<Clause>;
    fn into_iter(self) -> Self::IntoIter {
        self.clauses.into_iter()
    }
}

/// Returns true if the node is a literal: an atom, a predicate, or the
/// negation of one.
pub fn is_literal(n: &Node) -> bool {
    match n.kind() {
        NodeKind::Not => n.children().first().map_or(false, is_positive_literal),
        _ => is_positive_literal(n),
    }
}

fn is_positive_literal(n: &Node) -> bool {
    n.is_atom() || n.is_predicate()
}

impl std::fmt::Display for ClauseSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for clause in &self.clauses {
            write!(f, "[")?;
            for (i, lit) in clause.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", lit)?;
            }
            writeln!(f, "]")?;
        }
        Ok(())
    }
}
