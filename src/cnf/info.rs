//! Per-node annotation records for a single conversion run.

use crate::node::Node;

use super::clauses::ClauseSet;

/// Saturating count of distinct demands on a (node, polarity) pair.
/// Beyond two, the exact count never matters: `Many` already marks the
/// node as shared, and the scanner stops revisiting a subtree once its
/// root has saturated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Share {
    #[default]
    Zero,
    One,
    Many,
}

impl Share {
    /// Saturating increment
    pub fn bump(&mut self) {
        *self = match self {
            Share::Zero => Share::One,
            Share::One | Share::Many => Share::Many,
        };
    }

    pub fn is_zero(self) -> bool {
        self == Share::Zero
    }
}

/// Everything the converter tracks about one DAG node during one run.
/// Created lazily on first visit by the scanner and torn down with the
/// run; nothing here is persisted.
#[derive(Debug, Default)]
pub struct CnfInfo {
    /// How often the node is demanded asserted-true
    pub shares_pos: Share,
    /// How often the node is demanded asserted-false
    pub shares_neg: Share,

    /// Set when the node was reached through the term scanner
    pub is_term: bool,
    /// The positive clause set has been replaced by a surrogate
    pub renamed_pos: bool,
    /// The negative clause set has been replaced by a surrogate
    pub renamed_neg: bool,
    /// A sibling with a multi-clause set demands this node rename its
    /// positive clause set before it is multiplied in
    pub sib_rename_pos: bool,
    /// As above, for the negative clause set
    pub sib_rename_neg: bool,
    /// Both polarity cases of this node have been converted
    pub visited: bool,

    /// Clause set for the positive polarity, present iff demanded and not
    /// yet reclaimed
    pub clauses_pos: Option<ClauseSet>,
    /// Clause set for the negative polarity
    pub clauses_neg: Option<ClauseSet>,
    /// Flattened substitute for term nodes
    pub term_for_cnf: Option<Node>,
}

impl CnfInfo {
    /// True once every cached artifact has been consumed or released;
    /// the record can then leave the table.
    pub fn is_spent(&self) -> bool {
        self.clauses_pos.is_none() && self.clauses_neg.is_none() && self.term_for_cnf.is_none()
    }
}
