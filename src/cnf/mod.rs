//! Conversion of formula DAGs to conjunctive normal form.
//!
//! The converter implements a polarity-aware (Plaisted–Greenbaum)
//! transformation with definitional renaming: each sub-formula only
//! contributes the clauses its demanded polarities require, and shared or
//! multi-clause fragments are renamed into fresh surrogate variables so
//! that clause count stays linear in the size of the DAG.
//!
//! A conversion run works in two passes over the (externally interned)
//! DAG: a scan pass counts, for every reachable node, how many distinct
//! (node, polarity) demands exist, and the conversion pass then computes
//! one clause set per demanded pair, releasing each set as soon as its
//! last counted consumer has used it.

use indexmap::IndexMap;

use crate::node::{Node, NodeError, NodeKind, NodeManager};

mod clauses;
mod convert;
mod info;
mod scan;

pub use clauses::{is_literal, Clause, ClauseSet};

use info::{CnfInfo, Share};

/// The error type of a conversion run
#[derive(Debug, thiserror::Error)]
pub enum CnfError {
    /// The formula contains a kind outside the supported vocabulary.
    /// This signals malformed input and is not recoverable.
    #[error("no conversion rule for kind {0}")]
    UnsupportedKind(NodeKind),

    #[error("node error: {0}")]
    Node(#[from] NodeError),
}

/// Converts one formula node at a time to CNF.
///
/// The converter borrows the [`NodeManager`] for the whole run because it
/// allocates new nodes: surrogate symbols, negations of atoms, and
/// rebuilt (flattened) terms. It never mutates existing nodes.
pub struct CnfConverter<'m> {
    mngr: &'m mut NodeManager,

    /// Annotation table, one record per node touched by the current run
    info: IndexMap<Node, CnfInfo>,

    /// Placeholder variable asserted true by the output's first unit
    /// clause; the truth constants convert to it and its negation
    true_var: Node,

    /// Renaming steps performed, for the run summary
    renames: usize,
}

impl<'m> CnfConverter<'m> {
    pub fn new(mngr: &'m mut NodeManager) -> Self {
        let true_var = mngr.fresh_symbol("cnf_true", 0, 0);
        CnfConverter {
            mngr,
            info: IndexMap::new(),
            true_var,
            renames: 0,
        }
    }

    /// The dedicated "true" placeholder. The produced CNF contains a unit
    /// clause asserting it; a downstream solver must keep that clause.
    pub fn true_var(&self) -> &Node {
        &self.true_var
    }

    /// Converts the formula rooted at `root`, demanded positively, to
    /// CNF: the root's own clause set followed by the `true` placeholder
    /// unit clause and every definitional clause introduced by renaming.
    ///
    /// # Errors
    /// Fails if a node with no conversion rule is reached.
    pub fn run(&mut self, root: &Node) -> Result<ClauseSet, CnfError> {
        self.info.clear();
        self.renames = 0;

        self.scan_formula(root, true);
        let mut defs = ClauseSet::singleton(self.true_var.clone());
        self.convert_formula(root, &mut defs)?;

        let top = self
            .info
            .get_mut(root)
            .and_then(|x| x.clauses_pos.take())
            .expect("root clause set not computed");
        self.info.clear();

        let mut out = top;
        out.extend(defs);
        log::debug!(
            "converted {} to {} clauses ({} renaming steps)",
            root.id(),
            out.len(),
            self.renames
        );
        Ok(out)
    }

    /* Annotation table access. Presence of records and clause sets is an
     * invariant maintained by construction: the scan precedes the
     * conversion, and a slot is populated before any consumer reads it. */

    fn info_mut(&mut self, n: &Node) -> &mut CnfInfo {
        self.info.get_mut(n).expect("no annotation record")
    }

    fn pos_ref(&self, n: &Node) -> &ClauseSet {
        self.info
            .get(n)
            .and_then(|x| x.clauses_pos.as_ref())
            .expect("positive clause set not computed")
    }

    fn neg_ref(&self, n: &Node) -> &ClauseSet {
        self.info
            .get(n)
            .and_then(|x| x.clauses_neg.as_ref())
            .expect("negative clause set not computed")
    }

    /// The flattened substitute of a term node
    fn term_for(&self, n: &Node) -> Node {
        self.info
            .get(n)
            .and_then(|x| x.term_for_cnf.clone())
            .expect("term substitute not computed")
    }

    /* Memory reclamation. A (node, polarity) clause set demanded exactly
     * once is consumed by moving it out; a shared one is cloned and kept
     * until teardown. Once both polarity slots and the term substitute
     * are gone, the whole record leaves the table. */

    /// Consumes one counted demand on the positive clause set
    fn take_pos(&mut self, n: &Node) -> ClauseSet {
        let x = self.info_mut(n);
        if x.shares_pos == Share::One {
            let cs = x
                .clauses_pos
                .take()
                .expect("positive clause set not computed");
            if x.is_spent() {
                self.info.remove(n);
            }
            cs
        } else {
            x.clauses_pos
                .as_ref()
                .expect("positive clause set not computed")
                .clone()
        }
    }

    /// Consumes one counted demand on the negative clause set
    fn take_neg(&mut self, n: &Node) -> ClauseSet {
        let x = self.info_mut(n);
        if x.shares_neg == Share::One {
            let cs = x
                .clauses_neg
                .take()
                .expect("negative clause set not computed");
            if x.is_spent() {
                self.info.remove(n);
            }
            cs
        } else {
            x.clauses_neg
                .as_ref()
                .expect("negative clause set not computed")
                .clone()
        }
    }

    /// Releases the positive clause set after a by-reference use
    fn release_pos(&mut self, n: &Node) {
        let x = self.info_mut(n);
        if x.shares_pos == Share::One {
            x.clauses_pos = None;
            if x.is_spent() {
                self.info.remove(n);
            }
        }
    }

    /// Releases the negative clause set after a by-reference use
    fn release_neg(&mut self, n: &Node) {
        let x = self.info_mut(n);
        if x.shares_neg == Share::One {
            x.clauses_neg = None;
            if x.is_spent() {
                self.info.remove(n);
            }
        }
    }

    /// Mints the surrogate variable for a node, deterministically keyed
    /// by the node's id and carrying its widths. The positive and
    /// negative renaming of the same node share one surrogate.
    fn surrogate(&mut self, n: &Node) -> Node {
        self.renames += 1;
        let name = format!("cnf{{{}}}", n.id());
        self.mngr.symbol(name, n.index_width(), n.value_width())
    }
}
