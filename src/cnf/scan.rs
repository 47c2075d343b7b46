//! The usage-polarity scan that precedes every conversion.
//!
//! One top-down pass computes, for every node reachable from the root,
//! the saturating number of distinct (node, polarity) demands. The
//! conversion pass later renames any multi-clause set demanded more than
//! once, and the reclamation discipline frees a set the moment its single
//! counted demand is spent. Revisiting a node whose counter already
//! saturated is a no-op, which caps the scan at the size of the DAG
//! rather than the size of the unfolded tree.

use crate::node::{Node, NodeKind};

use super::info::Share;
use super::CnfConverter;

/// Whether child `idx` of a node of this kind is demanded at the parent's
/// own polarity.
fn child_demands_same(kind: &NodeKind, idx: usize) -> bool {
    match kind {
        NodeKind::Not | NodeKind::Nand | NodeKind::Nor => false,
        NodeKind::Implies => idx != 0,
        _ => true,
    }
}

/// Whether child `idx` of a node of this kind is demanded at the
/// complement of the parent's polarity.
fn child_demands_complement(kind: &NodeKind, idx: usize) -> bool {
    match kind {
        NodeKind::Not | NodeKind::Nand | NodeKind::Nor | NodeKind::Xor => true,
        NodeKind::Implies | NodeKind::Ite => idx == 0,
        _ => false,
    }
}

impl<'m> CnfConverter<'m> {
    /// Records one demand on `n` at the given polarity and recurses per
    /// the child-polarity table.
    pub(super) fn scan_formula(&mut self, n: &Node, is_pos: bool) {
        let x = self.info.entry(n.clone()).or_default();

        // saturated for this polarity: nothing below can change. A second
        // demand still recurses, so children of a shared node count as
        // shared themselves.
        if is_pos && x.shares_pos == Share::Many {
            return;
        }
        if !is_pos && x.shares_neg == Share::Many {
            return;
        }

        if is_pos {
            x.shares_pos.bump();
        } else {
            x.shares_neg.bump();
        }

        if n.is_atom() {
            return;
        }
        if n.is_predicate() {
            for child in n.children() {
                self.scan_term(child);
            }
            return;
        }
        for (idx, child) in n.children().iter().enumerate() {
            if child_demands_same(n.kind(), idx) {
                self.scan_formula(child, is_pos);
            }
            if child_demands_complement(n.kind(), idx) {
                self.scan_formula(child, !is_pos);
            }
        }
    }

    /// Records one demand on the term `n`. Terms have no polarity, so the
    /// positive counter doubles as their use counter.
    pub(super) fn scan_term(&mut self, n: &Node) {
        let x = self.info.entry(n.clone()).or_default();

        if x.shares_pos == Share::Many {
            return;
        }
        x.shares_pos.bump();
        x.is_term = true;

        if n.is_atom() {
            return;
        }
        if n.is_ite() {
            // a term case-split demands its condition at both polarities
            let children = n.children();
            self.scan_formula(&children[0], true);
            self.scan_formula(&children[0], false);
            self.scan_term(&children[1]);
            self.scan_term(&children[2]);
        } else {
            for child in n.children() {
                self.scan_term(child);
            }
        }
    }
}
