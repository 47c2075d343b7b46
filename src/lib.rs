//! Polarity-aware CNF conversion for shared formula DAGs.

mod cnf;
mod node;

pub use cnf::{is_literal, Clause, ClauseSet, CnfConverter, CnfError};
pub use node::{Node, NodeError, NodeKind, NodeManager, OwnedNode};
