use std::{fmt::Display, hash::Hash, rc::Rc};

mod manager;

pub use manager::NodeManager;

/// The kinds of nodes the converter understands.
///
/// Formulas are built from the truth constants, symbols, the Boolean
/// connectives, and predicates over terms. Terms are bit-vector valued;
/// the converter only distinguishes atoms, if-then-else, and "any other
/// term operator", so the term vocabulary here is a representative sample.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /* Constants */
    /// The constant `true`
    True,
    /// The constant `false`
    False,
    /// A named symbol; Boolean when both widths are zero, a term otherwise
    Symbol(String),
    /// A bit-vector constant
    BvConst(u64),

    /* Boolean connectives */
    /// Negation
    Not,
    /// Conjunction
    And,
    /// Negated conjunction
    Nand,
    /// Disjunction
    Or,
    /// Negated disjunction
    Nor,
    /// Exclusive or
    Xor,
    /// Implication
    Implies,
    /// If-then-else. Used both as a connective (all children Boolean)
    /// and as a term case-split (branches term-valued).
    Ite,

    /* Predicates over terms */
    /// Term equality
    Eq,
    /// Extraction of a single bit of a term, as a Boolean atom
    BoolExtract,

    /* Term operators */
    /// Bit-vector addition
    BvAdd,
    /// Bit-wise conjunction
    BvAnd,
    /// Bit-wise negation
    BvNot,
    /// Bit-vector concatenation
    BvConcat,
}

impl NodeKind {
    /// Returns true if the node is a predicate, i.e. a Boolean-valued
    /// function over term arguments.
    pub fn is_predicate(&self) -> bool {
        matches!(self, NodeKind::Eq | NodeKind::BoolExtract)
    }

    /// The arity a kind requires, if it is fixed.
    pub fn arity(&self) -> Option<usize> {
        match self {
            NodeKind::True | NodeKind::False | NodeKind::Symbol(_) | NodeKind::BvConst(_) => {
                Some(0)
            }
            NodeKind::Not | NodeKind::BvNot => Some(1),
            NodeKind::Implies | NodeKind::Eq | NodeKind::BoolExtract => Some(2),
            NodeKind::Ite => Some(3),
            NodeKind::And
            | NodeKind::Nand
            | NodeKind::Or
            | NodeKind::Nor
            | NodeKind::Xor
            | NodeKind::BvAdd
            | NodeKind::BvAnd
            | NodeKind::BvConcat => None,
        }
    }
}

/// A reference-counted, interned DAG node.
///
/// Nodes are created through the [`NodeManager`], which guarantees that
/// structurally identical sub-formulas are the *same* node. Equality and
/// hashing therefore go by the unique id only.
pub type Node = Rc<OwnedNode>;

#[derive(Debug, Clone)]
pub struct OwnedNode {
    /// Unique identifier
    id: usize,

    /// Type of node
    kind: NodeKind,

    /// List of children
    children: Vec<Node>,

    /// Index width for array-typed terms; zero otherwise
    index_width: u32,

    /// Bit width of the value; zero for Booleans
    value_width: u32,
}

impl OwnedNode {
    pub(super) fn new(
        id: usize,
        kind: NodeKind,
        children: Vec<Node>,
        index_width: u32,
        value_width: u32,
    ) -> Self {
        OwnedNode {
            id,
            kind,
            children,
            index_width,
            value_width,
        }
    }

    /// Returns the unique id of this node
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns the [`NodeKind`] of the node
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Returns the children of the node
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn index_width(&self) -> u32 {
        self.index_width
    }

    pub fn value_width(&self) -> u32 {
        self.value_width
    }

    /// Returns true if the node is a leaf: a truth constant, a symbol, or
    /// a bit-vector constant.
    pub fn is_atom(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::True | NodeKind::False | NodeKind::Symbol(_) | NodeKind::BvConst(_)
        )
    }

    /// Returns true if the node is a predicate application
    pub fn is_predicate(&self) -> bool {
        self.kind.is_predicate()
    }

    /// Returns true if the node is an if-then-else
    pub fn is_ite(&self) -> bool {
        self.kind == NodeKind::Ite
    }
}

impl Hash for OwnedNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialEq for OwnedNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for OwnedNode {}

/* Pretty */

impl Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::True => write!(f, "true"),
            NodeKind::False => write!(f, "false"),
            NodeKind::Symbol(name) => write!(f, "{}", name),
            NodeKind::BvConst(c) => write!(f, "#{}", c),
            NodeKind::Not => write!(f, "not"),
            NodeKind::And => write!(f, "and"),
            NodeKind::Nand => write!(f, "nand"),
            NodeKind::Or => write!(f, "or"),
            NodeKind::Nor => write!(f, "nor"),
            NodeKind::Xor => write!(f, "xor"),
            NodeKind::Implies => write!(f, "=>"),
            NodeKind::Ite => write!(f, "ite"),
            NodeKind::Eq => write!(f, "="),
            NodeKind::BoolExtract => write!(f, "boolextract"),
            NodeKind::BvAdd => write!(f, "bvadd"),
            NodeKind::BvAnd => write!(f, "bvand"),
            NodeKind::BvNot => write!(f, "bvnot"),
            NodeKind::BvConcat => write!(f, "concat"),
        }
    }
}

impl Display for OwnedNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.children.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "({}", self.kind)?;
            for child in &self.children {
                write!(f, " {}", child)?;
            }
            write!(f, ")")
        }
    }
}

/// The error type that can occur when constructing nodes
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("kind {0} expects {1} children but got {2}")]
    Arity(NodeKind, usize, usize),
}
