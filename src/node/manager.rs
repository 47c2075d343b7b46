use indexmap::IndexMap;

use super::{Node, NodeError, NodeKind, OwnedNode};

/// The type we use for hash-consing nodes.
/// The widths are part of the key: the same kind and children with
/// different widths are different nodes.
type NodeKey = (NodeKind, Vec<Node>, u32, u32);

/// Interning store and builder for [`Node`]s.
///
/// All node construction goes through the manager, which guarantees that
/// structurally identical sub-formulas are represented by the identical
/// `Rc` node. The CNF converter depends on this: its revisit check and
/// annotation table are keyed by node identity.
///
/// The manager performs no simplification beyond collapsing double
/// negation; in particular there is no constant folding and children keep
/// their given order.
#[derive(Default)]
pub struct NodeManager {
    /// Counter for unique identifiers
    next_id: usize,

    /// Registry of nodes
    node_registry: IndexMap<NodeKey, Node>,
}

impl NodeManager {
    /// Creates (or returns the existing) node of the given kind over the
    /// given children, with both widths taken from the first child.
    ///
    /// # Errors
    /// Returns [`NodeError::Arity`] if the kind has a fixed arity and the
    /// number of children does not match it.
    pub fn create_node(&mut self, kind: NodeKind, children: Vec<Node>) -> Result<Node, NodeError> {
        if let Some(arity) = kind.arity() {
            if children.len() != arity {
                return Err(NodeError::Arity(kind, arity, children.len()));
            }
        }
        let (iw, vw) = match &kind {
            // predicates and connectives are Boolean regardless of children
            k if k.is_predicate() => (0, 0),
            NodeKind::Not
            | NodeKind::And
            | NodeKind::Nand
            | NodeKind::Or
            | NodeKind::Nor
            | NodeKind::Xor
            | NodeKind::Implies => (0, 0),
            // term operators and ITE take their widths from a child; for a
            // formula ITE the children are Boolean and the widths are zero
            _ => children
                .last()
                .map(|c| (c.index_width(), c.value_width()))
                .unwrap_or((0, 0)),
        };
        Ok(self.intern_node(kind, children, iw, vw))
    }

    pub(crate) fn intern_node(
        &mut self,
        kind: NodeKind,
        children: Vec<Node>,
        index_width: u32,
        value_width: u32,
    ) -> Node {
        let key = (kind.clone(), children.clone(), index_width, value_width);
        if let Some(node) = self.node_registry.get(&key) {
            return node.clone();
        }
        let node = Node::new(OwnedNode::new(
            self.next_id,
            kind,
            children,
            index_width,
            value_width,
        ));
        self.next_id += 1;
        self.node_registry.insert(key, node.clone());
        node
    }

    /// Number of distinct nodes currently interned
    pub fn len(&self) -> usize {
        self.node_registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_registry.is_empty()
    }

    /* Constants and symbols */

    /// The constant `true`
    pub fn ttrue(&mut self) -> Node {
        self.intern_node(NodeKind::True, vec![], 0, 0)
    }

    /// The constant `false`
    pub fn ffalse(&mut self) -> Node {
        self.intern_node(NodeKind::False, vec![], 0, 0)
    }

    /// A named symbol with the given widths. Boolean symbols have both
    /// widths zero. Symbols are interned by name, so asking twice for the
    /// same name yields the identical node.
    pub fn symbol(&mut self, name: impl Into<String>, index_width: u32, value_width: u32) -> Node {
        self.intern_node(NodeKind::Symbol(name.into()), vec![], index_width, value_width)
    }

    /// A Boolean symbol
    pub fn bool_symbol(&mut self, name: impl Into<String>) -> Node {
        self.symbol(name, 0, 0)
    }

    /// A fresh symbol that cannot collide with any symbol created before.
    /// The name is `<prefix>!<n>` with a counter that advances past any
    /// name already interned, so a user symbol that happens to carry such
    /// a name is never aliased.
    pub fn fresh_symbol(&mut self, prefix: &str, index_width: u32, value_width: u32) -> Node {
        loop {
            let name = format!("{}!{}", prefix, self.next_id);
            let taken = self
                .node_registry
                .keys()
                .any(|(kind, _, _, _)| matches!(kind, NodeKind::Symbol(n) if *n == name));
            if !taken {
                return self.symbol(name, index_width, value_width);
            }
            self.next_id += 1;
        }
    }

    /// A bit-vector constant of the given width
    pub fn bv_const(&mut self, value: u64, width: u32) -> Node {
        self.intern_node(NodeKind::BvConst(value), vec![], 0, width)
    }

    /* Boolean connectives */

    /// Boolean negation. Collapses double negation.
    pub fn not(&mut self, n: Node) -> Node {
        if *n.kind() == NodeKind::Not {
            n.children()[0].clone()
        } else {
            self.intern_node(NodeKind::Not, vec![n], 0, 0)
        }
    }

    /// Boolean conjunction. Connectives require at least one operand.
    pub fn and(&mut self, ns: Vec<Node>) -> Node {
        debug_assert!(!ns.is_empty(), "empty connective");
        self.intern_node(NodeKind::And, ns, 0, 0)
    }

    /// Negated conjunction
    pub fn nand(&mut self, ns: Vec<Node>) -> Node {
        debug_assert!(!ns.is_empty(), "empty connective");
        self.intern_node(NodeKind::Nand, ns, 0, 0)
    }

    /// Boolean disjunction
    pub fn or(&mut self, ns: Vec<Node>) -> Node {
        debug_assert!(!ns.is_empty(), "empty connective");
        self.intern_node(NodeKind::Or, ns, 0, 0)
    }

    /// Negated disjunction
    pub fn nor(&mut self, ns: Vec<Node>) -> Node {
        debug_assert!(!ns.is_empty(), "empty connective");
        self.intern_node(NodeKind::Nor, ns, 0, 0)
    }

    /// Exclusive or of two or more operands
    pub fn xor(&mut self, ns: Vec<Node>) -> Node {
        debug_assert!(ns.len() >= 2, "exclusive or needs two operands");
        self.intern_node(NodeKind::Xor, ns, 0, 0)
    }

    /// Boolean implication
    pub fn implies(&mut self, l: Node, r: Node) -> Node {
        self.intern_node(NodeKind::Implies, vec![l, r], 0, 0)
    }

    /// If-then-else. Takes its widths from the branches, so the same
    /// constructor serves the connective and the term case-split.
    pub fn ite(&mut self, cond: Node, then_branch: Node, else_branch: Node) -> Node {
        let iw = then_branch.index_width();
        let vw = then_branch.value_width();
        self.intern_node(NodeKind::Ite, vec![cond, then_branch, else_branch], iw, vw)
    }

    /* Predicates */

    /// Term equality
    pub fn eq(&mut self, l: Node, r: Node) -> Node {
        self.intern_node(NodeKind::Eq, vec![l, r], 0, 0)
    }

    /// Extraction of bit `idx` of term `t` as a Boolean atom
    pub fn bool_extract(&mut self, t: Node, idx: Node) -> Node {
        self.intern_node(NodeKind::BoolExtract, vec![t, idx], 0, 0)
    }

    /* Term operators */

    /// Bit-vector addition
    pub fn bv_add(&mut self, ns: Vec<Node>) -> Node {
        let vw = ns.first().map(|n| n.value_width()).unwrap_or(0);
        self.intern_node(NodeKind::BvAdd, ns, 0, vw)
    }

    /// Bit-wise conjunction
    pub fn bv_and(&mut self, ns: Vec<Node>) -> Node {
        let vw = ns.first().map(|n| n.value_width()).unwrap_or(0);
        self.intern_node(NodeKind::BvAnd, ns, 0, vw)
    }

    /// Bit-wise negation
    pub fn bv_not(&mut self, n: Node) -> Node {
        let vw = n.value_width();
        self.intern_node(NodeKind::BvNot, vec![n], 0, vw)
    }

    /// Bit-vector concatenation
    pub fn bv_concat(&mut self, ns: Vec<Node>) -> Node {
        let vw = ns.iter().map(|n| n.value_width()).sum();
        self.intern_node(NodeKind::BvConcat, ns, 0, vw)
    }
}
