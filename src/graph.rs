//! Input IR: an arena of instructions forming a "sea of nodes".
//!
//! Control flow is expressed as data-like edges between instructions rather
//! than as a predetermined block structure: a node with explicit control
//! inputs is anchored ("pinned") after them, while everything else floats
//! freely, constrained only by its data dependencies. Every edge is kept
//! bidirectionally: next to the ordered `inputs`/`control` lists, each node
//! carries reverse `uses`/`control_uses` lists of `(user, slot)` pairs,
//! which is what lets the scheduler walk the graph forward.
//!
//! All edges are dense [`Node`] indices into the owning [`Graph`] arena,
//! so the (otherwise cyclic) graph needs no reference counting.

use smallvec::SmallVec;
use std::borrow::Cow;

/// Dense handle for a [`NodeDef`] in a [`Graph`], stable for the whole
/// lifetime of the graph.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Node(u32);

impl Node {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Instruction kind.
///
/// The scheduler only interprets the control-flow opcodes; everything else
/// travels through it as an uninterpreted [`Op::Plain`] computation.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Op {
    /// Entry-point control-merge marker: becomes the entry block.
    Start,
    /// Control-merge marker: becomes a block boundary, never an instruction.
    Region,
    /// Value merge (printed `ssa:phi`); its `i`-th data input corresponds to
    /// the `i`-th predecessor edge of the merge block it is anchored to.
    Phi,
    /// Two-way branch on a single value input.
    If,
    /// Unconditional branch.
    Jump,
    /// Leave the current function, optionally returning a value.
    Return,
    /// Leave the program entirely.
    Exit,
    /// Any non-control computation (`"literal"`, `"add"`, `"read()"`, ...).
    Plain(Cow<'static, str>),
}

impl Op {
    /// Control-merge markers become block boundaries instead of instructions.
    pub fn is_merge(&self) -> bool {
        matches!(self, Op::Start | Op::Region)
    }

    pub fn name(&self) -> &str {
        match self {
            Op::Start => "start",
            Op::Region => "region",
            Op::Phi => "ssa:phi",
            Op::If => "if",
            Op::Jump => "jump",
            Op::Return => "return",
            Op::Exit => "exit",
            Op::Plain(name) => name,
        }
    }
}

impl From<&'static str> for Op {
    fn from(name: &'static str) -> Self {
        match name {
            "start" => Op::Start,
            "region" => Op::Region,
            "ssa:phi" => Op::Phi,
            "if" => Op::If,
            "jump" => Op::Jump,
            "return" => Op::Return,
            "exit" => Op::Exit,
            _ => Op::Plain(name.into()),
        }
    }
}

/// Constant operand attached to a node (kept apart from data inputs, which
/// always reference other nodes).
//
// NOTE: `#[from(forward)]` on `Str` would overlap the derived
// `From<bool>`/`From<i64>` impls (E0119), so the `&str` case is spelled out.
#[derive(Clone, PartialEq, Eq, Hash, Debug, derive_more::From)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Str(Cow<'static, str>),
}

impl From<&'static str> for Literal {
    fn from(s: &'static str) -> Self {
        Literal::Str(s.into())
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// Definition of a [`Node`]. Immutable during scheduling; only readable
/// outside this module (the [`Graph`] builder methods keep the reverse-edge
/// lists consistent, so there is no `IndexMut`).
pub struct NodeDef {
    pub op: Op,

    /// Ordered data dependencies (value operands).
    pub inputs: SmallVec<[Node; 2]>,

    /// Explicit control anchors (at most 2); a node with any is *pinned*:
    /// it executes in the block of (or implied by) its first anchor.
    pub control: SmallVec<[Node; 2]>,

    /// Constant operands.
    pub literals: SmallVec<[Literal; 1]>,

    /// Reverse data edges: `(user, slot)` for each `user.inputs[slot]`
    /// referencing this node.
    pub uses: Vec<(Node, usize)>,

    /// Reverse control edges: `(user, slot)` for each `user.control[slot]`
    /// referencing this node.
    pub control_uses: Vec<(Node, usize)>,
}

/// The input sea-of-nodes arena.
#[derive(Default)]
pub struct Graph {
    nodes: Vec<NodeDef>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The node the whole graph hangs off: by convention the [`Op::Start`]
    /// node, added first.
    pub fn entry(&self) -> Node {
        assert!(!self.nodes.is_empty(), "empty graph has no entry node");
        Node(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl ExactSizeIterator<Item = Node> + use<> {
        (0..u32::try_from(self.nodes.len()).expect("graph too large")).map(Node)
    }

    pub fn add(&mut self, op: impl Into<Op>) -> Node {
        let node = Node(u32::try_from(self.nodes.len()).expect("graph too large"));
        self.nodes.push(NodeDef {
            op: op.into(),
            inputs: SmallVec::new(),
            control: SmallVec::new(),
            literals: SmallVec::new(),
            uses: vec![],
            control_uses: vec![],
        });
        node
    }

    /// [`Graph::add`] plus data inputs, for the common case.
    pub fn add_with_inputs(&mut self, op: impl Into<Op>, inputs: &[Node]) -> Node {
        let node = self.add(op);
        for &input in inputs {
            self.add_input(node, input);
        }
        node
    }

    /// Appends `input` as the next data operand of `node`, recording the
    /// reverse edge on `input`.
    pub fn add_input(&mut self, node: Node, input: Node) {
        let slot = self.nodes[node.index()].inputs.len();
        self.nodes[node.index()].inputs.push(input);
        self.nodes[input.index()].uses.push((node, slot));
    }

    pub fn add_literal(&mut self, node: Node, literal: impl Into<Literal>) {
        self.nodes[node.index()].literals.push(literal.into());
    }

    /// Anchors `node` after the given control inputs (1 or 2), recording the
    /// reverse edges. A node's control can only be set once.
    pub fn set_control(&mut self, node: Node, anchors: &[Node]) {
        assert!(
            matches!(anchors.len(), 1 | 2),
            "a node takes 1 or 2 control inputs, got {}",
            anchors.len()
        );
        assert!(self.nodes[node.index()].control.is_empty(), "control inputs already set");
        for (slot, &anchor) in anchors.iter().enumerate() {
            self.nodes[node.index()].control.push(anchor);
            self.nodes[anchor.index()].control_uses.push((node, slot));
        }
    }
}

impl std::ops::Index<Node> for Graph {
    type Output = NodeDef;
    fn index(&self, node: Node) -> &NodeDef {
        &self.nodes[node.index()]
    }
}
