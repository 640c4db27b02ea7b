//! Output IR: an explicit control-flow graph of basic blocks, produced by
//! scheduling a [`Graph`](crate::Graph).
//!
//! Each [`Block`] owns an ordered list of placed [`Inst`]s and its
//! predecessor/successor links; after [`dom::compute`](crate::dom::compute)
//! has run it additionally carries its position in the dominator tree
//! (`idom`, `dom_depth`) and its loop nesting depth. Instructions are fully
//! wired: operands reference other placed instructions, and control anchors
//! are [`ControlRef`]s (merge points resolve to blocks, everything else to
//! instructions).

use crate::graph::{Literal, Op};
use smallvec::SmallVec;

/// Dense handle for a [`BlockDef`] in a [`Cfg`]. Blocks are numbered in
/// creation order, which the scheduler keeps deterministic.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Block(u32);

impl Block {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Dense handle for an [`InstDef`] in a [`Cfg`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Inst(u32);

impl Inst {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A placed instruction's control anchor: merge points are never materialized
/// as instructions, so anchoring *at* one resolves to its block, while
/// anchoring *after* an ordinary instruction references that instruction.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ControlRef {
    Block(Block),
    Inst(Inst),
}

/// Definition of a placed [`Inst`].
pub struct InstDef {
    pub op: Op,
    pub literals: SmallVec<[Literal; 1]>,

    /// Value operands, referencing other placed instructions.
    pub inputs: Vec<Inst>,

    /// Control anchors (at most 2), mirroring the input node's control arity.
    pub control: SmallVec<[ControlRef; 2]>,

    /// The block this instruction was placed into.
    pub block: Block,
}

/// Definition of a [`Block`].
#[derive(Default)]
pub struct BlockDef {
    /// Placed instructions, in execution order once the scheduler's control
    /// linearization pass has run (terminator last).
    pub insts: Vec<Inst>,

    /// Predecessor blocks, in the order their outgoing edges were linked
    /// (which is what phi input slots index into).
    pub preds: Vec<Block>,
    pub succs: Vec<Block>,

    /// Immediate dominator; `None` only for the entry block.
    /// Filled in by [`dom::compute`](crate::dom::compute).
    pub idom: Option<Block>,
    /// Depth in the dominator tree (entry = 0).
    pub dom_depth: u32,
    /// Number of natural loops containing this block.
    pub loop_depth: u32,

    // Pre-order interval over the dominator tree, for O(1) `dominates`.
    pub(crate) pre_number: u32,
    pub(crate) pre_max: u32,
}

/// The output control-flow graph.
#[derive(Default)]
pub struct Cfg {
    blocks: Vec<BlockDef>,
    insts: Vec<InstDef>,
}

impl Cfg {
    pub fn new() -> Self {
        Self::default()
    }

    /// The entry block: the first one created.
    pub fn entry(&self) -> Block {
        assert!(!self.blocks.is_empty(), "empty CFG has no entry block");
        Block(0)
    }

    pub fn blocks(&self) -> impl ExactSizeIterator<Item = Block> + use<> {
        (0..u32::try_from(self.blocks.len()).expect("CFG too large")).map(Block)
    }

    pub fn num_insts(&self) -> usize {
        self.insts.len()
    }

    pub fn add_block(&mut self) -> Block {
        let block = Block(u32::try_from(self.blocks.len()).expect("CFG too large"));
        self.blocks.push(BlockDef::default());
        block
    }

    /// Links `from -> to` as a jump edge, appending to both the successor
    /// list of `from` and the predecessor list of `to` (predecessor order is
    /// load-bearing: phi input slots index into it).
    pub fn link(&mut self, from: Block, to: Block) {
        self.blocks[from.index()].succs.push(to);
        self.blocks[to.index()].preds.push(from);
    }

    /// Creates a new instruction of `op` at the end of `block`.
    pub fn append(&mut self, block: Block, op: Op) -> Inst {
        let inst = Inst(u32::try_from(self.insts.len()).expect("CFG too large"));
        self.insts.push(InstDef {
            op,
            literals: SmallVec::new(),
            inputs: vec![],
            control: SmallVec::new(),
            block,
        });
        self.blocks[block.index()].insts.push(inst);
        inst
    }

    /// Detaches the instruction at position `at` of `block`'s list.
    pub fn remove(&mut self, block: Block, at: usize) -> Inst {
        self.blocks[block.index()].insts.remove(at)
    }

    /// Re-attaches a detached instruction at the end of `block`'s list.
    pub fn push(&mut self, block: Block, inst: Inst) {
        self.insts[inst.index()].block = block;
        self.blocks[block.index()].insts.push(inst);
    }

    /// Whether `a` dominates `b` (reflexively). Only meaningful after
    /// [`dom::compute`](crate::dom::compute) has run on this CFG.
    pub fn dominates(&self, a: Block, b: Block) -> bool {
        let (a, b) = (&self.blocks[a.index()], &self.blocks[b.index()]);
        a.pre_number <= b.pre_number && a.pre_max >= b.pre_max
    }
}

impl std::ops::Index<Block> for Cfg {
    type Output = BlockDef;
    fn index(&self, block: Block) -> &BlockDef {
        &self.blocks[block.index()]
    }
}

impl std::ops::IndexMut<Block> for Cfg {
    fn index_mut(&mut self, block: Block) -> &mut BlockDef {
        &mut self.blocks[block.index()]
    }
}

impl std::ops::Index<Inst> for Cfg {
    type Output = InstDef;
    fn index(&self, inst: Inst) -> &InstDef {
        &self.insts[inst.index()]
    }
}

impl std::ops::IndexMut<Inst> for Cfg {
    fn index_mut(&mut self, inst: Inst) -> &mut InstDef {
        &mut self.insts[inst.index()]
    }
}
