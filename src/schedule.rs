//! Global code motion: scheduling a sea-of-nodes [`Graph`] into a [`Cfg`].
//!
//! The pass runs in five phases over one [`Scheduler`] context:
//!
//! 1. **CFG construction**: walk control dependencies from the entry node,
//!    cutting blocks at control-merge points (`start`/`region`); every
//!    non-merge instruction reached this way is *pinned* to its block and
//!    queued on the scheduling worklist.
//! 2. **Dominance** ([`dom::compute`]) over the fresh CFG.
//! 3. **Early scheduling**: per instruction, the shallowest block that still
//!    dominates the block of every data input.
//! 4. **Late scheduling**: per instruction, the dominator-tree LCA of all
//!    use sites bounds the latest useful placement; the instruction then
//!    settles on the lowest-loop-depth block between that bound and its
//!    early placement, hoisting loop-invariant work out of loop bodies.
//! 5. **Placement and linearization**: emit each worklist instruction (and,
//!    transitively, its operands) into its block in dependency order, wire
//!    operands/literals/control anchors, and move each block's terminator
//!    to the end of its instruction list.
//!
//! Control-unreachable nodes are silently dropped; pure values that are
//! never used keep their early placement but are dropped too (nothing pulls
//! them into the output). Both are expected inputs, not errors.

use crate::bitset::BitSet;
use crate::cfg::{Block, Cfg, ControlRef, Inst};
use crate::graph::{Graph, Node, Op};
use crate::{FxIndexMap, dom};
use smallvec::SmallVec;
use tracing::debug;

/// Structural-consistency failure: scheduling either completes consistently
/// or fails fast, since silent misplacement would corrupt the semantics of
/// the generated program.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// A phi's input slot has no matching predecessor edge on the merge
    /// block it is anchored to.
    #[error("phi {phi:?}: input slot {slot} has no matching predecessor edge")]
    PhiPredecessorMismatch { phi: Node, slot: usize },

    /// An instruction is anchored to a control input that CFG construction
    /// never reached, so it has no position to resolve against.
    #[error("control anchor {anchor:?} was never reached by CFG construction")]
    UnscheduledControlAnchor { anchor: Node },
}

/// Schedules `graph` into a freshly built [`Cfg`].
pub fn schedule(graph: &Graph) -> Result<Cfg, ScheduleError> {
    Scheduler::new(graph).run()
}

/// Single-run scheduling context. All placement state lives here, sized to
/// the input node count, and is discarded with the run.
pub struct Scheduler<'a> {
    graph: &'a Graph,
    output: Cfg,

    /// `block_of[n]`: the block chosen for input node `n`; `None` while
    /// unscheduled, and permanently for control-unreachable nodes.
    block_of: Vec<Option<Block>>,

    /// `placed[n]`: the output instruction emitted for input node `n`.
    placed: Vec<Option<Inst>>,

    /// Reverse map from placed instructions to their original nodes, used to
    /// classify terminators; synthetic jumps have no entry.
    original: FxIndexMap<Inst, Node>,

    /// Shared by CFG construction and late scheduling (cleared in between).
    visited: BitSet,

    /// Control-pinned instructions in discovery order; drives the early
    /// scheduling and placement phases.
    worklist: Vec<Node>,
}

impl<'a> Scheduler<'a> {
    pub fn new(graph: &'a Graph) -> Self {
        Self {
            graph,
            output: Cfg::new(),
            block_of: vec![None; graph.len()],
            placed: vec![None; graph.len()],
            original: FxIndexMap::default(),
            visited: BitSet::new(graph.len()),
            worklist: vec![],
        }
    }

    pub fn run(mut self) -> Result<Cfg, ScheduleError> {
        self.construct_cfg();
        dom::compute(&mut self.output);
        debug!(
            blocks = self.output.blocks().len(),
            pinned = self.worklist.len(),
            "constructed CFG from control dependencies"
        );

        for i in 0..self.worklist.len() {
            self.schedule_early(self.worklist[i]);
        }

        self.visited.clear();
        for node in self.graph.nodes() {
            self.schedule_late(node)?;
        }
        debug!(nodes = self.graph.len(), "assigned blocks to all reachable nodes");

        for i in 0..self.worklist.len() {
            self.place(self.worklist[i])?;
        }
        self.linearize_control();

        Ok(self.output)
    }

    /// Walks control dependencies from the entry node with an explicit stack
    /// (control chains can be arbitrarily long), creating one block per
    /// merge point, pinning each straight-line segment's instructions, and
    /// linking jump edges between blocks.
    fn construct_cfg(&mut self) {
        let mut stack = vec![self.graph.entry()];
        while let Some(node) = stack.pop() {
            // Visit each merge point only once.
            if !self.visited.set(node.index()) {
                continue;
            }

            let block = self.get_block(node);

            // Pin this segment's instructions; `last` is the instruction
            // whose control successor is the next merge point, if any.
            let Some(last) = self.queue_control(block, node) else {
                // Dead end: a terminator with no further control successors.
                continue;
            };

            // A merge point flowing straight into another merge point has no
            // explicit branch; give the block a synthetic one.
            if self.graph[last].op.is_merge() {
                self.output.append(block, Op::Jump);
            }

            let succs: SmallVec<[Node; 2]> = self.graph[last]
                .control_uses
                .iter()
                .map(|&(user, _)| user)
                .filter(|&user| self.graph[user].op.is_merge())
                .collect();
            for &succ in &succs {
                let target = self.get_block(succ);
                self.output.link(block, target);
            }
            // Reversed, so the LIFO traversal visits (and numbers) successor
            // blocks in declaration order.
            for &succ in succs.iter().rev() {
                stack.push(succ);
            }
        }
    }

    fn get_block(&mut self, node: Node) -> Block {
        match self.block_of[node.index()] {
            Some(block) => block,
            None => {
                let block = self.output.add_block();
                self.block_of[node.index()] = Some(block);
                block
            }
        }
    }

    /// Expands `node`'s straight-line control segment: every non-merge
    /// instruction reached through control-successor edges is pinned to
    /// `block` and queued for scheduling, stopping at merge points. Returns
    /// the last walked instruction that feeds a merge point, if any.
    fn queue_control(&mut self, block: Block, node: Node) -> Option<Node> {
        let mut last = None;
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            // Reversed, so the LIFO expansion pins users in declaration order.
            for &(user, _) in self.graph[n].control_uses.iter().rev() {
                // A node acting as its own control use would expand forever.
                if user == n {
                    continue;
                }
                if self.graph[user].op.is_merge() {
                    last = Some(n);
                } else {
                    self.block_of[user.index()] = Some(block);
                    self.worklist.push(user);
                    stack.push(user);
                }
            }
        }
        last
    }

    /// Assigns the shallowest legal block: starting from the entry, narrow
    /// to the deepest input block that the candidate still dominates. Pinned
    /// nodes keep their block, but their inputs are scheduled through them
    /// (this is what gives every pure operand its early placement).
    ///
    /// Post-order over data inputs, with an explicit `(node, next input
    /// position)` stack (operand chains can be arbitrarily long); a node is
    /// assigned once all of its inputs are.
    fn schedule_early(&mut self, node: Node) {
        let mut stack = vec![(node, 0)];
        while let Some(&mut (n, ref mut next)) = stack.last_mut() {
            match self.graph[n].inputs.get(*next).copied() {
                Some(input) => {
                    *next += 1;
                    if self.block_of[input.index()].is_none() {
                        stack.push((input, 0));
                    }
                }
                None => {
                    stack.pop();
                    // Highest block by default.
                    let mut block =
                        self.block_of[n.index()].unwrap_or_else(|| self.output.entry());
                    for &input in &self.graph[n].inputs {
                        let input_block = self.block_of[input.index()]
                            .expect("early scheduling left an input unscheduled");
                        if self.output.dominates(block, input_block) {
                            block = input_block;
                        }
                    }
                    // Pinned placement is final.
                    if self.block_of[n.index()].is_none() {
                        self.block_of[n.index()] = Some(block);
                    }
                }
            }
        }
    }

    /// Sinks `node` (and, users before their defs, everything it transitively
    /// feeds) toward its uses, with an explicit `(node, next use position)`
    /// stack; each node settles once all of its movable users have.
    fn schedule_late(&mut self, node: Node) -> Result<(), ScheduleError> {
        if !self.visited.set(node.index()) {
            return Ok(());
        }
        let mut stack = vec![(node, 0)];
        while let Some(&mut (n, ref mut next)) = stack.last_mut() {
            match self.graph[n].uses.get(*next).copied() {
                Some((user, _)) => {
                    *next += 1;
                    // Pinned uses cannot move, so there is nothing to
                    // process for them.
                    if self.graph[user].control.is_empty() && self.visited.set(user.index()) {
                        stack.push((user, 0));
                    }
                }
                None => {
                    stack.pop();
                    self.sink_to_uses(n)?;
                }
            }
        }
        Ok(())
    }

    /// The actual late placement of a single node: the dominator-tree LCA of
    /// all use sites is the latest useful placement, and the walk back up
    /// toward the early placement settles on the lowest loop depth in that
    /// window (preferring the latest such block on ties).
    fn sink_to_uses(&mut self, node: Node) -> Result<(), ScheduleError> {
        // Pinned nodes don't move.
        if !self.graph[node].control.is_empty() {
            return Ok(());
        }

        let mut lca = None;
        for &(user, slot) in &self.graph[node].uses {
            let use_block = match self.graph[user].op {
                // A phi consumes its `slot`-th input along the `slot`-th
                // incoming control edge of its merge block, so the use site
                // is that predecessor, not the merge point.
                Op::Phi => {
                    let merge = self.graph[user]
                        .control
                        .first()
                        .and_then(|anchor| self.block_of[anchor.index()]);
                    match merge {
                        Some(merge) => {
                            Some(self.output[merge].preds.get(slot).copied().ok_or(
                                ScheduleError::PhiPredecessorMismatch { phi: user, slot },
                            )?)
                        }
                        // Unreachable phi: contributes nothing.
                        None => None,
                    }
                }
                _ => self.block_of[user.index()],
            };
            if let Some(use_block) = use_block {
                lca = Some(match lca {
                    Some(lca) => self.find_lca(lca, use_block),
                    None => use_block,
                });
            }
        }

        // Dead (or unreachable) value: keep the early placement.
        let Some(lca) = lca else { return Ok(()) };

        let early = self.block_of[node.index()]
            .expect("late scheduling reached a node with no early placement");
        let mut cursor = lca;
        let mut best = cursor;
        while cursor != early {
            cursor = self.output[cursor].idom.expect("use site not dominated by early placement");
            if self.output[cursor].loop_depth < self.output[best].loop_depth {
                best = cursor;
            }
        }
        self.block_of[node.index()] = Some(best);
        Ok(())
    }

    /// Lowest common ancestor of two blocks in the dominator tree.
    fn find_lca(&self, a: Block, b: Block) -> Block {
        let parent = |block: Block| {
            self.output[block].idom.expect("find_lca walked past the entry block")
        };
        let (mut a, mut b) = (a, b);
        // Get on the same depth level.
        while self.output[a].dom_depth > self.output[b].dom_depth {
            a = parent(a);
        }
        while self.output[b].dom_depth > self.output[a].dom_depth {
            b = parent(b);
        }
        // Go up until the paths meet.
        while a != b {
            a = parent(a);
            b = parent(b);
        }
        a
    }

    /// Emits `node` (and, transitively, whatever it needs) into its resolved
    /// block, memoized through `placed` and driven by an explicit `(node,
    /// next dependency position)` stack.
    ///
    /// A phi is inserted *before* its data inputs are visited: an input
    /// arriving along a loop back edge is only placeable once the phi itself
    /// exists, and inserting first breaks that cycle. Everything else places
    /// its (non-merge) control anchor and its operands first, so operands
    /// appear ahead of their consumers within each block.
    fn place(&mut self, node: Node) -> Result<(), ScheduleError> {
        if self.placed[node.index()].is_some() {
            return Ok(());
        }
        let mut stack = vec![(node, 0)];
        while let Some(&mut (n, ref mut next)) = stack.last_mut() {
            if *next == 0 {
                let block = self.block_of[n.index()]
                    .ok_or(ScheduleError::UnscheduledControlAnchor { anchor: n })?;
                if matches!(self.graph[n].op, Op::Phi) {
                    self.emit(n, block);
                }
            }
            match self.place_dep(n, *next) {
                Some(dep) => {
                    *next += 1;
                    if self.placed[dep.index()].is_none() {
                        stack.push((dep, 0));
                    }
                }
                None => {
                    stack.pop();
                    self.wire(n)?;
                }
            }
        }
        Ok(())
    }

    /// The `at`-th placement dependency of `node`: its data inputs, and (for
    /// anything but a phi) its non-merge control anchors ahead of them.
    fn place_dep(&self, node: Node, at: usize) -> Option<Node> {
        let def = &self.graph[node];
        if matches!(def.op, Op::Phi) {
            return def.inputs.get(at).copied();
        }
        def.control
            .iter()
            .copied()
            .filter(|&anchor| !self.graph[anchor].op.is_merge())
            .chain(def.inputs.iter().copied())
            .nth(at)
    }

    /// Final emission (phis went in up front) and operand/control wiring of
    /// a node whose placement dependencies are all placed.
    fn wire(&mut self, node: Node) -> Result<(), ScheduleError> {
        let inst = match self.placed[node.index()] {
            Some(inst) => inst,
            None => {
                let block = self.block_of[node.index()]
                    .ok_or(ScheduleError::UnscheduledControlAnchor { anchor: node })?;
                self.emit(node, block)
            }
        };

        for &input in &self.graph[node].inputs {
            let input_inst =
                self.placed[input.index()].expect("placement left a data input unplaced");
            self.output[inst].inputs.push(input_inst);
        }
        for &anchor in &self.graph[node].control {
            // Merge points are never materialized, so anchoring at one
            // resolves to its block; any other anchor resolves to its
            // instruction, placed above as a dependency.
            let control_ref = if self.graph[anchor].op.is_merge() {
                let block = self.block_of[anchor.index()]
                    .ok_or(ScheduleError::UnscheduledControlAnchor { anchor })?;
                ControlRef::Block(block)
            } else {
                ControlRef::Inst(
                    self.placed[anchor.index()].expect("placement left a control anchor unplaced"),
                )
            };
            self.output[inst].control.push(control_ref);
        }
        Ok(())
    }

    fn emit(&mut self, node: Node, block: Block) -> Inst {
        let inst = self.output.append(block, self.graph[node].op.clone());
        self.output[inst].literals = self.graph[node].literals.clone();
        self.placed[node.index()] = Some(inst);
        self.original.insert(inst, node);
        inst
    }

    /// Whether `inst` genuinely transfers control out of its block: its
    /// original node feeds a merge point, or it leaves the function/program
    /// outright. Synthetic jumps (no original node) always do.
    fn is_block_terminator(&self, inst: Inst) -> bool {
        match self.original.get(&inst) {
            Some(&node) => {
                matches!(self.graph[node].op, Op::Return | Op::Exit)
                    || self.graph[node]
                        .control_uses
                        .iter()
                        .any(|&(user, _)| self.graph[user].op.is_merge())
            }
            None => matches!(self.output[inst].op, Op::Jump),
        }
    }

    /// Moves each block's flow-altering instruction to the very end of its
    /// instruction list. A block has at most one genuine terminator, so the
    /// scan stops at the first match.
    fn linearize_control(&mut self) {
        for block in self.output.blocks() {
            for at in (0..self.output[block].insts.len()).rev() {
                let inst = self.output[block].insts[at];
                if !self.is_block_terminator(inst) {
                    continue;
                }
                if at + 1 != self.output[block].insts.len() {
                    let inst = self.output.remove(block, at);
                    self.output.push(block, inst);
                }
                break;
            }
        }
    }
}
