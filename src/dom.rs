//! Dominator tree and natural-loop depth over a [`Cfg`].
//!
//! Immediate dominators use the iterative algorithm of Cooper, Harvey and
//! Kennedy ("A Simple, Fast Dominance Algorithm"): intersect predecessors'
//! candidate dominators over reverse postorder until a fixed point. The
//! resulting tree is then pre-order numbered so that `dominates` is a pair
//! of integer comparisons, and loop depth counts, per block, the natural
//! loops (one per back-edge target) containing it.

use crate::FxIndexMap;
use crate::FxIndexSet;
use crate::bitset::BitSet;
use crate::cfg::{Block, Cfg};

/// Computes and attaches to every block: `idom`, `dom_depth`, `loop_depth`,
/// and the pre-order interval backing [`Cfg::dominates`].
///
/// Must run after CFG construction and before any placement decision that
/// consults dominance. Every block is assumed reachable from the entry
/// (the scheduler's CFG builder only ever creates linked blocks).
pub fn compute(cfg: &mut Cfg) {
    let po = postorder(cfg);
    debug_assert_eq!(po.len(), cfg.blocks().len());

    // Postorder position per block, for the intersection walk.
    let mut po_num = vec![0u32; cfg.blocks().len()];
    for (i, &block) in po.iter().enumerate() {
        po_num[block.index()] = u32::try_from(i).expect("CFG too large");
    }

    let entry = cfg.entry();
    let mut idom: Vec<Option<Block>> = vec![None; cfg.blocks().len()];
    // Seed the entry with itself so it participates in intersections.
    idom[entry.index()] = Some(entry);

    let mut changed = true;
    while changed {
        changed = false;
        // Reverse postorder, skipping the entry: at least one predecessor of
        // every other block has been processed before the block itself.
        for &block in po.iter().rev().skip(1) {
            let mut preds = cfg[block].preds.iter().copied().filter(|p| idom[p.index()].is_some());
            let mut new_idom = preds.next().expect("unreachable block in CFG");
            for pred in preds {
                new_idom = intersect(&idom, &po_num, new_idom, pred);
            }
            if idom[block.index()] != Some(new_idom) {
                idom[block.index()] = Some(new_idom);
                changed = true;
            }
        }
    }
    idom[entry.index()] = None;

    for block in cfg.blocks() {
        cfg[block].idom = idom[block.index()];
    }

    // Dominance depth, parents first (reverse postorder is topological
    // with respect to dominance).
    for &block in po.iter().rev() {
        cfg[block].dom_depth = match cfg[block].idom {
            Some(parent) => cfg[parent].dom_depth + 1,
            None => 0,
        };
    }

    number_dom_tree(cfg, &po);
    compute_loop_depth(cfg);
}

/// Maximal chain of immediate dominators shared by `a` and `b`.
fn intersect(idom: &[Option<Block>], po_num: &[u32], mut a: Block, mut b: Block) -> Block {
    while a != b {
        while po_num[a.index()] < po_num[b.index()] {
            a = idom[a.index()].expect("unreachable block in CFG");
        }
        while po_num[b.index()] < po_num[a.index()] {
            b = idom[b.index()].expect("unreachable block in CFG");
        }
    }
    a
}

/// Postorder over successor edges, from the entry block.
fn postorder(cfg: &Cfg) -> Vec<Block> {
    let mut po = Vec::with_capacity(cfg.blocks().len());
    let mut visited = BitSet::new(cfg.blocks().len());
    // (block, next successor position) pairs; explicit stack instead of
    // recursion, control chains can be long.
    let mut stack = vec![(cfg.entry(), 0)];
    visited.set(cfg.entry().index());
    while let Some(&mut (block, ref mut next)) = stack.last_mut() {
        match cfg[block].succs.get(*next) {
            Some(&succ) => {
                *next += 1;
                if visited.set(succ.index()) {
                    stack.push((succ, 0));
                }
            }
            None => {
                po.push(block);
                stack.pop();
            }
        }
    }
    po
}

/// Pre-order numbering of the dominator tree: a block's `(pre_number,
/// pre_max)` interval contains exactly its dominated subtree.
fn number_dom_tree(cfg: &mut Cfg, po: &[Block]) {
    let mut children: Vec<Vec<Block>> = vec![vec![]; cfg.blocks().len()];
    for block in cfg.blocks() {
        if let Some(parent) = cfg[block].idom {
            children[parent.index()].push(block);
        }
    }

    let mut next = 0u32;
    let mut stack = vec![cfg.entry()];
    while let Some(block) = stack.pop() {
        cfg[block].pre_number = next;
        cfg[block].pre_max = next;
        next += 1;
        // Reversed push, so children number in block-creation order.
        for &child in children[block.index()].iter().rev() {
            stack.push(child);
        }
    }

    // CFG postorder lists every block after all its dominator-tree children,
    // so a single forward sweep propagates `pre_max` up the tree.
    for &block in po {
        if let Some(parent) = cfg[block].idom {
            cfg[parent].pre_max = cfg[parent].pre_max.max(cfg[block].pre_max);
        }
    }
}

/// Counts, per block, the natural loops containing it. A back edge is an
/// edge `latch -> header` where `header` dominates `latch`; the loop body is
/// everything that reaches the latch without passing through the header.
fn compute_loop_depth(cfg: &mut Cfg) {
    let mut latches_of: FxIndexMap<Block, Vec<Block>> = FxIndexMap::default();
    for block in cfg.blocks() {
        for i in 0..cfg[block].succs.len() {
            let succ = cfg[block].succs[i];
            if cfg.dominates(succ, block) {
                latches_of.entry(succ).or_default().push(block);
            }
        }
    }

    for (header, latches) in latches_of {
        let mut members = FxIndexSet::default();
        members.insert(header);
        let mut stack = vec![];
        for latch in latches {
            if members.insert(latch) {
                stack.push(latch);
            }
        }
        while let Some(block) = stack.pop() {
            for i in 0..cfg[block].preds.len() {
                let pred = cfg[block].preds[i];
                if members.insert(pred) {
                    stack.push(pred);
                }
            }
        }
        for member in members {
            cfg[member].loop_depth += 1;
        }
    }
}
