//! End-to-end scheduling tests: each builds a sea-of-nodes graph through the
//! public builder API, schedules it, and checks the rendered CFG (rendering
//! is position-numbered, so these also pin down block and instruction order).

use pretty_assertions::assert_eq;
use seasched::print::cfg_to_string;
use seasched::{ControlRef, Graph, Op, ScheduleError, schedule};

fn assert_cfg(graph: &Graph, expected: &str) {
    let cfg = schedule(graph).expect("scheduling failed");
    assert_eq!(cfg_to_string(&cfg), expected);
}

/// The running example from Click's thesis: a counting loop accumulating
/// `phi + (read() + 1)` until it passes 10, then returning double the total.
fn loop_counter() -> Graph {
    let mut g = Graph::new();
    let start = g.add("start");
    let body = g.add("region");
    let exit = g.add("region");

    let start_jump = g.add("jump");
    g.set_control(start_jump, &[start]);

    let zero = g.add("literal");
    g.add_literal(zero, 0);
    let read = g.add("read()");

    let phi = g.add_with_inputs("ssa:phi", &[zero]);
    g.set_control(phi, &[body]);
    let one = g.add("literal");
    g.add_literal(one, 1);
    let add_one = g.add_with_inputs("add", &[read, one]);
    let next = g.add_with_inputs("add", &[phi, add_one]);
    g.add_input(phi, next);

    let ten = g.add("literal");
    g.add_literal(ten, 10);
    let cmp = g.add_with_inputs("le", &[next, ten]);
    let branch = g.add_with_inputs("if", &[cmp]);
    g.set_control(branch, &[phi]);

    g.set_control(body, &[start_jump, branch]);

    let two = g.add("literal");
    g.add_literal(two, 2);
    let mul = g.add_with_inputs("mul", &[next, two]);

    g.set_control(exit, &[branch]);
    let ret = g.add_with_inputs("return", &[mul]);
    g.set_control(ret, &[exit]);
    g
}

fn diamond_merge() -> Graph {
    let mut g = Graph::new();
    let start = g.add("start");
    let cond = g.add("literal");
    g.add_literal(cond, true);
    let branch = g.add_with_inputs("if", &[cond]);
    g.set_control(branch, &[start]);

    let left = g.add("region");
    g.set_control(left, &[branch]);
    let left_value = g.add("literal");
    g.add_literal(left_value, "left");
    let left_jump = g.add("jump");
    g.set_control(left_jump, &[left]);

    let right = g.add("region");
    g.set_control(right, &[branch]);
    let right_value = g.add("literal");
    g.add_literal(right_value, "right");
    let right_jump = g.add("jump");
    g.set_control(right_jump, &[right]);

    let merge = g.add("region");
    g.set_control(merge, &[left_jump, right_jump]);
    let phi = g.add_with_inputs("ssa:phi", &[left_value, right_value]);
    g.set_control(phi, &[merge]);
    let ret = g.add_with_inputs("return", &[phi]);
    g.set_control(ret, &[phi]);
    g
}

fn single_block() -> Graph {
    let mut g = Graph::new();
    let start = g.add("start");
    let ret = g.add("return");
    g.set_control(ret, &[start]);
    let one = g.add("literal");
    g.add_literal(one, 1);
    let add = g.add_with_inputs("add", &[one]);
    let two = g.add("literal");
    g.add_literal(two, 2);
    g.add_input(add, two);
    g.add_input(ret, add);
    g
}

#[test]
fn loop_counter_hoists_invariants_to_entry() {
    // All literals and the side-effecting read are loop-invariant: they get
    // hoisted to the entry block, leaving only the accumulate/compare/branch
    // in the loop and the multiply/return in the exit.
    assert_cfg(
        &loop_counter(),
        "\
cfg {
  b0 {
    i0 = literal 0
    i1 = read()
    i2 = literal 1
    i3 = add i1, i2
    i4 = literal 10
    i5 = jump ^b0
  }
  b0 -> b1
  b1 {
    i6 = ssa:phi ^b1, i0, i7
    i7 = add i6, i3
    i8 = le i7, i4
    i9 = if ^i6, i8
  }
  b1 -> b1, b2
  b2 {
    i10 = literal 2
    i11 = mul i7, i10
    i12 = return ^b2, i11
  }
}
",
    );
}

#[test]
fn diamond_merge_keeps_phi_operands_on_their_edges() {
    // Each phi operand's use site is the incoming edge's origin block, so
    // the operand literals settle in the branch blocks, not the merge.
    assert_cfg(
        &diamond_merge(),
        "\
cfg {
  b0 {
    i0 = literal true
    i1 = if ^b0, i0
  }
  b0 -> b1, b2
  b1 {
    i2 = literal \"left\"
    i3 = jump ^b1
  }
  b1 -> b3
  b2 {
    i4 = literal \"right\"
    i5 = jump ^b2
  }
  b2 -> b3
  b3 {
    i6 = ssa:phi ^b3, i2, i4
    i7 = return ^i6, i6
  }
}
",
    );
}

#[test]
fn single_block_emits_in_dependency_order() {
    assert_cfg(
        &single_block(),
        "\
cfg {
  b0 {
    i0 = literal 1
    i1 = literal 2
    i2 = add i0, i1
    i3 = return ^b0, i2
  }
}
",
    );
}

#[test]
fn region_to_region_control_edges() {
    // b2 jumps back to the b1 region: three single-jump blocks with a loop.
    let mut g = Graph::new();
    let start = g.add("start");
    let start_end = g.add("jump");
    g.set_control(start_end, &[start]);

    let merge = g.add("region");
    let merge_end = g.add("jump");
    g.set_control(merge_end, &[merge]);

    let end = g.add("region");
    g.set_control(end, &[merge_end]);
    let end_end = g.add("jump");
    g.set_control(end_end, &[end]);

    g.set_control(merge, &[start_end, end_end]);

    assert_cfg(
        &g,
        "\
cfg {
  b0 {
    i0 = jump ^b0
  }
  b0 -> b1
  b1 {
    i1 = jump ^b1
  }
  b1 -> b2
  b2 {
    i2 = jump ^b2
  }
  b2 -> b1
}
",
    );
}

#[test]
fn merge_falling_through_to_merge_gets_synthetic_jump() {
    // `start` flows directly into a region with no branch in between: the
    // entry block has no terminator of its own, so a jump is synthesized.
    let mut g = Graph::new();
    let start = g.add("start");
    let merge = g.add("region");
    g.set_control(merge, &[start]);
    let ret = g.add("return");
    g.set_control(ret, &[merge]);

    assert_cfg(
        &g,
        "\
cfg {
  b0 {
    i0 = jump
  }
  b0 -> b1
  b1 {
    i1 = return ^b1
  }
}
",
    );
}

#[test]
fn control_chains_pin_to_the_anchor_block() {
    // `exit` is anchored to `middle`, an ordinary instruction: the chain
    // stays in the anchor's block and the anchor resolves to an instruction
    // reference, not a block.
    let mut g = Graph::new();
    let start = g.add("start");
    let effect = g.add("effect");
    g.set_control(effect, &[start]);
    let middle = g.add("middle");
    g.set_control(middle, &[start]);
    let exit = g.add("exit");
    g.set_control(exit, &[middle]);

    assert_cfg(
        &g,
        "\
cfg {
  b0 {
    i0 = middle ^b0
    i1 = effect ^b0
    i2 = exit ^i0
  }
}
",
    );
}

#[test]
fn data_inputs_dominate_their_users() {
    let cfg = schedule(&loop_counter()).expect("scheduling failed");
    for block in cfg.blocks() {
        for &inst in &cfg[block].insts {
            for &input in &cfg[inst].inputs {
                assert!(
                    cfg.dominates(cfg[input].block, cfg[inst].block),
                    "{input:?} does not dominate its use {inst:?}"
                );
            }
        }
    }
}

#[test]
fn pinned_instructions_stay_with_their_anchor() {
    let cfg = schedule(&loop_counter()).expect("scheduling failed");
    for block in cfg.blocks() {
        for &inst in &cfg[block].insts {
            match cfg[inst].control.first() {
                // Anchored at a merge point: placed in that very block.
                Some(&ControlRef::Block(anchor)) => assert_eq!(anchor, cfg[inst].block),
                // Anchored after an instruction: placed in its block.
                Some(&ControlRef::Inst(anchor)) => {
                    assert_eq!(cfg[anchor].block, cfg[inst].block);
                }
                None => {}
            }
        }
    }
}

#[test]
fn at_most_one_terminator_per_block_and_last() {
    for graph in [loop_counter(), diamond_merge(), single_block()] {
        let cfg = schedule(&graph).expect("scheduling failed");
        for block in cfg.blocks() {
            let insts = &cfg[block].insts;
            let flow: Vec<_> = insts
                .iter()
                .filter(|&&inst| {
                    matches!(cfg[inst].op, Op::If | Op::Jump | Op::Return | Op::Exit)
                })
                .collect();
            assert!(flow.len() <= 1, "block {block:?} has {} terminators", flow.len());
            if let Some(&&term) = flow.first() {
                assert_eq!(insts.last(), Some(&term), "terminator of {block:?} is not last");
            }
        }
    }
}

#[test]
fn scheduling_is_deterministic() {
    let first = cfg_to_string(&schedule(&loop_counter()).expect("scheduling failed"));
    let second = cfg_to_string(&schedule(&loop_counter()).expect("scheduling failed"));
    assert_eq!(first, second);
}

#[test]
fn loop_invariant_read_lands_outside_the_loop() {
    let cfg = schedule(&loop_counter()).expect("scheduling failed");
    for block in cfg.blocks() {
        for &inst in &cfg[block].insts {
            if cfg[inst].op.name() == "read()" {
                assert_eq!(cfg[block].loop_depth, 0);
                assert_eq!(block, cfg.entry());
                return;
            }
        }
    }
    panic!("read() was not emitted");
}

#[test]
fn unreachable_and_dead_nodes_are_dropped() {
    let baseline = cfg_to_string(&schedule(&single_block()).expect("scheduling failed"));

    let mut g = single_block();
    // A pure value nothing uses, and a control segment hanging off an
    // unconnected region: neither reaches the output.
    let dead = g.add("literal");
    g.add_literal(dead, 5);
    let orphan = g.add("region");
    let effect = g.add("effect");
    g.set_control(effect, &[orphan]);

    let pruned = cfg_to_string(&schedule(&g).expect("scheduling failed"));
    assert_eq!(pruned, baseline);
}

#[test]
fn phi_without_matching_predecessor_fails_fast() {
    let mut g = Graph::new();
    let start = g.add("start");
    let start_jump = g.add("jump");
    g.set_control(start_jump, &[start]);
    let merge = g.add("region");
    g.set_control(merge, &[start_jump]);

    let a = g.add("literal");
    g.add_literal(a, 1);
    let b = g.add("literal");
    g.add_literal(b, 2);
    // Two phi inputs, but the merge block only has one incoming edge.
    let phi = g.add_with_inputs("ssa:phi", &[a, b]);
    g.set_control(phi, &[merge]);
    let ret = g.add_with_inputs("return", &[phi]);
    g.set_control(ret, &[phi]);

    match schedule(&g) {
        Err(ScheduleError::PhiPredecessorMismatch { slot, .. }) => assert_eq!(slot, 1),
        Err(other) => panic!("expected PhiPredecessorMismatch, got {other}"),
        Ok(_) => panic!("expected PhiPredecessorMismatch, got a schedule"),
    }
}
