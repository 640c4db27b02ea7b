//! Plain-text rendering of a scheduled [`Cfg`], one block at a time:
//!
//! ```text
//! cfg {
//!   b0 {
//!     i0 = literal 0
//!     i1 = jump ^b0
//!   }
//!   b0 -> b1
//!   ...
//! }
//! ```
//!
//! Instructions are numbered by final position (blocks in creation order,
//! then in-block order), so the rendering doubles as a determinism check:
//! two runs over the same input graph must produce identical text.

use crate::cfg::{Cfg, ControlRef};
use itertools::Itertools as _;
use std::fmt::Write as _;

pub fn cfg_to_string(cfg: &Cfg) -> String {
    let mut number = vec![usize::MAX; cfg.num_insts()];
    let mut next = 0;
    for block in cfg.blocks() {
        for &inst in &cfg[block].insts {
            number[inst.index()] = next;
            next += 1;
        }
    }

    let mut out = String::new();
    out.push_str("cfg {\n");
    for block in cfg.blocks() {
        let _ = writeln!(out, "  b{} {{", block.index());
        for &inst in &cfg[block].insts {
            let def = &cfg[inst];
            let parts = def
                .control
                .iter()
                .map(|&control_ref| match control_ref {
                    ControlRef::Block(b) => format!("^b{}", b.index()),
                    ControlRef::Inst(i) => format!("^i{}", number[i.index()]),
                })
                .chain(def.literals.iter().map(|literal| literal.to_string()))
                .chain(def.inputs.iter().map(|input| format!("i{}", number[input.index()])))
                .collect::<Vec<_>>();
            let _ = write!(out, "    i{} = {}", number[inst.index()], def.op.name());
            if parts.is_empty() {
                out.push('\n');
            } else {
                let _ = writeln!(out, " {}", parts.iter().format(", "));
            }
        }
        out.push_str("  }\n");
        if !cfg[block].succs.is_empty() {
            let _ = writeln!(
                out,
                "  b{} -> {}",
                block.index(),
                cfg[block].succs.iter().map(|succ| format!("b{}", succ.index())).format(", ")
            );
        }
    }
    out.push_str("}\n");
    out
}
