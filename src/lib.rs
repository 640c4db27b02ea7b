//! **`seasched`** schedules a "sea of nodes" intermediate representation
//! (instructions related only by data and control dependencies, with no
//! predetermined block structure) into an explicit control-flow graph of
//! basic blocks, performing *global code motion* along the way:
//!
//! 1. a CFG of basic blocks is reconstructed from control dependencies alone
//! 2. dominance (and loop depth) is computed over that CFG
//! 3. every instruction is assigned its block by two-phase scheduling:
//!    the *earliest* legal placement (bounded by data dependencies) is
//!    reconciled with the *latest* useful placement (bounded by use sites),
//!    picking the lowest-loop-depth block in between, so loop-invariant
//!    computations end up hoisted out of loop bodies
//! 4. instructions are emitted into their blocks in dependency order, with
//!    each block's flow-altering instruction last
//!
//! The approach follows Click's "Global Code Motion / Global Value Numbering".
//!
//! #### Notable types/modules
//!
//! * [`Graph`]: the input sea-of-nodes arena, and its builder API
//! * [`Cfg`]: the output CFG (blocks, placed instructions, dominance)
//! * [`Scheduler`]/[`schedule`]: the code-motion pass itself
//! * [`print`](mod@print): plain-text rendering of a scheduled [`Cfg`]

// BEGIN - Embark standard lints v6 for Rust 1.55+
// do not change or add/remove here, but one can add exceptions after this section
// for more info see: <https://github.com/EmbarkStudios/rust-ecosystem/issues/59>
#![deny(unsafe_code)]
#![warn(
    clippy::all,
    clippy::await_holding_lock,
    clippy::char_lit_as_u8,
    clippy::checked_conversions,
    clippy::dbg_macro,
    clippy::debug_assert_with_mut_call,
    clippy::doc_markdown,
    clippy::empty_enum,
    clippy::enum_glob_use,
    clippy::exit,
    clippy::expl_impl_clone_on_copy,
    clippy::explicit_deref_methods,
    clippy::explicit_into_iter_loop,
    clippy::fallible_impl_from,
    clippy::filter_map_next,
    clippy::flat_map_option,
    clippy::float_cmp_const,
    clippy::fn_params_excessive_bools,
    clippy::from_iter_instead_of_collect,
    clippy::if_let_mutex,
    clippy::implicit_clone,
    clippy::imprecise_flops,
    clippy::inefficient_to_string,
    clippy::invalid_upcast_comparisons,
    clippy::large_digit_groups,
    clippy::large_stack_arrays,
    clippy::large_types_passed_by_value,
    clippy::let_unit_value,
    clippy::linkedlist,
    clippy::lossy_float_literal,
    clippy::macro_use_imports,
    clippy::manual_ok_or,
    clippy::map_err_ignore,
    clippy::map_flatten,
    clippy::map_unwrap_or,
    clippy::match_same_arms,
    clippy::match_wild_err_arm,
    clippy::match_wildcard_for_single_variants,
    clippy::mem_forget,
    clippy::missing_enforced_import_renames,
    clippy::mut_mut,
    clippy::mutex_integer,
    clippy::needless_borrow,
    clippy::needless_continue,
    clippy::needless_for_each,
    clippy::option_option,
    clippy::path_buf_push_overwrite,
    clippy::ptr_as_ptr,
    clippy::rc_mutex,
    clippy::ref_option_ref,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::same_functions_in_if_condition,
    clippy::semicolon_if_nothing_returned,
    clippy::single_match_else,
    clippy::string_add_assign,
    clippy::string_add,
    clippy::string_lit_as_bytes,
    clippy::string_to_string,
    clippy::todo,
    clippy::trait_duplication_in_bounds,
    clippy::unimplemented,
    clippy::unnested_or_patterns,
    clippy::unused_self,
    clippy::useless_transmute,
    clippy::verbose_file_reads,
    clippy::zero_sized_map_values,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms
)]
// END - Embark standard lints v6 for Rust 1.55+
// crate-specific exceptions:
#![allow(
    // NOTE: ignored for readability (`match` used when `if let` is too long).
    clippy::single_match_else,
)]
// NOTE: this is stronger than the "Embark standard lints" above, because
// we never need `unsafe` code and this is a further "speed bump" to it.
#![forbid(unsafe_code)]

mod bitset;
pub mod cfg;
pub mod dom;
pub mod graph;
pub mod print;
pub mod schedule;

// HACK: work around the lack of `FxIndex{Map,Set}` type aliases elsewhere.
#[doc(hidden)]
type FxIndexMap<K, V> =
    indexmap::IndexMap<K, V, std::hash::BuildHasherDefault<rustc_hash::FxHasher>>;
#[doc(hidden)]
type FxIndexSet<V> = indexmap::IndexSet<V, std::hash::BuildHasherDefault<rustc_hash::FxHasher>>;

pub use cfg::{Block, Cfg, ControlRef, Inst};
pub use graph::{Graph, Literal, Node, Op};
pub use schedule::{ScheduleError, Scheduler, schedule};
