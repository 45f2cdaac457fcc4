//! Local-variable dataflow optimizations: a per-function graph linking each
//! local read to the writes that may have produced its value, a dead-store
//! elimination pass built on a forward flow over the control flow graph,
//! and a pass that refines local types to the bound of their assigned
//! values.
#![allow(non_snake_case)]
#![deny(unused_imports)]

pub mod DataFlowAnalysis;
pub mod DeadStoreElimination;
pub mod LocalGraph;
pub mod LocalSubtyping;
pub mod control_flow;
mod pass;
mod small_set;

#[cfg(test)]
mod testing;

pub use pass::{run, run_pass, OptimizeError, Pass, PassContext, PassOptions};
pub use small_set::SmallSet;
