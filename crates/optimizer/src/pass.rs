//! The pass surface: options, the per-function pass trait, and the
//! function-parallel driver.

use rayon::prelude::*;
use serde::Deserialize;
use thiserror::Error;

use ir::{FeatureSet, Function, Module, TypeStore};

use crate::DeadStoreElimination::DeadStoreElimination;
use crate::LocalSubtyping::LocalSubtyping;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PassOptions {
    /// Assume loads, stores and heap accesses never trap on bad addresses.
    /// Without this, every such access is treated as able to transfer
    /// control out of the function.
    #[serde(default)]
    pub ignore_implicit_traps: bool,
    /// Assume no trap of any origin can occur at runtime.
    #[serde(default)]
    pub traps_never_happen: bool,
}

/// Read-only module state shared by all workers of one pass run.
pub struct PassContext<'a> {
    pub types: &'a TypeStore,
    pub features: FeatureSet,
    pub options: &'a PassOptions,
}

/// A function-parallel, in-place pass. Each worker holds exclusive mutable
/// access to exactly one function; the module is read-only.
pub trait Pass: Sync {
    fn name(&self) -> &'static str;

    fn run_on_function(&self, cx: &PassContext, func: &mut Function);
}

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("unknown pass: {0}")]
    UnknownPass(String),
}

/// Runs the named pass over every function of the module.
pub fn run_pass(module: &mut Module, name: &str, options: &PassOptions) -> Result<(), OptimizeError> {
    match name {
        "dead-store-elimination" => run(module, options, &DeadStoreElimination),
        "local-subtyping" => run(module, options, &LocalSubtyping),
        _ => return Err(OptimizeError::UnknownPass(name.to_string())),
    }
    Ok(())
}

/// Dispatches one worker per function.
pub fn run<P: Pass>(module: &mut Module, options: &PassOptions, pass: &P) {
    let Module {
        functions,
        types,
        features,
        ..
    } = module;
    let cx = PassContext {
        types,
        features: *features,
        options,
    };
    functions
        .par_iter_mut()
        .for_each(|func| pass.run_on_function(&cx, func));
}
