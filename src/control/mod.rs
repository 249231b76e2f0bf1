//! Loop control flow over a workspace of tensor slots.
//!
//! The [`LoopOp`] operator repeatedly invokes a body subgraph, threading
//! loop-carried state from each iteration's outputs into the next iteration's
//! inputs and stacking per-iteration scan slices into growing buffers.
//! Responsibilities are split across:
//! - [`LoopController`]: pure continue/stop decisions from the trip count and
//!   the latest observed condition.
//! - [`StateBinder`]: the positional binding between loop roles and the body's
//!   named slots, established once and reused every invocation.
//! - [`ScanAccumulator`]: shape-validated, amortized-growth accumulation of
//!   scan outputs.
//! - [`LoopOp`]: the driver composing the above.

use thiserror::Error;

use crate::{
    layout::Layout, subgraph::ExecutionFailure, tensor::TensorError, workspace::WorkspaceError,
};

pub use binder::StateBinder;
pub use controller::LoopController;
pub use driver::{LoopConfig, LoopOp};
pub use scan::ScanAccumulator;

pub mod binder;
pub mod controller;
pub mod driver;
pub mod scan;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("loop body must declare 2+N inputs (iteration index, condition, N loop-carried dependencies), got {0}")]
    BodyInputs(usize),
    #[error("loop body must declare 1+N+K outputs (condition, {lcds} loop-carried dependencies, K scan outputs), got {got}")]
    BodyOutputs { got: usize, lcds: usize },
    #[error("loop operator expects {expected} inputs (trip count, condition, {lcds} loop-carried dependencies), got {got}")]
    OperatorInputs {
        expected: usize,
        got: usize,
        lcds: usize,
    },
    #[error("loop operator expects {expected} outputs ({lcds} final values, {scans} scan outputs), got {got}")]
    OperatorOutputs {
        expected: usize,
        got: usize,
        lcds: usize,
        scans: usize,
    },
}

#[derive(Debug, Error)]
pub enum LoopError {
    #[error("loop configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("loop body failed at iteration {iteration}: {source}")]
    Execution {
        iteration: i64,
        source: ExecutionFailure,
    },
    #[error(
        "scan output {index} changed shape at iteration {iteration}: expected {expected}, got {actual}"
    )]
    ShapeMismatch {
        index: usize,
        iteration: i64,
        expected: Layout,
        actual: Layout,
    },
    #[error(transparent)]
    Tensor(#[from] TensorError),
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}
