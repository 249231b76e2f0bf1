//! `coil` is a loop control-flow engine for tensor computation graphs.
//! Given a body sub-computation that consumes an iteration index, a boolean condition,
//! and a set of state values, it repeatedly invokes the body, threads the evolving state
//! across invocations, and stacks one per-iteration slice per scan output into growing buffers.
//!
//! ## Key Components
//! 1. **Tensor Storage**:
//!    - Byte-backed tensor values ([`TensorValue`]) with shapes ([`Layout`]) and element types ([`DataType`]).
//!    - Copy, resize, and geometric-growth extension of the leading dimension.
//!
//! 2. **Workspace**:
//!    - An owning table of named tensor slots ([`Workspace`]).
//!    - Stable, non-owning [`SlotId`] handles established once and reused across invocations.
//!
//! 3. **Subgraph Execution**:
//!    - Named input/output declarations ([`SubgraphDef`]).
//!    - The [`Subgraph`] run contract, implemented by graph executors or plain closures.
//!
//! 4. **Loop Control**:
//!    - Pure continue/stop decisions ([`control::LoopController`]).
//!    - State binding and threading ([`control::StateBinder`]).
//!    - Amortized-growth scan accumulation ([`control::ScanAccumulator`]).
//!    - The [`LoopOp`] operator driving everything through its state machine.
//!
//! ## Design Principles
//! - **Stability**: the body observes the iteration index, condition, and state through
//!   the same storage slots every iteration, never through freshly allocated values.
//! - **Efficiency**: scan buffers grow geometrically, so appending n slices costs O(n)
//!   total copying and O(log n) reallocations.
//! - **Transparency**: every failure surfaces synchronously to the caller; nothing is
//!   retried or downgraded.

pub mod control;
pub mod layout;
pub mod num;
pub mod subgraph;
pub mod tensor;
pub mod workspace;

pub use control::{LoopConfig, LoopError, LoopOp};
pub use layout::{IntoLayout, Layout};
pub use num::{DataType, Scalar};
pub use subgraph::{ExecutionFailure, Subgraph, SubgraphDef};
pub use tensor::{TensorError, TensorValue};
pub use workspace::{SlotId, Workspace, WorkspaceError};
