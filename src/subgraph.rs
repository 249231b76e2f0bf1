use std::borrow::Cow;

use thiserror::Error;

use crate::{
    tensor::TensorError,
    workspace::{Workspace, WorkspaceError},
};

/// Reported by a [`Subgraph`] when a body invocation fails.
///
/// Fatal to the enclosing loop invocation; the driver never retries.
#[derive(Debug, Error)]
#[error("subgraph execution error: {0}")]
pub struct ExecutionFailure(Cow<'static, str>);

impl ExecutionFailure {
    pub fn new(reason: impl Into<Cow<'static, str>>) -> Self {
        Self(reason.into())
    }
}

impl From<TensorError> for ExecutionFailure {
    fn from(err: TensorError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<WorkspaceError> for ExecutionFailure {
    fn from(err: WorkspaceError) -> Self {
        Self::new(err.to_string())
    }
}

/// A subgraph's external interface: its named inputs and outputs, in the
/// positional order the enclosing operator binds them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubgraphDef {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl SubgraphDef {
    pub fn new<I, O>(inputs: I, outputs: O) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            outputs: outputs.into_iter().map(Into::into).collect(),
        }
    }
}

/// The execution contract of a loop body.
///
/// A subgraph must support repeated invocation with mutated bound inputs and
/// make updated output values observable in the workspace immediately after
/// `run` returns success.
pub trait Subgraph {
    fn run(&mut self, ws: &mut Workspace) -> Result<(), ExecutionFailure>;
}

impl<F> Subgraph for F
where
    F: FnMut(&mut Workspace) -> Result<(), ExecutionFailure>,
{
    fn run(&mut self, ws: &mut Workspace) -> Result<(), ExecutionFailure> {
        self(ws)
    }
}
