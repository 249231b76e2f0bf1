use itertools::Itertools;

use super::ConfigError;
use crate::{
    subgraph::SubgraphDef,
    tensor::TensorError,
    workspace::{SlotId, Workspace},
};

/// The positional binding between loop roles and a body's named slots.
///
/// The body's declared inputs are bound as `[iteration_index, condition_in,
/// lcd_0 ..]` and its outputs as `[condition_out, lcd_0 .., scan_0 ..]`.
/// Binding happens once; the handles stay fixed for the operator's lifetime,
/// so the body observes every role through the same storage identity on every
/// iteration of every invocation.
#[derive(Debug, Clone)]
pub struct StateBinder {
    /// Body input 0, a scalar `i64`.
    iteration: SlotId,
    /// Body input 1, a scalar boolean.
    cond_in: SlotId,
    /// Body output 0, a scalar boolean produced by each run.
    cond_out: SlotId,
    /// Body inputs 2.., holding the current loop-carried values.
    carried: Vec<SlotId>,
    /// Body outputs 1..=N, the values produced by each run.
    produced: Vec<SlotId>,
    /// Body outputs N+1.., one scan slice per run.
    scans: Vec<SlotId>,
}

impl StateBinder {
    /// Establish the binding into `body`'s named slots, creating them as needed.
    ///
    /// Enforces the body arity contract: `2+N` inputs and `1+N+K` outputs.
    pub fn bind(ws: &mut Workspace, body: &SubgraphDef) -> Result<Self, ConfigError> {
        let lcds = body
            .inputs
            .len()
            .checked_sub(2)
            .ok_or(ConfigError::BodyInputs(body.inputs.len()))?;
        if body.outputs.len() < 1 + lcds {
            return Err(ConfigError::BodyOutputs {
                got: body.outputs.len(),
                lcds,
            });
        }

        let iteration = ws.bind(&body.inputs[0]);
        let cond_in = ws.bind(&body.inputs[1]);
        let carried = body.inputs[2..].iter().map(|name| ws.bind(name)).collect();

        let cond_out = ws.bind(&body.outputs[0]);
        let produced = body.outputs[1..1 + lcds]
            .iter()
            .map(|name| ws.bind(name))
            .collect();
        let scans = body.outputs[1 + lcds..]
            .iter()
            .map(|name| ws.bind(name))
            .collect();

        Ok(Self {
            iteration,
            cond_in,
            cond_out,
            carried,
            produced,
            scans,
        })
    }

    /// Slots holding the current loop-carried values (body inputs 2..).
    #[inline]
    pub fn lcd_slots(&self) -> &[SlotId] {
        &self.carried
    }

    /// Slots the body writes one scan slice into per run (body outputs N+1..).
    #[inline]
    pub fn scan_slots(&self) -> &[SlotId] {
        &self.scans
    }

    /// Seed the loop-carried slots from the operator's initial inputs.
    pub fn seed(&self, ws: &mut Workspace, initial: &[SlotId]) {
        for (&src, &dst) in initial.iter().zip_eq(&self.carried) {
            ws.copy(src, dst);
        }
    }

    /// Write the iteration index and the condition going into this iteration
    /// into the body's first two input slots.
    pub fn stage(&self, ws: &mut Workspace, iteration: i64, condition: bool) {
        ws.get_mut(self.iteration).set_scalar(iteration);
        ws.get_mut(self.cond_in).set_bool(condition);
    }

    /// Copy each produced value back into its loop-carried slot after a
    /// successful run. Copies rather than aliases: the body may overwrite its
    /// output slots on the next run.
    pub fn commit(&self, ws: &mut Workspace) {
        for (&src, &dst) in self.produced.iter().zip_eq(&self.carried) {
            ws.copy(src, dst);
        }
    }

    /// The condition produced by the last body run.
    pub fn condition(&self, ws: &Workspace) -> Result<bool, TensorError> {
        ws.get(self.cond_out).bool_value()
    }
}
