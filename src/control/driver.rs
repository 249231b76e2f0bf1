use itertools::Itertools;

use super::{ConfigError, LoopController, LoopError, ScanAccumulator, StateBinder};
use crate::{
    subgraph::{Subgraph, SubgraphDef},
    workspace::{SlotId, Workspace},
};

/// Fixed configuration of a loop operator.
///
/// The body must declare `2+N` inputs, bound as `[iteration_index,
/// condition_in, lcd_0 ..]`, and `1+N+K` outputs, bound as `[condition_out,
/// lcd_0 .., scan_0 ..]`, where `N` is the number of loop-carried
/// dependencies and `K` the number of scan outputs.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoopConfig {
    pub has_trip_count: bool,
    pub has_condition: bool,
    pub body: SubgraphDef,
}

/// Progress of one loop invocation. Linear; a fresh invocation restarts at
/// `Init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Init,
    Iterating(LoopController),
    Done { executed: i64 },
}

/// The loop operator: drives a body subgraph through repeated invocations,
/// threading loop-carried state and stacking scan outputs.
///
/// Operator inputs are `[max_trip_count (scalar i64), initial_condition
/// (scalar bool), lcd_0 .. lcd_{N-1}]`; the first two are read only when the
/// corresponding configuration flag is set. Operator outputs are
/// `[final lcd_0 .. lcd_{N-1}, scan_0 .. scan_{K-1}]`, with each scan shaped
/// `[executed_iterations, *per_iteration_shape]`.
///
/// Slot bindings are established once at construction and reused across
/// invocations. The operator is not reentrant: invocations of the same
/// instance must be serialized by the caller.
pub struct LoopOp<S> {
    config: LoopConfig,
    binder: StateBinder,
    scans: Vec<ScanAccumulator>,
    body: S,
}

impl<S: Subgraph> LoopOp<S> {
    /// Bind the body's slots in `ws` and validate its arity contract.
    pub fn new(ws: &mut Workspace, config: LoopConfig, body: S) -> Result<Self, LoopError> {
        let binder = StateBinder::bind(ws, &config.body)?;
        Ok(Self {
            config,
            binder,
            scans: Vec::new(),
            body,
        })
    }

    /// Number of loop-carried dependencies.
    #[inline]
    pub fn lcds(&self) -> usize {
        self.binder.lcd_slots().len()
    }

    /// Number of scan outputs.
    #[inline]
    pub fn scan_outputs(&self) -> usize {
        self.binder.scan_slots().len()
    }

    /// Run one loop invocation.
    ///
    /// `inputs` must hold `2+N` slots and `outputs` `N+K` slots, distinct
    /// from the slots bound to the body. On failure the invocation aborts
    /// immediately: outputs are not finalized, and scan buffers are left in
    /// an unspecified intermediate state.
    pub fn run(
        &mut self,
        ws: &mut Workspace,
        inputs: &[SlotId],
        outputs: &[SlotId],
    ) -> Result<(), LoopError> {
        let mut phase = Phase::Init;
        loop {
            phase = match phase {
                Phase::Init => Phase::Iterating(self.init(ws, inputs, outputs)?),
                Phase::Iterating(controller) => Phase::Done {
                    executed: self.iterate(ws, controller)?,
                },
                Phase::Done { executed } => {
                    self.finish(ws, inputs, outputs, executed);
                    return Ok(());
                }
            };
        }
    }

    /// Validate operator arity, seed the loop-carried slots, and reset the
    /// scan buffers to leading dimension 0.
    fn init(
        &mut self,
        ws: &mut Workspace,
        inputs: &[SlotId],
        outputs: &[SlotId],
    ) -> Result<LoopController, LoopError> {
        let lcds = self.lcds();
        let scans = self.scan_outputs();
        if inputs.len() != 2 + lcds {
            return Err(ConfigError::OperatorInputs {
                expected: 2 + lcds,
                got: inputs.len(),
                lcds,
            }
            .into());
        }
        if outputs.len() != lcds + scans {
            return Err(ConfigError::OperatorOutputs {
                expected: lcds + scans,
                got: outputs.len(),
                lcds,
                scans,
            }
            .into());
        }

        let max_trip_count = match self.config.has_trip_count {
            true => ws.get(inputs[0]).scalar_value::<i64>()?,
            false => 0,
        };
        let initial_condition = match self.config.has_condition {
            true => ws.get(inputs[1]).bool_value()?,
            false => true,
        };

        self.binder.seed(ws, &inputs[2..]);
        self.scans = outputs[lcds..]
            .iter()
            .enumerate()
            .map(|(index, &target)| ScanAccumulator::new(index, target))
            .collect();
        for scan in &mut self.scans {
            scan.reset(ws);
        }

        Ok(LoopController::new(
            self.config.has_trip_count,
            self.config.has_condition,
            max_trip_count,
            initial_condition,
        ))
    }

    /// Run body iterations until the continue predicate fails, returning the
    /// number of executed iterations. A body failure aborts mid-iteration.
    fn iterate(&mut self, ws: &mut Workspace, controller: LoopController) -> Result<i64, LoopError> {
        let mut iteration = 0;
        // the condition the body sees going into iteration 0
        let mut input_condition = controller.condition_true(0, false);
        let mut output_condition = false;

        while controller.proceed(iteration, output_condition) {
            log::trace!("loop iteration {iteration}, condition {input_condition}");
            self.binder.stage(ws, iteration, input_condition);
            self.body
                .run(ws)
                .map_err(|source| LoopError::Execution { iteration, source })?;
            self.binder.commit(ws);

            output_condition = match self.config.has_condition {
                true => self.binder.condition(ws)?,
                false => true,
            };
            for (scan, &source) in self.scans.iter_mut().zip_eq(self.binder.scan_slots()) {
                scan.append(ws, source, iteration)?;
            }

            iteration += 1;
            input_condition = output_condition;
        }
        Ok(iteration)
    }

    /// Copy the final loop-carried values into the operator outputs. If the
    /// body never ran, the initial inputs pass through unchanged.
    fn finish(&self, ws: &mut Workspace, inputs: &[SlotId], outputs: &[SlotId], executed: i64) {
        let finals = match executed > 0 {
            true => self.binder.lcd_slots(),
            false => &inputs[2..],
        };
        for (&src, &dst) in finals.iter().zip(outputs) {
            ws.copy(src, dst);
        }
        log::debug!("loop finished after {executed} iterations");
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        rc::Rc,
    };

    use itertools::Itertools;

    use super::{LoopConfig, LoopOp};
    use crate::{
        control::{ConfigError, LoopError},
        layout::Layout,
        subgraph::{ExecutionFailure, SubgraphDef},
        tensor::TensorValue,
        workspace::{SlotId, Workspace},
    };

    fn counter_body(ws: &mut Workspace) -> Result<(), ExecutionFailure> {
        let x = ws.fetch("x")?.scalar_value::<i64>()?;
        ws.fetch_mut("x_next")?.set_scalar(x + 1);
        ws.fetch_mut("cond_next")?.set_bool(x + 1 < 5);
        ws.fetch_mut("x_scan")?.set_scalar(x + 1);
        Ok(())
    }

    fn counter_def() -> SubgraphDef {
        SubgraphDef::new(["i", "cond", "x"], ["cond_next", "x_next", "x_scan"])
    }

    /// Binds the operator-side slots `[trip, cond_init, x_init]` and
    /// `[x_final, x_stacked]`.
    fn operator_slots(ws: &mut Workspace) -> (Vec<SlotId>, Vec<SlotId>) {
        let inputs = vec![ws.bind("trip"), ws.bind("cond_init"), ws.bind("x_init")];
        let outputs = vec![ws.bind("x_final"), ws.bind("x_stacked")];
        (inputs, outputs)
    }

    #[test]
    fn test_condition_driven_counter() {
        let mut ws = Workspace::new();
        let config = LoopConfig {
            has_trip_count: false,
            has_condition: true,
            body: counter_def(),
        };
        let mut op = LoopOp::new(&mut ws, config, counter_body).unwrap();

        let (inputs, outputs) = operator_slots(&mut ws);
        *ws.get_mut(inputs[1]) = TensorValue::scalar_bool(true);
        *ws.get_mut(inputs[2]) = TensorValue::scalar(0i64);
        op.run(&mut ws, &inputs, &outputs).unwrap();

        assert_eq!(ws.get(outputs[0]).scalar_value::<i64>().unwrap(), 5);
        let stacked = ws.get(outputs[1]);
        assert_eq!(stacked.layout(), Layout::from_shape([5, 1]));
        assert_eq!(stacked.to_vec::<i64>().unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_reinvocation_resets_state() {
        let mut ws = Workspace::new();
        let config = LoopConfig {
            has_trip_count: false,
            has_condition: true,
            body: counter_def(),
        };
        let mut op = LoopOp::new(&mut ws, config, counter_body).unwrap();

        let (inputs, outputs) = operator_slots(&mut ws);
        *ws.get_mut(inputs[1]) = TensorValue::scalar_bool(true);
        for _ in 0..3 {
            *ws.get_mut(inputs[2]) = TensorValue::scalar(0i64);
            op.run(&mut ws, &inputs, &outputs).unwrap();
            assert_eq!(ws.get(outputs[0]).scalar_value::<i64>().unwrap(), 5);
            assert_eq!(
                ws.get(outputs[1]).to_vec::<i64>().unwrap(),
                vec![1, 2, 3, 4, 5]
            );
        }
    }

    #[test]
    fn test_trip_count_runs_exactly() {
        for trip in [0i64, 1, 7] {
            let mut ws = Workspace::new();
            let config = LoopConfig {
                has_trip_count: true,
                has_condition: false,
                body: counter_def(),
            };
            let mut op = LoopOp::new(&mut ws, config, counter_body).unwrap();

            let (inputs, outputs) = operator_slots(&mut ws);
            *ws.get_mut(inputs[0]) = TensorValue::scalar(trip);
            *ws.get_mut(inputs[2]) = TensorValue::scalar(0i64);
            op.run(&mut ws, &inputs, &outputs).unwrap();

            assert_eq!(ws.get(outputs[0]).scalar_value::<i64>().unwrap(), trip);
            assert_eq!(
                ws.get(outputs[1]).layout(),
                match trip {
                    0 => Layout::from_shape([0]),
                    _ => Layout::from_shape([trip as usize, 1]),
                }
            );
        }
    }

    #[test]
    fn test_zero_trip_passes_inputs_through() {
        let mut ws = Workspace::new();
        let config = LoopConfig {
            has_trip_count: true,
            has_condition: false,
            body: counter_def(),
        };
        let body =
            |_: &mut Workspace| -> Result<(), ExecutionFailure> {
                Err(ExecutionFailure::new("the body must not run"))
            };
        let mut op = LoopOp::new(&mut ws, config, body).unwrap();

        let (inputs, outputs) = operator_slots(&mut ws);
        *ws.get_mut(inputs[0]) = TensorValue::scalar(0i64);
        *ws.get_mut(inputs[2]) =
            TensorValue::from_data([2, 2], [1.0f32, 2.0, 3.0, 4.0]).unwrap();
        op.run(&mut ws, &inputs, &outputs).unwrap();

        // the initial value passes through byte for byte
        assert_eq!(ws.get(outputs[0]), ws.get(inputs[2]));
        assert_eq!(ws.get(outputs[1]).layout(), Layout::from_shape([0]));
        assert_eq!(ws.get(outputs[1]).data_size(), 0);
    }

    #[test]
    fn test_condition_stops_before_trip_count() {
        let mut ws = Workspace::new();
        let config = LoopConfig {
            has_trip_count: true,
            has_condition: true,
            body: counter_def(),
        };
        let mut op = LoopOp::new(&mut ws, config, counter_body).unwrap();

        let (inputs, outputs) = operator_slots(&mut ws);
        *ws.get_mut(inputs[0]) = TensorValue::scalar(100i64);
        *ws.get_mut(inputs[1]) = TensorValue::scalar_bool(true);
        *ws.get_mut(inputs[2]) = TensorValue::scalar(0i64);
        op.run(&mut ws, &inputs, &outputs).unwrap();

        // the body's condition goes false once x reaches 5
        assert_eq!(ws.get(outputs[0]).scalar_value::<i64>().unwrap(), 5);
        assert_eq!(ws.get(outputs[1]).layout(), Layout::from_shape([5, 1]));
    }

    #[test]
    fn test_false_initial_condition() {
        let mut ws = Workspace::new();
        let config = LoopConfig {
            has_trip_count: false,
            has_condition: true,
            body: counter_def(),
        };
        let mut op = LoopOp::new(&mut ws, config, counter_body).unwrap();

        let (inputs, outputs) = operator_slots(&mut ws);
        *ws.get_mut(inputs[1]) = TensorValue::scalar_bool(false);
        *ws.get_mut(inputs[2]) = TensorValue::scalar(42i64);
        op.run(&mut ws, &inputs, &outputs).unwrap();

        assert_eq!(ws.get(outputs[0]).scalar_value::<i64>().unwrap(), 42);
        assert_eq!(ws.get(outputs[1]).layout(), Layout::from_shape([0]));
    }

    #[test]
    fn test_scan_shape_change_aborts() {
        let mut ws = Workspace::new();
        let config = LoopConfig {
            has_trip_count: true,
            has_condition: false,
            body: SubgraphDef::new(["i", "cond"], ["cond_next", "y_scan"]),
        };
        let body = |ws: &mut Workspace| -> Result<(), ExecutionFailure> {
            let i = ws.fetch("i")?.scalar_value::<i64>()? as usize;
            *ws.fetch_mut("y_scan")? = TensorValue::from_data([i + 1], vec![0.5f32; i + 1])?;
            Ok(())
        };
        let mut op = LoopOp::new(&mut ws, config, body).unwrap();

        let inputs = [ws.bind("trip"), ws.bind("cond_init")];
        let outputs = [ws.bind("y_stacked")];
        *ws.get_mut(inputs[0]) = TensorValue::scalar(5i64);
        let err = op.run(&mut ws, &inputs, &outputs).unwrap_err();
        assert!(matches!(
            err,
            LoopError::ShapeMismatch {
                index: 0,
                iteration: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_scan_round_trip() {
        let mut ws = Workspace::new();
        let config = LoopConfig {
            has_trip_count: true,
            has_condition: false,
            body: SubgraphDef::new(["i", "cond"], ["cond_next", "slice"]),
        };
        let produced = Rc::new(RefCell::new(Vec::new()));
        let record = produced.clone();
        let body = move |ws: &mut Workspace| -> Result<(), ExecutionFailure> {
            let row = (0..6).map(|_| fastrand::f32()).collect_vec();
            *ws.fetch_mut("slice")? = TensorValue::from_data([2, 3], &row[..])?;
            record.borrow_mut().push(row);
            Ok(())
        };
        let mut op = LoopOp::new(&mut ws, config, body).unwrap();

        let inputs = [ws.bind("trip"), ws.bind("cond_init")];
        let outputs = [ws.bind("stacked")];
        *ws.get_mut(inputs[0]) = TensorValue::scalar(13i64);
        op.run(&mut ws, &inputs, &outputs).unwrap();

        let stacked = ws.get(outputs[0]);
        assert_eq!(stacked.layout(), Layout::from_shape([13, 2, 3]));
        let expected = produced.borrow().iter().flatten().copied().collect_vec();
        assert_eq!(stacked.to_vec::<f32>().unwrap(), expected);
    }

    #[test]
    fn test_noop_body() {
        let mut ws = Workspace::new();
        let config = LoopConfig {
            has_trip_count: true,
            has_condition: false,
            body: SubgraphDef::new(["i", "cond"], ["cond_next"]),
        };
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        let body = move |_: &mut Workspace| -> Result<(), ExecutionFailure> {
            counter.set(counter.get() + 1);
            Ok(())
        };
        let mut op = LoopOp::new(&mut ws, config, body).unwrap();

        let inputs = [ws.bind("trip"), ws.bind("cond_init")];
        *ws.get_mut(inputs[0]) = TensorValue::scalar(3i64);
        op.run(&mut ws, &inputs, &[]).unwrap();
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn test_body_failure_aborts() {
        let mut ws = Workspace::new();
        let config = LoopConfig {
            has_trip_count: true,
            has_condition: false,
            body: counter_def(),
        };
        let body = |ws: &mut Workspace| -> Result<(), ExecutionFailure> {
            let i = ws.fetch("i")?.scalar_value::<i64>()?;
            if i == 2 {
                return Err(ExecutionFailure::new("boom"));
            }
            counter_body(ws)
        };
        let mut op = LoopOp::new(&mut ws, config, body).unwrap();

        let (inputs, outputs) = operator_slots(&mut ws);
        *ws.get_mut(inputs[0]) = TensorValue::scalar(10i64);
        *ws.get_mut(inputs[2]) = TensorValue::scalar(0i64);
        let err = op.run(&mut ws, &inputs, &outputs).unwrap_err();
        assert!(matches!(err, LoopError::Execution { iteration: 2, .. }));
    }

    #[test]
    fn test_operator_arity() {
        let mut ws = Workspace::new();
        let config = LoopConfig {
            has_trip_count: true,
            has_condition: false,
            body: counter_def(),
        };
        let mut op = LoopOp::new(&mut ws, config, counter_body).unwrap();
        assert_eq!(op.lcds(), 1);
        assert_eq!(op.scan_outputs(), 1);

        let (inputs, outputs) = operator_slots(&mut ws);
        let err = op.run(&mut ws, &inputs[..2], &outputs).unwrap_err();
        assert!(matches!(
            err,
            LoopError::Config(ConfigError::OperatorInputs {
                expected: 3,
                got: 2,
                ..
            })
        ));

        let err = op.run(&mut ws, &inputs, &outputs[..1]).unwrap_err();
        assert!(matches!(
            err,
            LoopError::Config(ConfigError::OperatorOutputs {
                expected: 2,
                got: 1,
                ..
            })
        ));
    }
}
