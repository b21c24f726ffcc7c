//! Data reduction and the QC of its results.
//!
//! A record is re-reduced from its input values, checked by its variable's
//! data-reduction routines, and given the flag and messages that win when the
//! routines' flags are resolved together with the inputs' effective flags.

use std::{collections::BTreeMap, fmt, sync::Arc};

use quince_core::{
  Flag,
  significance::resolve,
  value::{DataReductionRecord, SensorValue, ValueId},
};
use serde::Serialize;

use crate::{
  context::QcContext,
  error::{QcFailure, ReductionError},
};

/// Input readings keyed by sensor type.
pub type Inputs = BTreeMap<String, Option<f64>>;

/// Calculated parameters keyed by name.
pub type Parameters = BTreeMap<String, f64>;

// ─── Reducers ────────────────────────────────────────────────────────────────

/// Calculates a variable's parameters from its inputs.
pub trait Reducer: Send + Sync {
  fn reduce(&self, inputs: &Inputs) -> Result<Parameters, ReductionError>;
}

/// A [`Reducer`] backed by a closure.
pub struct FnReducer<F>(F);

impl<F> FnReducer<F>
where
  F: Fn(&Inputs) -> Result<Parameters, ReductionError> + Send + Sync,
{
  pub fn new(f: F) -> Self { Self(f) }
}

impl<F> Reducer for FnReducer<F>
where
  F: Fn(&Inputs) -> Result<Parameters, ReductionError> + Send + Sync,
{
  fn reduce(&self, inputs: &Inputs) -> Result<Parameters, ReductionError> {
    (self.0)(inputs)
  }
}

/// Reducers by variable name.
#[derive(Clone, Default)]
pub struct ReducerSet {
  reducers: BTreeMap<String, Arc<dyn Reducer>>,
}

impl ReducerSet {
  pub fn new() -> Self { Self::default() }

  pub fn register(
    &mut self,
    variable: impl Into<String>,
    reducer: impl Reducer + 'static,
  ) {
    self.reducers.insert(variable.into(), Arc::new(reducer));
  }

  pub fn get(&self, variable: &str) -> Option<&dyn Reducer> {
    self.reducers.get(variable).map(|r| r.as_ref())
  }

  pub fn variables(&self) -> impl Iterator<Item = &str> {
    self.reducers.keys().map(String::as_str)
  }
}

impl fmt::Debug for ReducerSet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_set().entries(self.reducers.keys()).finish()
  }
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// New state for one data-reduction record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordUpdate {
  pub record_id:      i64,
  pub parameters:     Parameters,
  pub flag:           Flag,
  pub messages:       Vec<String>,
  /// Input values of the sensor types named by the routines that raised a
  /// flag. Reported for the caller to mark for review; applying the update
  /// never changes them.
  pub flagged_values: Vec<ValueId>,
}

impl RecordUpdate {
  pub fn apply_to(&self, record: &mut DataReductionRecord) {
    record.parameters = self.parameters.clone();
    record.flag = self.flag;
    record.messages = self.messages.clone();
  }
}

/// Reduce and QC one record against the current state of its inputs.
///
/// Returns `None` when the reducer fails; the failure is pushed onto
/// `failures` and the record is left alone. Routine failures are reported the
/// same way but do not stop the other routines. Without a registered reducer
/// the record keeps the parameters it already has.
pub fn qc_record(
  ctx: &QcContext,
  record: &DataReductionRecord,
  inputs: &[&SensorValue],
  failures: &mut Vec<QcFailure>,
) -> Option<RecordUpdate> {
  let mut readings = Inputs::new();
  for input in inputs {
    readings.entry(input.sensor_type.clone()).or_insert(input.value);
  }

  let parameters = match ctx.reducers.get(&record.variable) {
    Some(reducer) => match reducer.reduce(&readings) {
      Ok(parameters) => parameters,
      Err(e) => {
        tracing::warn!(record = record.id, variable = %record.variable, "reduction failed: {e}");
        failures.push(QcFailure::reduction(&record.variable, e.to_string()));
        return None;
      }
    },
    None => record.parameters.clone(),
  };

  let mut reduced = record.clone();
  reduced.parameters = parameters;

  let mut candidates: Vec<(Flag, Vec<String>)> = inputs
    .iter()
    .map(|input| {
      let messages = input
        .effective_messages(&ctx.routines)
        .into_iter()
        .map(|m| format!("{}: {m}", input.sensor_type))
        .collect();
      (input.effective_flag(), messages)
    })
    .collect();

  let mut flagged_values: Vec<ValueId> = Vec::new();
  for routine in ctx.routines.data_reduction.routines_for(&record.variable) {
    let flags = match routine.qc(&reduced, &readings) {
      Ok(flags) => flags,
      Err(e) => {
        tracing::warn!(record = record.id, "data reduction QC failed: {e}");
        failures.push(QcFailure::routine(&record.variable, e));
        continue;
      }
    };
    if flags.is_empty() {
      continue;
    }

    let column_name = routine.column_name();
    for flag in flags {
      candidates.push((flag.flag, vec![routine.describe(&flag, &column_name)]));
    }
    for input in inputs {
      if routine.flagged_sensors().contains(&input.sensor_type)
        && !flagged_values.contains(&input.id)
      {
        flagged_values.push(input.id);
      }
    }
  }

  let (flag, messages) = match resolve(candidates) {
    Some(resolution) => (resolution.flag, resolution.messages),
    None => (Flag::Good, Vec::new()),
  };
  tracing::debug!(record = record.id, %flag, "record QC");

  Some(RecordUpdate {
    record_id: record.id,
    parameters: reduced.parameters,
    flag,
    messages,
    flagged_values,
  })
}
