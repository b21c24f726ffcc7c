use std::collections::BTreeMap;

use quince_core::{
  Flag,
  routine_flag::RoutineFlag,
  sensor::SensorsConfiguration,
  value::DataReductionRecord,
};

use super::flagged_sensors;
use crate::{
  definition::{Arguments, RoutineDefinition},
  error::{ConfigErrorKind, RoutineError},
  routine::{DataReductionRoutine, Routine},
  stats::format_number,
};

pub(crate) const NAME: &str = "DataReduction.RangeCheckRoutine";

const ARGUMENTS: &[&str] = &["parameter", "min", "max", "flag"];

/// Flags a record whose calculated parameter falls outside a range.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterRangeRoutine {
  parameter:       String,
  min:             f64,
  max:             f64,
  flag:            Flag,
  flagged_sensors: Vec<String>,
}

impl ParameterRangeRoutine {
  pub fn from_definition(
    definition: &RoutineDefinition,
    sensors: &SensorsConfiguration,
  ) -> Result<Self, ConfigErrorKind> {
    let args = Arguments::new(NAME, definition, ARGUMENTS, 3)?;
    let routine = Self {
      parameter:       args.required_text("parameter")?,
      min:             args.number("min")?,
      max:             args.number("max")?,
      flag:            args.flag("flag", Flag::Bad)?,
      flagged_sensors: flagged_sensors(definition, sensors)?,
    };
    if routine.min > routine.max {
      return Err(args.invalid("min", "greater than max"));
    }
    Ok(routine)
  }
}

impl Routine for ParameterRangeRoutine {
  fn name(&self) -> &str { NAME }

  fn short_message(&self) -> &str { "Calculated value out of range" }

  fn long_message_template(&self) -> &str {
    "{column_name} {field_value} is outside the range {valid_value}"
  }
}

impl DataReductionRoutine for ParameterRangeRoutine {
  fn flagged_sensors(&self) -> &[String] { &self.flagged_sensors }

  fn column_name(&self) -> String { self.parameter.clone() }

  fn qc(
    &self,
    record: &DataReductionRecord,
    _inputs: &BTreeMap<String, Option<f64>>,
  ) -> Result<Vec<RoutineFlag>, RoutineError> {
    let Some(value) = record.parameters.get(&self.parameter).copied() else {
      return Err(RoutineError::new(
        NAME,
        format!("record {} has no parameter {:?}", record.id, self.parameter),
      ));
    };
    if !value.is_finite() {
      return Err(RoutineError::new(
        NAME,
        format!("record {} has non-finite {:?}", record.id, self.parameter),
      ));
    }

    if value < self.min || value > self.max {
      Ok(vec![RoutineFlag::new(NAME, self.flag).with_values(
        format!("{} to {}", format_number(self.min), format_number(self.max)),
        format_number(value),
      )])
    } else {
      Ok(Vec::new())
    }
  }
}
