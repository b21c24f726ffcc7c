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

pub(crate) const NAME: &str = "DataReduction.InputDifferenceRoutine";

const ARGUMENTS: &[&str] = &["first", "second", "max_difference", "flag"];

/// Flags a record when two of its inputs disagree by too much, e.g. sea
/// surface and equilibrator temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct InputDifferenceRoutine {
  first:           String,
  second:          String,
  max_difference:  f64,
  flag:            Flag,
  flagged_sensors: Vec<String>,
}

impl InputDifferenceRoutine {
  pub fn from_definition(
    definition: &RoutineDefinition,
    sensors: &SensorsConfiguration,
  ) -> Result<Self, ConfigErrorKind> {
    let args = Arguments::new(NAME, definition, ARGUMENTS, 3)?;
    Ok(Self {
      first:           args.sensor_type("first", sensors)?,
      second:          args.sensor_type("second", sensors)?,
      max_difference:  args.positive_number("max_difference")?,
      flag:            args.flag("flag", Flag::Questionable)?,
      flagged_sensors: flagged_sensors(definition, sensors)?,
    })
  }
}

impl Routine for InputDifferenceRoutine {
  fn name(&self) -> &str { NAME }

  fn short_message(&self) -> &str { "Inputs differ too much" }

  fn long_message_template(&self) -> &str {
    "{column_name} differ by {field_value}; the limit is {valid_value}"
  }
}

impl DataReductionRoutine for InputDifferenceRoutine {
  fn flagged_sensors(&self) -> &[String] { &self.flagged_sensors }

  fn column_name(&self) -> String {
    format!("{} and {}", self.first, self.second)
  }

  fn qc(
    &self,
    record: &DataReductionRecord,
    inputs: &BTreeMap<String, Option<f64>>,
  ) -> Result<Vec<RoutineFlag>, RoutineError> {
    let input = |name: &str| {
      inputs.get(name).copied().ok_or_else(|| {
        RoutineError::new(
          NAME,
          format!("record {} has no {name:?} input", record.id),
        )
      })
    };

    // A missing reading is left to the value's own QC.
    let (Some(first), Some(second)) = (input(&self.first)?, input(&self.second)?)
    else {
      return Ok(Vec::new());
    };

    let difference = (first - second).abs();
    if difference > self.max_difference {
      Ok(vec![RoutineFlag::new(NAME, self.flag).with_values(
        format_number(self.max_difference),
        format_number(difference),
      )])
    } else {
      Ok(Vec::new())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::data_reduction::test_helpers::{record, sensors};

  fn routine() -> InputDifferenceRoutine {
    InputDifferenceRoutine::from_definition(
      &RoutineDefinition::new("InputDifference").with_parameters([
        "SST",
        "Equilibrator Temperature",
        "1.5",
      ]),
      &sensors(),
    )
    .unwrap()
  }

  fn inputs(sst: Option<f64>, eqt: Option<f64>) -> BTreeMap<String, Option<f64>> {
    BTreeMap::from([
      ("SST".to_string(), sst),
      ("Equilibrator Temperature".to_string(), eqt),
    ])
  }

  #[test]
  fn flags_large_differences() {
    let flags = routine().qc(&record(&[]), &inputs(Some(10.0), Some(12.0))).unwrap();
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0].flag, Flag::Questionable);
    assert_eq!(flags[0].actual_value.as_deref(), Some("2"));
    assert!(routine().qc(&record(&[]), &inputs(Some(10.0), Some(11.0))).unwrap().is_empty());
  }

  #[test]
  fn missing_readings_are_skipped_but_missing_inputs_fail() {
    assert!(routine().qc(&record(&[]), &inputs(None, Some(11.0))).unwrap().is_empty());
    assert!(routine().qc(&record(&[]), &BTreeMap::new()).is_err());
  }

  #[test]
  fn unknown_input_sensor_is_rejected() {
    let err = InputDifferenceRoutine::from_definition(
      &RoutineDefinition::new("InputDifference").with_parameters(["SST", "Flurble", "1"]),
      &sensors(),
    )
    .unwrap_err();
    assert!(matches!(err, ConfigErrorKind::UnknownSensorType(_)));
  }
}
