use quince_core::{
  Flag,
  routine_flag::RoutineFlag,
  value::{SensorValue, ValueId},
};

use crate::{
  definition::{Arguments, RoutineDefinition},
  error::{ConfigErrorKind, RoutineError},
  routine::{Routine, SensorValueRoutine},
};

pub(crate) const NAME: &str = "SensorValues.MissingRoutine";

/// Flags values with no numeric reading as bad.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingRoutine;

impl MissingRoutine {
  pub fn from_definition(
    definition: &RoutineDefinition,
  ) -> Result<Self, ConfigErrorKind> {
    Arguments::new(NAME, definition, &[], 0)?;
    Ok(Self)
  }
}

impl Routine for MissingRoutine {
  fn name(&self) -> &str { NAME }

  fn short_message(&self) -> &str { "Missing value" }

  fn long_message_template(&self) -> &str { "{column_name} has no value" }
}

impl SensorValueRoutine for MissingRoutine {
  fn qc(
    &self,
    series: &[&SensorValue],
  ) -> Result<Vec<(ValueId, RoutineFlag)>, RoutineError> {
    Ok(
      series
        .iter()
        .filter(|v| v.value.is_none())
        .map(|v| (v.id, RoutineFlag::new(NAME, Flag::Bad)))
        .collect(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sensor_values::test_helpers::{refs, series};

  #[test]
  fn flags_missing_values() {
    let routine = MissingRoutine::from_definition(&RoutineDefinition::new("Missing")).unwrap();
    let values = series(&[Some(1.0), None]);
    let flags = routine.qc(&refs(&values)).unwrap();
    assert_eq!(flags, vec![(2, RoutineFlag::new(NAME, Flag::Bad))]);
  }

  #[test]
  fn takes_no_parameters() {
    assert!(
      MissingRoutine::from_definition(
        &RoutineDefinition::new("Missing").with_parameters(["1"])
      )
      .is_err()
    );
  }
}
