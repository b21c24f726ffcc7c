use quince_core::{
  Flag,
  routine_flag::RoutineFlag,
  value::{SensorValue, ValueId},
};

use super::numeric_values;
use crate::{
  definition::{Arguments, RoutineDefinition},
  error::{ConfigErrorKind, RoutineError},
  routine::{Routine, SensorValueRoutine},
  stats::format_number,
};

pub(crate) const NAME: &str = "SensorValues.GradientRoutine";

const ARGUMENTS: &[&str] = &["max_change_per_minute"];

/// Flags a value when it differs from the previous value faster than a
/// maximum rate of change.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientRoutine {
  max_change_per_minute: f64,
}

impl GradientRoutine {
  pub fn from_definition(
    definition: &RoutineDefinition,
  ) -> Result<Self, ConfigErrorKind> {
    let args = Arguments::new(NAME, definition, ARGUMENTS, 1)?;
    Ok(Self {
      max_change_per_minute: args.positive_number("max_change_per_minute")?,
    })
  }
}

impl Routine for GradientRoutine {
  fn name(&self) -> &str { NAME }

  fn short_message(&self) -> &str { "Changes too quickly" }

  fn long_message_template(&self) -> &str {
    "{column_name} changes by {field_value} per minute; the limit is {valid_value}"
  }
}

impl SensorValueRoutine for GradientRoutine {
  fn qc(
    &self,
    series: &[&SensorValue],
  ) -> Result<Vec<(ValueId, RoutineFlag)>, RoutineError> {
    let numeric = numeric_values(series);
    let mut flags = Vec::new();

    for pair in numeric.windows(2) {
      let [(previous, a), (current, b)] = pair else { continue };
      let seconds = (current.timestamp - previous.timestamp).num_seconds();
      if seconds <= 0 {
        continue;
      }
      let rate = (b - a).abs() / (seconds as f64 / 60.0);
      if rate > self.max_change_per_minute {
        flags.push((
          current.id,
          RoutineFlag::new(NAME, Flag::Questionable).with_values(
            format_number(self.max_change_per_minute),
            format_number(rate),
          ),
        ));
      }
    }

    Ok(flags)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sensor_values::test_helpers::{refs, series};

  #[test]
  fn flags_value_after_jump() {
    let routine = GradientRoutine::from_definition(
      &RoutineDefinition::new("Gradient").with_parameters(["0.5"]),
    )
    .unwrap();
    let values = series(&[Some(10.0), Some(10.2), Some(12.0), None, Some(12.1)]);
    let flags = routine.qc(&refs(&values)).unwrap();
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0].0, 3);
    assert_eq!(flags[0].1.actual_value.as_deref(), Some("1.8"));
  }

  #[test]
  fn limit_must_be_positive() {
    assert!(
      GradientRoutine::from_definition(
        &RoutineDefinition::new("Gradient").with_parameters(["0"])
      )
      .is_err()
    );
  }
}
