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

pub(crate) const NAME: &str = "SensorValues.ConstantValueRoutine";

const ARGUMENTS: &[&str] = &["max_duration_minutes"];

/// Flags runs of identical values that last longer than a set time; a stuck
/// sensor keeps reporting its last reading.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantValueRoutine {
  max_duration_minutes: f64,
}

impl ConstantValueRoutine {
  pub fn from_definition(
    definition: &RoutineDefinition,
  ) -> Result<Self, ConfigErrorKind> {
    let args = Arguments::new(NAME, definition, ARGUMENTS, 1)?;
    Ok(Self {
      max_duration_minutes: args.positive_number("max_duration_minutes")?,
    })
  }

  fn flag_run(
    &self,
    run: &[(&SensorValue, f64)],
    flags: &mut Vec<(ValueId, RoutineFlag)>,
  ) {
    let (Some((first, _)), Some((last, _))) = (run.first(), run.last()) else {
      return;
    };
    let minutes = (last.timestamp - first.timestamp).num_seconds() as f64 / 60.0;
    if minutes > self.max_duration_minutes {
      for (value, _) in run {
        flags.push((
          value.id,
          RoutineFlag::new(NAME, Flag::Questionable).with_values(
            format_number(self.max_duration_minutes),
            format_number(minutes),
          ),
        ));
      }
    }
  }
}

impl Routine for ConstantValueRoutine {
  fn name(&self) -> &str { NAME }

  fn short_message(&self) -> &str { "Constant for too long" }

  fn long_message_template(&self) -> &str {
    "{column_name} was constant for {field_value} minutes; the limit is {valid_value}"
  }
}

impl SensorValueRoutine for ConstantValueRoutine {
  fn qc(
    &self,
    series: &[&SensorValue],
  ) -> Result<Vec<(ValueId, RoutineFlag)>, RoutineError> {
    let numeric = numeric_values(series);
    let mut flags = Vec::new();
    let mut start = 0;

    for i in 1..=numeric.len() {
      if i == numeric.len() || numeric[i].1 != numeric[start].1 {
        self.flag_run(&numeric[start..i], &mut flags);
        start = i;
      }
    }

    Ok(flags)
  }
}
