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
  stats::{format_number, mean_and_stdev},
};

pub(crate) const NAME: &str = "SensorValues.OutlierRoutine";

const ARGUMENTS: &[&str] = &["max_stdevs"];

/// Series shorter than this are not checked.
const MIN_VALUES: usize = 3;

/// Flags values too many standard deviations away from the series mean.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierRoutine {
  max_stdevs: f64,
}

impl OutlierRoutine {
  pub fn from_definition(
    definition: &RoutineDefinition,
  ) -> Result<Self, ConfigErrorKind> {
    let args = Arguments::new(NAME, definition, ARGUMENTS, 1)?;
    Ok(Self {
      max_stdevs: args.positive_number("max_stdevs")?,
    })
  }
}

impl Routine for OutlierRoutine {
  fn name(&self) -> &str { NAME }

  fn short_message(&self) -> &str { "Outlier" }

  fn long_message_template(&self) -> &str {
    "{column_name} is {field_value} standard deviations from the mean; the limit is {valid_value}"
  }
}

impl SensorValueRoutine for OutlierRoutine {
  fn qc(
    &self,
    series: &[&SensorValue],
  ) -> Result<Vec<(ValueId, RoutineFlag)>, RoutineError> {
    let numeric = numeric_values(series);
    if numeric.len() < MIN_VALUES {
      return Ok(Vec::new());
    }

    let numbers: Vec<f64> = numeric.iter().map(|(_, v)| *v).collect();
    let Some((mean, stdev)) = mean_and_stdev(&numbers) else {
      return Ok(Vec::new());
    };
    if stdev == 0.0 {
      return Ok(Vec::new());
    }

    Ok(
      numeric
        .iter()
        .filter_map(|(value, v)| {
          let distance = (v - mean).abs() / stdev;
          (distance > self.max_stdevs).then(|| {
            (
              value.id,
              RoutineFlag::new(NAME, Flag::Questionable).with_values(
                format_number(self.max_stdevs),
                format_number(distance),
              ),
            )
          })
        })
        .collect(),
    )
  }
}
