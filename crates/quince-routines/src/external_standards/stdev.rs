use quince_core::{Flag, routine_flag::RoutineFlag, value::ValueId};

use super::StandardRun;
use crate::{
  definition::{Arguments, RoutineDefinition},
  error::{ConfigErrorKind, RoutineError},
  routine::{ExternalStandardRoutine, Routine},
  sensor_values::numeric_values,
  stats::{format_number, mean_and_stdev},
};

pub(crate) const NAME: &str = "ExternalStandards.StandardStdevRoutine";

const ARGUMENTS: &[&str] = &["max_stdev"];

/// Flags a whole standard run whose readings vary too much.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardStdevRoutine {
  max_stdev: f64,
}

impl StandardStdevRoutine {
  pub fn from_definition(
    definition: &RoutineDefinition,
  ) -> Result<Self, ConfigErrorKind> {
    let args = Arguments::new(NAME, definition, ARGUMENTS, 1)?;
    Ok(Self {
      max_stdev: args.positive_number("max_stdev")?,
    })
  }
}

impl Routine for StandardStdevRoutine {
  fn name(&self) -> &str { NAME }

  fn short_message(&self) -> &str { "Standard run too variable" }

  fn long_message_template(&self) -> &str {
    "{column_name} standard deviation {field_value} exceeds {valid_value}"
  }
}

impl ExternalStandardRoutine for StandardStdevRoutine {
  fn qc(
    &self,
    run: &StandardRun<'_>,
  ) -> Result<Vec<(ValueId, RoutineFlag)>, RoutineError> {
    let numeric = numeric_values(&run.values);
    if numeric.len() < 2 {
      return Ok(Vec::new());
    }
    let numbers: Vec<f64> = numeric.iter().map(|(_, v)| *v).collect();
    let Some((_, stdev)) = mean_and_stdev(&numbers) else {
      return Ok(Vec::new());
    };
    if stdev <= self.max_stdev {
      return Ok(Vec::new());
    }

    Ok(
      numeric
        .iter()
        .map(|(value, _)| {
          (
            value.id,
            RoutineFlag::new(NAME, Flag::Questionable)
              .with_values(format_number(self.max_stdev), format_number(stdev)),
          )
        })
        .collect(),
    )
  }
}
