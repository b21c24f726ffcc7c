use quince_core::{Flag, routine_flag::RoutineFlag, value::ValueId};

use super::StandardRun;
use crate::{
  definition::{Arguments, RoutineDefinition},
  error::{ConfigErrorKind, RoutineError},
  routine::{ExternalStandardRoutine, Routine},
  sensor_values::numeric_values,
  stats::format_number,
};

pub(crate) const NAME: &str = "ExternalStandards.StandardOffsetRoutine";

const ARGUMENTS: &[&str] = &["max_offset"];

/// Flags standard measurements too far from the standard's known value.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardOffsetRoutine {
  max_offset: f64,
}

impl StandardOffsetRoutine {
  pub fn from_definition(
    definition: &RoutineDefinition,
  ) -> Result<Self, ConfigErrorKind> {
    let args = Arguments::new(NAME, definition, ARGUMENTS, 1)?;
    Ok(Self {
      max_offset: args.positive_number("max_offset")?,
    })
  }
}

impl Routine for StandardOffsetRoutine {
  fn name(&self) -> &str { NAME }

  fn short_message(&self) -> &str { "Too far from standard value" }

  fn long_message_template(&self) -> &str {
    "{column_name} measured {field_value} for a standard of {valid_value}"
  }
}

impl ExternalStandardRoutine for StandardOffsetRoutine {
  fn qc(
    &self,
    run: &StandardRun<'_>,
  ) -> Result<Vec<(ValueId, RoutineFlag)>, RoutineError> {
    let Some(target) = run.target else {
      return Err(RoutineError::new(
        NAME,
        format!("no target value for standard {:?}", run.standard),
      ));
    };

    Ok(
      numeric_values(&run.values)
        .into_iter()
        .filter(|(_, v)| (v - target).abs() > self.max_offset)
        .map(|(value, v)| {
          (
            value.id,
            RoutineFlag::new(NAME, Flag::Bad).with_values(
              format!("{} ± {}", format_number(target), format_number(self.max_offset)),
              format_number(v),
            ),
          )
        })
        .collect(),
    )
  }
}
