use quince_core::{
  Flag,
  routine_flag::RoutineFlag,
  value::{SensorValue, ValueId},
};

use super::finite_value;
use crate::{
  definition::{Arguments, RoutineDefinition},
  error::{ConfigErrorKind, RoutineError},
  routine::{Routine, SensorValueRoutine},
  stats::format_number,
};

pub(crate) const NAME: &str = "SensorValues.RangeCheckRoutine";

const ARGUMENTS: &[&str] =
  &["questionable_min", "questionable_max", "bad_min", "bad_max"];

/// Flags values outside a questionable range, and more severely outside a
/// wider bad range.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeCheckRoutine {
  questionable_min: f64,
  questionable_max: f64,
  bad_min:          f64,
  bad_max:          f64,
}

impl RangeCheckRoutine {
  pub fn from_definition(
    definition: &RoutineDefinition,
  ) -> Result<Self, ConfigErrorKind> {
    let args = Arguments::new(NAME, definition, ARGUMENTS, ARGUMENTS.len())?;
    let routine = Self {
      questionable_min: args.number("questionable_min")?,
      questionable_max: args.number("questionable_max")?,
      bad_min:          args.number("bad_min")?,
      bad_max:          args.number("bad_max")?,
    };

    if routine.questionable_min > routine.questionable_max {
      return Err(args.invalid("questionable_min", "greater than questionable_max"));
    }
    if routine.bad_min > routine.bad_max {
      return Err(args.invalid("bad_min", "greater than bad_max"));
    }
    if routine.bad_min > routine.questionable_min
      || routine.bad_max < routine.questionable_max
    {
      return Err(args.invalid("bad_min", "bad range must contain questionable range"));
    }
    Ok(routine)
  }

  fn check(&self, value: f64) -> Option<RoutineFlag> {
    let (flag, min, max) = if value < self.bad_min || value > self.bad_max {
      (Flag::Bad, self.bad_min, self.bad_max)
    } else if value < self.questionable_min || value > self.questionable_max {
      (Flag::Questionable, self.questionable_min, self.questionable_max)
    } else {
      return None;
    };
    Some(RoutineFlag::new(NAME, flag).with_values(
      format!("{} to {}", format_number(min), format_number(max)),
      format_number(value),
    ))
  }
}

impl Routine for RangeCheckRoutine {
  fn name(&self) -> &str { NAME }

  fn short_message(&self) -> &str { "Out of range" }

  fn long_message_template(&self) -> &str {
    "{column_name} value {field_value} is outside the range {valid_value}"
  }
}

impl SensorValueRoutine for RangeCheckRoutine {
  fn qc(
    &self,
    series: &[&SensorValue],
  ) -> Result<Vec<(ValueId, RoutineFlag)>, RoutineError> {
    let mut flags = Vec::new();
    for value in series {
      if let Some(v) = finite_value(value)
        && let Some(flag) = self.check(v)
      {
        flags.push((value.id, flag));
      }
    }
    Ok(flags)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sensor_values::test_helpers::{refs, series};

  fn routine() -> RangeCheckRoutine {
    RangeCheckRoutine::from_definition(
      &RoutineDefinition::new("RangeCheck").with_parameters(["0", "30", "-2", "35"]),
    )
    .unwrap()
  }

  #[test]
  fn flags_by_severity() {
    let values = series(&[Some(10.0), Some(31.0), Some(40.0), None, Some(-5.0)]);
    let flags = routine().qc(&refs(&values)).unwrap();
    let summary: Vec<(ValueId, Flag)> =
      flags.iter().map(|(id, f)| (*id, f.flag)).collect();
    assert_eq!(summary, vec![
      (2, Flag::Questionable),
      (3, Flag::Bad),
      (5, Flag::Bad)
    ]);
    assert_eq!(flags[1].1.required_value.as_deref(), Some("-2 to 35"));
    assert_eq!(flags[1].1.actual_value.as_deref(), Some("40"));
  }

  #[test]
  fn rejects_inverted_ranges() {
    for params in [["30", "0", "-2", "35"], ["0", "30", "35", "-2"], ["0", "30", "1", "35"]] {
      assert!(
        RangeCheckRoutine::from_definition(
          &RoutineDefinition::new("RangeCheck").with_parameters(params)
        )
        .is_err()
      );
    }
  }

  #[test]
  fn rejects_wrong_arity() {
    let err = RangeCheckRoutine::from_definition(
      &RoutineDefinition::new("RangeCheck").with_parameters(["0", "30"]),
    )
    .unwrap_err();
    assert!(matches!(err, ConfigErrorKind::WrongParameterCount { .. }));
  }

  #[test]
  fn non_finite_values_are_skipped() {
    let values = series(&[Some(f64::NAN), Some(45.0), Some(f64::INFINITY)]);
    let flags = routine().qc(&refs(&values)).unwrap();
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0].0, 2);
    assert_eq!(flags[0].1.flag, Flag::Bad);
  }
}
