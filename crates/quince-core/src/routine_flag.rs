//! Flags annotated with the routine that raised them, and the per-value
//! collection of those flags produced by automatic QC.

use serde::{Deserialize, Serialize};

use crate::flag::Flag;

/// A flag plus the provenance needed to rebuild its messages later.
///
/// The annotation never changes where the flag sits in the significance
/// order; only `flag` takes part in comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineFlag {
  pub flag:           Flag,
  /// Namespaced routine name, e.g. `SensorValues.RangeCheckRoutine`.
  pub routine_name:   String,
  /// The value (or range) the routine expected.
  pub required_value: Option<String>,
  /// The observed value that triggered the flag.
  pub actual_value:   Option<String>,
}

impl RoutineFlag {
  pub fn new(routine_name: impl Into<String>, flag: Flag) -> Self {
    Self {
      flag,
      routine_name: routine_name.into(),
      required_value: None,
      actual_value: None,
    }
  }

  pub fn with_values(
    mut self,
    required: impl Into<String>,
    actual: impl Into<String>,
  ) -> Self {
    self.required_value = Some(required.into());
    self.actual_value = Some(actual.into());
    self
  }
}

/// Looks up the display text for a routine flag. Implemented by the routine
/// configuration so that stored flags can be turned back into messages.
pub trait MessageLookup {
  /// Short, fixed message for the routine that raised `flag`.
  fn short_message(&self, flag: &RoutineFlag) -> Option<String>;

  /// Templated long message for `flag` raised against `column_name`.
  fn long_message(&self, flag: &RoutineFlag, column_name: &str)
  -> Option<String>;
}

/// The auto-QC outcome for one value: at most one flag per routine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AutoQcResult {
  flags: Vec<RoutineFlag>,
}

impl AutoQcResult {
  pub fn new() -> Self { Self::default() }

  /// Record `flag`. If the same routine already flagged this value, the more
  /// significant of the two is kept (the newer one on a tie).
  pub fn add(&mut self, flag: RoutineFlag) {
    match self
      .flags
      .iter_mut()
      .find(|f| f.routine_name == flag.routine_name)
    {
      Some(existing) if !flag.flag.less_significant_than(existing.flag) => {
        *existing = flag;
      }
      Some(_) => {}
      None => self.flags.push(flag),
    }
  }

  /// The most significant flag raised, or `Good` if nothing was raised.
  pub fn overall_flag(&self) -> Flag {
    Flag::most_significant(self.flags.iter().map(|f| f.flag))
      .unwrap_or(Flag::Good)
  }

  pub fn flags(&self) -> &[RoutineFlag] { &self.flags }

  pub fn is_empty(&self) -> bool { self.flags.is_empty() }

  pub fn clear(&mut self) { self.flags.clear(); }
}
