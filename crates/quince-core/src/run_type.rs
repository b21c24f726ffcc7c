//! Run types: what the instrument was doing at a given time.
//!
//! Run-type names are matched case-insensitively. A name is either assigned
//! to a category directly or aliased to another name; aliases are followed
//! until a category is reached, and a cycle is a configuration error.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, value::SensorValue};

// ─── Assignments ─────────────────────────────────────────────────────────────

/// What a run type means.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTypeAssignment {
  /// Data recorded under this run type is not used.
  Ignored,
  /// The instrument is measuring an external standard.
  InternalCalibration,
  /// The instrument is measuring the given variable.
  Measurement { variable: String },
  /// Same meaning as another run type.
  Alias { to: String },
}

/// A run type after alias resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRunType<'a> {
  /// Name of the run type the alias chain ends at, as configured.
  pub name:       &'a str,
  pub assignment: &'a RunTypeAssignment,
}

impl ResolvedRunType<'_> {
  pub fn is_internal_calibration(&self) -> bool {
    matches!(self.assignment, RunTypeAssignment::InternalCalibration)
  }
}

/// All run-type assignments for an instrument.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(
  try_from = "BTreeMap<String, RunTypeAssignment>",
  into = "BTreeMap<String, RunTypeAssignment>"
)]
pub struct RunTypeAssignments {
  /// Lower-cased name → (configured name, assignment).
  entries: BTreeMap<String, (String, RunTypeAssignment)>,
}

impl RunTypeAssignments {
  pub fn new() -> Self { Self::default() }

  /// Add or replace an assignment. Alias targets are not checked until
  /// [`RunTypeAssignments::validate`] or resolution.
  pub fn insert(
    &mut self,
    run_type: impl Into<String>,
    assignment: RunTypeAssignment,
  ) {
    let run_type = run_type.into();
    self
      .entries
      .insert(run_type.to_lowercase(), (run_type, assignment));
  }

  pub fn contains(&self, run_type: &str) -> bool {
    self.entries.contains_key(&run_type.to_lowercase())
  }

  /// Follow `run_type` through any aliases to its category.
  ///
  /// Fails with [`Error::RunTypeCategory`] for an unknown name (including an
  /// alias to an unknown name) and [`Error::CircularAlias`] for a cycle.
  pub fn resolve(&self, run_type: &str) -> Result<ResolvedRunType<'_>> {
    let mut chain: Vec<String> = Vec::new();
    let mut key = run_type.to_lowercase();

    loop {
      let Some((name, assignment)) = self.entries.get(&key) else {
        return Err(Error::RunTypeCategory(run_type.to_string()));
      };

      if chain.iter().any(|seen| seen.to_lowercase() == key) {
        chain.push(name.clone());
        return Err(Error::CircularAlias(chain));
      }
      chain.push(name.clone());

      match assignment {
        RunTypeAssignment::Alias { to } => key = to.to_lowercase(),
        other => {
          return Ok(ResolvedRunType {
            name,
            assignment: other,
          });
        }
      }
    }
  }

  /// Check that every entry resolves.
  pub fn validate(&self) -> Result<()> {
    for (name, _) in self.entries.values() {
      self.resolve(name)?;
    }
    Ok(())
  }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl TryFrom<BTreeMap<String, RunTypeAssignment>> for RunTypeAssignments {
  type Error = Error;

  fn try_from(map: BTreeMap<String, RunTypeAssignment>) -> Result<Self> {
    let mut assignments = Self::new();
    for (run_type, assignment) in map {
      assignments.insert(run_type, assignment);
    }
    assignments.validate()?;
    Ok(assignments)
  }
}

impl From<RunTypeAssignments> for BTreeMap<String, RunTypeAssignment> {
  fn from(assignments: RunTypeAssignments) -> Self {
    assignments.entries.into_values().collect()
  }
}

// ─── Periods ─────────────────────────────────────────────────────────────────

/// A stretch of time during which one run type was in effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTypePeriod {
  pub run_type: String,
  pub start:    DateTime<Utc>,
  /// Exclusive; `None` for the final, open-ended period.
  pub end:      Option<DateTime<Utc>>,
}

impl RunTypePeriod {
  pub fn contains(&self, time: DateTime<Utc>) -> bool {
    time >= self.start && self.end.is_none_or(|end| time < end)
  }
}

/// Ordered, non-overlapping run-type periods.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTypePeriods {
  periods: Vec<RunTypePeriod>,
}

impl RunTypePeriods {
  /// Build periods from run-type values. Each change of run type starts a
  /// new period that lasts until the next change. Values without text are
  /// skipped.
  pub fn from_values<'a, I>(values: I) -> Self
  where
    I: IntoIterator<Item = &'a SensorValue>,
  {
    let mut readings: Vec<(DateTime<Utc>, &str)> = values
      .into_iter()
      .filter_map(|v| v.raw.as_deref().map(|raw| (v.timestamp, raw.trim())))
      .filter(|(_, raw)| !raw.is_empty())
      .collect();
    readings.sort_by_key(|(time, _)| *time);

    let mut periods: Vec<RunTypePeriod> = Vec::new();
    for (time, run_type) in readings {
      match periods.last_mut() {
        Some(last) if last.run_type.eq_ignore_ascii_case(run_type) => {}
        Some(last) => {
          last.end = Some(time);
          periods.push(RunTypePeriod {
            run_type: run_type.to_string(),
            start:    time,
            end:      None,
          });
        }
        None => periods.push(RunTypePeriod {
          run_type: run_type.to_string(),
          start:    time,
          end:      None,
        }),
      }
    }

    Self { periods }
  }

  /// The period in effect at `time`, if any.
  pub fn containing(&self, time: DateTime<Utc>) -> Option<&RunTypePeriod> {
    let after = self.periods.partition_point(|p| p.start <= time);
    after
      .checked_sub(1)
      .map(|i| &self.periods[i])
      .filter(|p| p.contains(time))
  }

  pub fn iter(&self) -> impl Iterator<Item = &RunTypePeriod> {
    self.periods.iter()
  }

  pub fn len(&self) -> usize { self.periods.len() }

  pub fn is_empty(&self) -> bool { self.periods.is_empty() }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap()
  }

  fn assignments() -> RunTypeAssignments {
    let mut a = RunTypeAssignments::new();
    a.insert("var_1", RunTypeAssignment::Measurement {
      variable: "Underway pCO2".into(),
    });
    a.insert("STD1", RunTypeAssignment::InternalCalibration);
    a.insert("equ", RunTypeAssignment::Alias { to: "VAR_1".into() });
    a.insert("equ-old", RunTypeAssignment::Alias { to: "equ".into() });
    a
  }

  #[test]
  fn resolves_through_alias_chain() {
    let a = assignments();
    let resolved = a.resolve("EQU-OLD").unwrap();
    assert_eq!(resolved.name, "var_1");
    assert!(matches!(
      resolved.assignment,
      RunTypeAssignment::Measurement { variable } if variable == "Underway pCO2"
    ));
    assert!(a.resolve("std1").unwrap().is_internal_calibration());
  }

  #[test]
  fn unknown_run_type_is_an_error() {
    let a = assignments();
    assert!(matches!(a.resolve("flurble"), Err(Error::RunTypeCategory(_))));
  }

  #[test]
  fn circular_alias_is_detected() {
    let mut a = assignments();
    a.insert("x", RunTypeAssignment::Alias { to: "y".into() });
    a.insert("y", RunTypeAssignment::Alias { to: "X".into() });
    assert!(matches!(a.resolve("x"), Err(Error::CircularAlias(_))));
    assert!(a.validate().is_err());
  }

  #[test]
  fn deserialization_validates() {
    let ok: RunTypeAssignments = serde_json::from_str(
      r#"{"var_1": {"measurement": {"variable": "V"}}, "std1": "internal_calibration"}"#,
    )
    .unwrap();
    assert_eq!(ok.len(), 2);

    let cyclic = serde_json::from_str::<RunTypeAssignments>(
      r#"{"a": {"alias": {"to": "b"}}, "b": {"alias": {"to": "a"}}}"#,
    );
    assert!(cyclic.is_err());
  }

  #[test]
  fn periods_merge_consecutive_run_types() {
    let values = [
      SensorValue::run_type(1, "Run Type", at(0), "var_1"),
      SensorValue::run_type(2, "Run Type", at(2), "VAR_1"),
      SensorValue::run_type(3, "Run Type", at(5), "std1"),
      SensorValue::run_type(4, "Run Type", at(8), "var_1"),
    ];
    let periods = RunTypePeriods::from_values(&values);
    assert_eq!(periods.len(), 3);

    let first = periods.containing(at(4)).unwrap();
    assert_eq!(first.run_type, "var_1");
    assert_eq!(first.end, Some(at(5)));
    assert_eq!(periods.containing(at(5)).unwrap().run_type, "std1");
    assert_eq!(periods.containing(at(59)).unwrap().run_type, "var_1");
    assert!(
      periods
        .containing(Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap())
        .is_none()
    );
  }
}
