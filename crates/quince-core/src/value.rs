//! Sensor values and data-reduction records as seen by the QC engine.
//!
//! Both are owned by the storage layer; the engine only reads them and
//! rewrites their QC fields.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  flag::Flag,
  routine_flag::{AutoQcResult, MessageLookup},
};

pub type ValueId = i64;

/// Separator used when a list of messages is shown as a single comment.
pub const COMMENT_SEPARATOR: &str = "; ";

fn default_user_flag() -> Flag { Flag::AssumedGood }

fn default_record_flag() -> Flag { Flag::Good }

// ─── Sensor values ───────────────────────────────────────────────────────────

/// A flag pushed onto a value by a diagnostic sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeContribution {
  /// The diagnostic value responsible.
  pub source_id: ValueId,
  pub flag:      Flag,
  /// Comment fragment naming the cause, e.g. "Water Flow Bad".
  pub fragment:  String,
}

/// One measured value from one sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorValue {
  pub id:           ValueId,
  pub sensor_type:  String,
  pub timestamp:    DateTime<Utc>,
  pub value:        Option<f64>,
  /// Text value, used for run types.
  #[serde(default)]
  pub raw:          Option<String>,
  #[serde(default)]
  pub auto_qc:      AutoQcResult,
  /// `Needed` defers to the auto-QC result; anything else overrides it.
  #[serde(default = "default_user_flag")]
  pub user_flag:    Flag,
  #[serde(default)]
  pub user_comment: String,
  /// Flags currently imposed by diagnostic sensors. Replaced wholesale on
  /// every cascade; never accumulated.
  #[serde(default)]
  pub cascade:      Vec<CascadeContribution>,
}

impl SensorValue {
  pub fn new(
    id: ValueId,
    sensor_type: impl Into<String>,
    timestamp: DateTime<Utc>,
    value: Option<f64>,
  ) -> Self {
    Self {
      id,
      sensor_type: sensor_type.into(),
      timestamp,
      value,
      raw: None,
      auto_qc: AutoQcResult::new(),
      user_flag: default_user_flag(),
      user_comment: String::new(),
      cascade: Vec::new(),
    }
  }

  /// A run-type value carrying `run_type` as its text.
  pub fn run_type(
    id: ValueId,
    sensor_type: impl Into<String>,
    timestamp: DateTime<Utc>,
    run_type: impl Into<String>,
  ) -> Self {
    let mut value = Self::new(id, sensor_type, timestamp, None);
    value.raw = Some(run_type.into());
    value
  }

  /// The value's own flag, ignoring cascades: the user flag unless it defers
  /// to auto-QC.
  pub fn own_flag(&self) -> Flag {
    if self.user_flag == Flag::Needed {
      self.auto_qc.overall_flag()
    } else {
      self.user_flag
    }
  }

  /// The own flag combined with every cascade contribution.
  pub fn effective_flag(&self) -> Flag {
    Flag::most_significant(
      std::iter::once(self.own_flag()).chain(self.cascade.iter().map(|c| c.flag)),
    )
    .unwrap_or_else(|| self.own_flag())
  }

  /// Messages explaining the own flag: the user comment, or the auto-QC
  /// short messages when deferring to auto-QC.
  pub fn own_messages(&self, lookup: &dyn MessageLookup) -> Vec<String> {
    if self.user_flag == Flag::Needed {
      self
        .auto_qc
        .flags()
        .iter()
        .map(|f| {
          lookup
            .short_message(f)
            .unwrap_or_else(|| f.routine_name.clone())
        })
        .collect()
    } else if self.user_comment.is_empty() {
      Vec::new()
    } else {
      vec![self.user_comment.clone()]
    }
  }

  /// Own messages followed by the distinct cascade fragments.
  pub fn effective_messages(&self, lookup: &dyn MessageLookup) -> Vec<String> {
    let mut messages = self.own_messages(lookup);
    for contribution in &self.cascade {
      if !messages.contains(&contribution.fragment) {
        messages.push(contribution.fragment.clone());
      }
    }
    messages
  }

  pub fn effective_comment(&self, lookup: &dyn MessageLookup) -> String {
    self.effective_messages(lookup).join(COMMENT_SEPARATOR)
  }
}

// ─── Data-reduction records ──────────────────────────────────────────────────

/// One derived measurement produced by data reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataReductionRecord {
  pub id:         i64,
  pub variable:   String,
  pub timestamp:  DateTime<Utc>,
  /// Sensor values the reduction reads.
  pub inputs:     Vec<ValueId>,
  #[serde(default)]
  pub parameters: BTreeMap<String, f64>,
  #[serde(default = "default_record_flag")]
  pub flag:       Flag,
  #[serde(default)]
  pub messages:   Vec<String>,
}

impl DataReductionRecord {
  pub fn new(
    id: i64,
    variable: impl Into<String>,
    timestamp: DateTime<Utc>,
    inputs: Vec<ValueId>,
  ) -> Self {
    Self {
      id,
      variable: variable.into(),
      timestamp,
      inputs,
      parameters: BTreeMap::new(),
      flag: default_record_flag(),
      messages: Vec::new(),
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::routine_flag::RoutineFlag;

  struct Names;

  impl MessageLookup for Names {
    fn short_message(&self, flag: &RoutineFlag) -> Option<String> {
      Some(format!("short {}", flag.routine_name))
    }

    fn long_message(&self, _: &RoutineFlag, _: &str) -> Option<String> {
      None
    }
  }

  fn value() -> SensorValue {
    SensorValue::new(
      1,
      "SST",
      Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
      Some(12.5),
    )
  }

  #[test]
  fn needed_defers_to_auto_qc() {
    let mut v = value();
    v.auto_qc.add(RoutineFlag::new("SensorValues.RangeCheckRoutine", Flag::Bad));
    v.user_flag = Flag::Needed;
    assert_eq!(v.own_flag(), Flag::Bad);
    assert_eq!(v.own_messages(&Names), vec![
      "short SensorValues.RangeCheckRoutine".to_string()
    ]);

    v.user_flag = Flag::Good;
    v.user_comment = "checked".into();
    assert_eq!(v.own_flag(), Flag::Good);
    assert_eq!(v.own_messages(&Names), vec!["checked".to_string()]);
  }

  #[test]
  fn cascade_contributions_raise_effective_flag() {
    let mut v = value();
    v.user_comment = "ok".into();
    v.cascade = vec![
      CascadeContribution {
        source_id: 9,
        flag:      Flag::Questionable,
        fragment:  "Water Flow Questionable".into(),
      },
      CascadeContribution {
        source_id: 10,
        flag:      Flag::Questionable,
        fragment:  "Water Flow Questionable".into(),
      },
    ];
    assert_eq!(v.effective_flag(), Flag::Questionable);
    assert_eq!(v.effective_comment(&Names), "ok; Water Flow Questionable");
  }
}
