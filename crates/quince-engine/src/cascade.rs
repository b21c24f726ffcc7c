//! Propagation of diagnostic sensor flags onto measurement values.
//!
//! When user flags change, every run-type period containing a changed value
//! is recomputed from scratch: each value in the period gets the cascade
//! contributions of every flagged diagnostic value in the same period that is
//! linked to its sensor type under the period's run type. Contributions are
//! replaced, never accumulated, so repeating a change is a no-op and lowering
//! a diagnostic flag lowers its targets.
//!
//! Planning reads the dataset without modifying it. Only a complete plan is
//! applied, so an error leaves the dataset untouched.

use std::collections::{BTreeMap, HashMap};

use quince_core::{
  Flag,
  dataset::Dataset,
  run_type::RunTypePeriod,
  value::{CascadeContribution, DataReductionRecord, SensorValue, ValueId},
};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  context::QcContext,
  error::QcFailure,
  reduction::{RecordUpdate, qc_record},
};

/// A user's new flag and comment for one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFlagChange {
  pub value_id: ValueId,
  pub flag:     Flag,
  #[serde(default)]
  pub comment:  String,
}

/// New QC state for one sensor value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorValueUpdate {
  pub value_id:     ValueId,
  pub user_flag:    Flag,
  pub user_comment: String,
  pub cascade:      Vec<CascadeContribution>,
  /// Effective flag after the update.
  pub flag:         Flag,
  /// Effective comment after the update.
  pub comment:      String,
}

impl SensorValueUpdate {
  fn new(ctx: &QcContext, value: &SensorValue) -> Self {
    Self {
      value_id:     value.id,
      user_flag:    value.user_flag,
      user_comment: value.user_comment.clone(),
      cascade:      value.cascade.clone(),
      flag:         value.effective_flag(),
      comment:      value.effective_comment(&ctx.routines),
    }
  }

  pub fn apply_to(&self, value: &mut SensorValue) {
    value.user_flag = self.user_flag;
    value.user_comment = self.user_comment.clone();
    value.cascade = self.cascade.clone();
  }
}

/// Everything one trigger changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CascadePlan {
  pub sensor_updates: Vec<SensorValueUpdate>,
  pub record_updates: Vec<RecordUpdate>,
  /// Records that could not be re-reduced or re-checked.
  pub failures:       Vec<QcFailure>,
}

impl CascadePlan {
  pub fn is_empty(&self) -> bool {
    self.sensor_updates.is_empty() && self.record_updates.is_empty()
  }

  pub fn apply(&self, dataset: &mut Dataset) {
    let index = dataset.index();
    for update in &self.sensor_updates {
      if let Some(&i) = index.get(&update.value_id) {
        update.apply_to(&mut dataset.sensor_values[i]);
      }
    }
    for update in &self.record_updates {
      if let Some(record) =
        dataset.records.iter_mut().find(|r| r.id == update.record_id)
      {
        update.apply_to(record);
      }
    }
  }
}

/// A run-type period with its recorded and resolved run-type names.
struct Window<'p> {
  period:   &'p RunTypePeriod,
  resolved: String,
}

impl Window<'_> {
  fn run_types(&self) -> [&str; 2] {
    [self.period.run_type.as_str(), self.resolved.as_str()]
  }
}

pub struct CascadeEngine<'a> {
  ctx: &'a QcContext,
}

impl<'a> CascadeEngine<'a> {
  pub fn new(ctx: &'a QcContext) -> Self { Self { ctx } }

  /// Plan the effect of `changes` on `dataset`.
  ///
  /// Fails without a plan if a change names an unknown value, omits a
  /// required comment, or falls in a period whose run type cannot be
  /// resolved.
  pub fn plan(
    &self,
    dataset: &Dataset,
    changes: &[UserFlagChange],
  ) -> Result<CascadePlan> {
    self.build(dataset, changes, false)
  }

  /// Recompute every period and every record, e.g. after auto-QC or a change
  /// of run types. Values outside every period lose their cascade.
  pub fn plan_all(&self, dataset: &Dataset) -> Result<CascadePlan> {
    self.build(dataset, &[], true)
  }

  /// Plan `changes` and apply them to `dataset`.
  pub fn set_user_flags(
    &self,
    dataset: &mut Dataset,
    changes: &[UserFlagChange],
  ) -> Result<CascadePlan> {
    let plan = self.plan(dataset, changes)?;
    plan.apply(dataset);
    Ok(plan)
  }

  fn build(
    &self,
    dataset: &Dataset,
    changes: &[UserFlagChange],
    everything: bool,
  ) -> Result<CascadePlan> {
    let index = dataset.index();

    // Values whose state differs from the dataset, keyed by id.
    let mut working: BTreeMap<ValueId, SensorValue> = BTreeMap::new();
    for change in changes {
      let &i = index
        .get(&change.value_id)
        .ok_or(Error::ValueNotFound(change.value_id))?;
      if change.flag.comment_required() && change.comment.trim().is_empty() {
        return Err(Error::CommentRequired {
          value_id: change.value_id,
          flag:     change.flag,
        });
      }
      let value = working
        .entry(change.value_id)
        .or_insert_with(|| dataset.sensor_values[i].clone());
      value.user_flag = change.flag;
      value.user_comment = change.comment.clone();
    }

    let periods = self
      .ctx
      .run_type_sensor()
      .map(|sensor| dataset.run_type_periods(sensor))
      .unwrap_or_default();

    let scopes: Vec<&RunTypePeriod> = if everything {
      periods.iter().collect()
    } else {
      working
        .values()
        .filter_map(|value| {
          let period = periods.containing(value.timestamp);
          if period.is_none() {
            tracing::debug!(value = value.id, "no run type period; nothing to cascade");
          }
          period
        })
        .collect()
    };

    let mut windows: Vec<Window<'_>> = Vec::new();
    for period in scopes {
      if windows.iter().any(|w| w.period.start == period.start) {
        continue;
      }
      let resolved = self.ctx.run_types.resolve(&period.run_type)?;
      windows.push(Window {
        period,
        resolved: resolved.name.to_string(),
      });
    }

    let mut cascades: HashMap<ValueId, Vec<CascadeContribution>> = HashMap::new();
    for window in &windows {
      self.recompute_window(dataset, &working, window, &mut cascades);
    }
    if everything {
      // Values outside every period have nothing to cascade from.
      for value in &dataset.sensor_values {
        if !value.cascade.is_empty() {
          cascades.entry(value.id).or_default();
        }
      }
    }

    for original in &dataset.sensor_values {
      let Some(cascade) = cascades.remove(&original.id) else {
        continue;
      };
      if cascade != original.cascade || working.contains_key(&original.id) {
        working
          .entry(original.id)
          .or_insert_with(|| original.clone())
          .cascade = cascade;
      }
    }

    let sensor_updates: Vec<SensorValueUpdate> = working
      .values()
      .map(|value| SensorValueUpdate::new(self.ctx, value))
      .collect();

    let current = |id: ValueId| {
      working
        .get(&id)
        .or_else(|| index.get(&id).map(|&i| &dataset.sensor_values[i]))
    };

    let mut failures = Vec::new();
    let mut record_updates = Vec::new();
    let records = dataset.records.iter().filter(|record| {
      everything || record.inputs.iter().any(|id| working.contains_key(id))
    });
    for record in records {
      let Some(inputs) = record_inputs(record, &current, &mut failures) else {
        continue;
      };
      if let Some(update) = qc_record(self.ctx, record, &inputs, &mut failures) {
        record_updates.push(update);
      }
    }

    tracing::info!(
      dataset = %dataset.name,
      changes = changes.len(),
      windows = windows.len(),
      sensor_updates = sensor_updates.len(),
      record_updates = record_updates.len(),
      "planned cascade"
    );

    Ok(CascadePlan {
      sensor_updates,
      record_updates,
      failures,
    })
  }

  /// New cascade contributions for every value in `window`.
  fn recompute_window(
    &self,
    dataset: &Dataset,
    working: &BTreeMap<ValueId, SensorValue>,
    window: &Window<'_>,
    cascades: &mut HashMap<ValueId, Vec<CascadeContribution>>,
  ) {
    let run_types = window.run_types();
    let run_type_sensor = self.ctx.run_type_sensor();

    let mut values: Vec<&SensorValue> = dataset
      .sensor_values
      .iter()
      .filter(|v| window.period.contains(v.timestamp))
      .filter(|v| Some(v.sensor_type.as_str()) != run_type_sensor)
      .map(|v| working.get(&v.id).unwrap_or(v))
      .collect();
    values.sort_by_key(|v| (v.timestamp, v.id));

    let mut causes: BTreeMap<&str, Vec<CascadeContribution>> = BTreeMap::new();
    for value in &values {
      if !self.ctx.diagnostics.is_diagnostic(&value.sensor_type) {
        continue;
      }
      let flag = value.own_flag();
      if matches!(flag, Flag::Questionable | Flag::Bad) {
        causes
          .entry(value.sensor_type.as_str())
          .or_default()
          .push(CascadeContribution {
            source_id: value.id,
            flag,
            fragment: format!("{} {flag}", value.sensor_type),
          });
      }
    }

    for value in &values {
      let contributions: Vec<CascadeContribution> = self
        .ctx
        .diagnostics
        .diagnostics_for(&value.sensor_type, &run_types)
        .filter_map(|diagnostic| causes.get(diagnostic))
        .flatten()
        .filter(|c| c.source_id != value.id)
        .cloned()
        .collect();
      tracing::debug!(
        value = value.id,
        run_type = %window.resolved,
        contributions = contributions.len(),
        "recomputed cascade"
      );
      cascades.insert(value.id, contributions);
    }
  }
}

/// The current state of each of a record's inputs, or `None` with a failure
/// if one is missing from the dataset.
fn record_inputs<'d>(
  record: &DataReductionRecord,
  current: &impl Fn(ValueId) -> Option<&'d SensorValue>,
  failures: &mut Vec<QcFailure>,
) -> Option<Vec<&'d SensorValue>> {
  let mut inputs = Vec::with_capacity(record.inputs.len());
  for &id in &record.inputs {
    match current(id) {
      Some(value) => inputs.push(value),
      None => {
        tracing::warn!(record = record.id, value = id, "record input not found");
        failures.push(QcFailure::reduction(
          &record.variable,
          format!("record {} input {id} not found", record.id),
        ));
        return None;
      }
    }
  }
  Some(inputs)
}

#[cfg(test)]
mod tests {
  use chrono::{DateTime, Duration, TimeZone, Utc};
  use quince_core::{
    run_type::RunTypeAssignment,
    sensor::{SensorType, SensorsConfiguration},
  };

  use super::*;

  fn at(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + Duration::minutes(minute)
  }

  fn context() -> QcContext {
    let mut run_type = SensorType::new("Run Type");
    run_type.run_type = true;
    let mut flow = SensorType::new("Water Flow");
    flow.diagnostic = true;
    let sensors = SensorsConfiguration::new(
      vec![run_type, flow, SensorType::new("SST")],
      vec![],
    )
    .unwrap();
    let mut ctx = QcContext::new(sensors);
    ctx.run_types.insert("var_1", RunTypeAssignment::Measurement {
      variable: "var_1".into(),
    });
    ctx.diagnostics.set("Water Flow", "SST", ["var_1"]);
    ctx
  }

  fn dataset() -> Dataset {
    Dataset {
      name:          "cascade".into(),
      sensor_values: vec![
        SensorValue::run_type(1, "Run Type", at(0), "var_1"),
        SensorValue::new(10, "Water Flow", at(1), Some(0.1)),
        SensorValue::new(20, "SST", at(1), Some(12.0)),
      ],
      records:       Vec::new(),
    }
  }

  fn bad_flow() -> UserFlagChange {
    UserFlagChange {
      value_id: 10,
      flag:     Flag::Bad,
      comment:  "Pump off".into(),
    }
  }

  #[test]
  fn plan_does_not_touch_the_dataset() {
    let ctx = context();
    let dataset = dataset();
    let plan = CascadeEngine::new(&ctx).plan(&dataset, &[bad_flow()]).unwrap();
    assert_eq!(plan.sensor_updates.len(), 2);
    assert_eq!(dataset, self::dataset());
  }

  #[test]
  fn required_comments_are_enforced() {
    let ctx = context();
    let change = UserFlagChange {
      comment: " ".into(),
      ..bad_flow()
    };
    assert!(matches!(
      CascadeEngine::new(&ctx).plan(&dataset(), &[change]),
      Err(Error::CommentRequired { value_id: 10, .. })
    ));
  }

  #[test]
  fn unknown_values_are_rejected() {
    let ctx = context();
    let change = UserFlagChange {
      value_id: 99,
      ..bad_flow()
    };
    assert!(matches!(
      CascadeEngine::new(&ctx).plan(&dataset(), &[change]),
      Err(Error::ValueNotFound(99))
    ));
  }

  #[test]
  fn values_outside_any_period_have_no_scope() {
    let ctx = context();
    let mut dataset = dataset();
    dataset.sensor_values.remove(0);
    let plan = CascadeEngine::new(&ctx).plan(&dataset, &[bad_flow()]).unwrap();
    let ids: Vec<ValueId> = plan.sensor_updates.iter().map(|u| u.value_id).collect();
    assert_eq!(ids, vec![10]);
  }

  #[test]
  fn questionable_and_bad_are_the_only_causes() {
    let ctx = context();
    let change = UserFlagChange {
      value_id: 10,
      flag:     Flag::NotCalibrated,
      comment:  String::new(),
    };
    let plan = CascadeEngine::new(&ctx).plan(&dataset(), &[change]).unwrap();
    assert_eq!(plan.sensor_updates.len(), 1);
    assert_eq!(plan.sensor_updates[0].flag, Flag::NotCalibrated);
  }
}
