//! Automatic QC of a dataset's sensor values.
//!
//! Every run starts from scratch: previous auto-QC results are cleared, each
//! configured sensor type's series is checked by its sensor-value routines,
//! and values recorded while an external standard was running are checked by
//! the external-standard routines. Values whose user flag was assigned by the
//! system are then set to `Needed` or `AssumedGood` from the outcome.

use std::collections::HashSet;

use quince_core::{
  Flag,
  dataset::Dataset,
  routine_flag::RoutineFlag,
  run_type::RunTypePeriod,
  value::{SensorValue, ValueId},
};
use quince_routines::{
  Routine, RoutineError, external_standards::StandardRun,
  sensor_values::is_checkable,
};
use serde::Serialize;

use crate::{Result, context::QcContext, error::QcFailure};

/// Summary of one auto-QC run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AutoQcReport {
  pub values_checked: usize,
  /// Values with at least one routine flag.
  pub values_flagged: usize,
  pub failures:       Vec<QcFailure>,
}

/// Run auto-QC over every sensor value in `dataset`.
///
/// Fails only when a run type cannot be resolved; routine failures are
/// reported and the remaining routines still run. NaN or infinite readings
/// are reported against every routine that would have checked them, and the
/// rest of their series is checked as usual.
pub fn run_auto_qc(ctx: &QcContext, dataset: &mut Dataset) -> Result<AutoQcReport> {
  let run_type_sensor = ctx.run_type_sensor();
  let periods = run_type_sensor
    .map(|sensor| dataset.run_type_periods(sensor))
    .unwrap_or_default();

  let mut calibration: Vec<(&RunTypePeriod, String)> = Vec::new();
  for period in periods.iter() {
    let resolved = ctx.run_types.resolve(&period.run_type)?;
    if resolved.is_internal_calibration() {
      calibration.push((period, resolved.name.to_string()));
    }
  }
  let in_calibration = |value: &SensorValue| {
    calibration.iter().any(|(p, _)| p.contains(value.timestamp))
  };

  let mut report = AutoQcReport::default();
  let mut raised: Vec<(ValueId, RoutineFlag)> = Vec::new();

  for (sensor_type, routines) in ctx.routines.sensor_values.subjects() {
    let calibrated = ctx
      .sensors
      .sensor_type(sensor_type)
      .is_some_and(|s| s.calibrated);
    let (series, unreadable) = split_unreadable(
      dataset
        .series(sensor_type)
        .into_iter()
        .filter(|v| !(calibrated && in_calibration(v))),
    );

    for routine in routines {
      skip(&mut report, sensor_type, routine.as_ref(), &unreadable);
      match routine.qc(&series) {
        Ok(flags) => raised.extend(flags),
        Err(e) => fail(&mut report, sensor_type, e),
      }
    }
  }

  for (sensor_type, routines) in ctx.routines.external_standards.subjects() {
    let series = dataset.series(sensor_type);
    for (period, standard) in &calibration {
      let (values, unreadable) = split_unreadable(
        series.iter().copied().filter(|v| period.contains(v.timestamp)),
      );
      for routine in routines {
        skip(&mut report, sensor_type, routine.as_ref(), &unreadable);
      }
      if values.is_empty() {
        continue;
      }
      let run = StandardRun {
        standard: standard.as_str(),
        target:   ctx
          .standards
          .target(&period.run_type)
          .or_else(|| ctx.standards.target(standard)),
        values,
      };
      for routine in routines {
        match routine.qc(&run) {
          Ok(flags) => raised.extend(flags),
          Err(e) => fail(&mut report, sensor_type, e),
        }
      }
    }
  }

  let index = dataset.index();
  for value in &mut dataset.sensor_values {
    if Some(value.sensor_type.as_str()) != run_type_sensor {
      value.auto_qc.clear();
    }
  }
  for (id, flag) in raised {
    if let Some(&i) = index.get(&id) {
      dataset.sensor_values[i].auto_qc.add(flag);
    }
  }

  let mut flagged: HashSet<ValueId> = HashSet::new();
  for value in &mut dataset.sensor_values {
    if Some(value.sensor_type.as_str()) == run_type_sensor {
      continue;
    }
    report.values_checked += 1;
    if !value.auto_qc.is_empty() {
      flagged.insert(value.id);
    }
    if matches!(value.user_flag, Flag::AssumedGood | Flag::Needed) {
      value.user_flag = if value.auto_qc.overall_flag().is_good() {
        Flag::AssumedGood
      } else {
        Flag::Needed
      };
    }
  }
  report.values_flagged = flagged.len();

  tracing::info!(
    dataset = %dataset.name,
    checked = report.values_checked,
    flagged = report.values_flagged,
    failures = report.failures.len(),
    "auto QC complete"
  );
  Ok(report)
}

/// Checkable values, and those with a NaN or infinite reading.
fn split_unreadable<'a, I>(values: I) -> (Vec<&'a SensorValue>, Vec<&'a SensorValue>)
where
  I: Iterator<Item = &'a SensorValue>,
{
  values.partition(|v| is_checkable(v))
}

fn skip<R: Routine + ?Sized>(
  report: &mut AutoQcReport,
  sensor_type: &str,
  routine: &R,
  unreadable: &[&SensorValue],
) {
  for value in unreadable {
    fail(
      report,
      sensor_type,
      RoutineError::new(routine.name(), format!("value {} is not finite", value.id)),
    );
  }
}

fn fail(report: &mut AutoQcReport, sensor_type: &str, error: RoutineError) {
  tracing::warn!(sensor_type, "auto QC routine failed: {error}");
  report.failures.push(QcFailure::routine(sensor_type, error));
}
