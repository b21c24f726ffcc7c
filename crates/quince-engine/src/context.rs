//! Everything the engine needs to know about an instrument, built once at
//! start up and passed down by reference.

use quince_core::{run_type::RunTypeAssignments, sensor::SensorsConfiguration};
use quince_routines::{QcRoutines, external_standards::StandardTargets};

use crate::{
  Error, Result, diagnostics::DiagnosticQcConfig, reduction::ReducerSet,
};

#[derive(Debug, Clone)]
pub struct QcContext {
  pub sensors:     SensorsConfiguration,
  pub run_types:   RunTypeAssignments,
  pub diagnostics: DiagnosticQcConfig,
  pub routines:    QcRoutines,
  pub reducers:    ReducerSet,
  /// Target concentrations of the external standards.
  pub standards:   StandardTargets,
}

impl QcContext {
  /// A context with no routines, run types or diagnostic links.
  pub fn new(sensors: SensorsConfiguration) -> Self {
    Self {
      sensors,
      run_types: RunTypeAssignments::new(),
      diagnostics: DiagnosticQcConfig::new(),
      routines: QcRoutines::default(),
      reducers: ReducerSet::new(),
      standards: StandardTargets::new(),
    }
  }

  /// Cross-check the parts against each other.
  pub fn validate(&self) -> Result<()> {
    self.run_types.validate()?;
    self.diagnostics.validate(&self.sensors)?;
    for variable in self.reducers.variables() {
      if self.sensors.variable(variable).is_none() {
        return Err(Error::UnknownVariable(variable.to_string()));
      }
    }
    Ok(())
  }

  /// Name of the sensor type whose values carry the run type, if any.
  pub fn run_type_sensor(&self) -> Option<&str> {
    self.sensors.run_type_sensor().map(|s| s.name.as_str())
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use quince_core::sensor::SensorType;
  use quince_routines::RoutineConfiguration;

  use super::*;
  use crate::{FnReducer, reduction::Inputs};

  fn assert_send_sync<T: Send + Sync>() {}

  #[test]
  fn context_is_shareable_across_threads() {
    assert_send_sync::<QcContext>();

    let sensors = SensorsConfiguration::new(vec![SensorType::new("SST")], vec![]).unwrap();
    let mut ctx = QcContext::new(sensors);
    ctx.routines.sensor_values =
      RoutineConfiguration::from_csv("qc.csv", "Missing,SST\n", &ctx.sensors).unwrap();
    let ctx = Arc::new(ctx);

    let counts: Vec<usize> = std::thread::scope(|scope| {
      let handles: Vec<_> = (0..2)
        .map(|_| {
          let ctx = Arc::clone(&ctx);
          scope.spawn(move || ctx.routines.sensor_values.routines_for("SST").len())
        })
        .collect();
      handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(counts, vec![1, 1]);
  }

  #[test]
  fn reducers_must_name_known_variables() {
    let sensors = SensorsConfiguration::new(vec![SensorType::new("SST")], vec![]).unwrap();
    let mut ctx = QcContext::new(sensors);
    ctx.reducers.register(
      "Underway SST",
      FnReducer::new(|_: &Inputs| Ok(Default::default())),
    );
    assert!(matches!(ctx.validate(), Err(Error::UnknownVariable(v)) if v == "Underway SST"));
  }
}
