//! Routines run against data-reduction records once their parameters have
//! been calculated.

mod input_difference;
mod range_check;

pub use input_difference::InputDifferenceRoutine;
pub use range_check::ParameterRangeRoutine;
use quince_core::sensor::SensorsConfiguration;

use crate::{definition::RoutineDefinition, error::ConfigErrorKind};

/// Validate and copy a definition's flagged sensors.
pub(crate) fn flagged_sensors(
  definition: &RoutineDefinition,
  sensors: &SensorsConfiguration,
) -> Result<Vec<String>, ConfigErrorKind> {
  for name in &definition.flagged_sensors {
    if sensors.sensor_type(name).is_none() {
      return Err(ConfigErrorKind::UnknownSensorType(name.clone()));
    }
  }
  Ok(definition.flagged_sensors.clone())
}

#[cfg(test)]
pub(crate) mod test_helpers {
  use chrono::{TimeZone, Utc};
  use quince_core::{
    sensor::{SensorType, SensorsConfiguration, Variable},
    value::DataReductionRecord,
  };

  pub(crate) fn sensors() -> SensorsConfiguration {
    SensorsConfiguration::new(
      vec![
        SensorType::new("SST"),
        SensorType::new("Equilibrator Temperature"),
        SensorType::new("xCO2"),
      ],
      vec![Variable {
        name:         "Underway pCO2".into(),
        sensor_types: vec![
          "SST".into(),
          "Equilibrator Temperature".into(),
          "xCO2".into(),
        ],
      }],
    )
    .unwrap()
  }

  pub(crate) fn record(parameters: &[(&str, f64)]) -> DataReductionRecord {
    let mut record = DataReductionRecord::new(
      1,
      "Underway pCO2",
      Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
      vec![1, 2, 3],
    );
    for (name, value) in parameters {
      record.parameters.insert(name.to_string(), *value);
    }
    record
  }
}
