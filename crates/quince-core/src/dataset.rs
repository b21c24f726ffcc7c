//! The in-memory slice of a dataset the QC engine works on.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
  run_type::RunTypePeriods,
  value::{DataReductionRecord, SensorValue, ValueId},
};

/// Sensor values and reduction records loaded for one dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
  #[serde(default)]
  pub name:          String,
  pub sensor_values: Vec<SensorValue>,
  #[serde(default)]
  pub records:       Vec<DataReductionRecord>,
}

impl Dataset {
  /// Map from value id to position in `sensor_values`.
  pub fn index(&self) -> HashMap<ValueId, usize> {
    self
      .sensor_values
      .iter()
      .enumerate()
      .map(|(i, v)| (v.id, i))
      .collect()
  }

  pub fn value(&self, id: ValueId) -> Option<&SensorValue> {
    self.sensor_values.iter().find(|v| v.id == id)
  }

  /// Values of one sensor type, in time order.
  pub fn series(&self, sensor_type: &str) -> Vec<&SensorValue> {
    let mut series: Vec<&SensorValue> = self
      .sensor_values
      .iter()
      .filter(|v| v.sensor_type == sensor_type)
      .collect();
    series.sort_by_key(|v| v.timestamp);
    series
  }

  /// Run-type periods from the values of `run_type_sensor`.
  pub fn run_type_periods(&self, run_type_sensor: &str) -> RunTypePeriods {
    RunTypePeriods::from_values(
      self
        .sensor_values
        .iter()
        .filter(|v| v.sensor_type == run_type_sensor),
    )
  }
}
