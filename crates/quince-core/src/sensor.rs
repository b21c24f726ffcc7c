//! Sensor types and the variables calculated from them.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A kind of sensor an instrument can carry, e.g. "SST" or "Water Flow".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorType {
  /// Display name; used as the key everywhere else.
  pub name:        String,
  /// Diagnostic sensors describe instrument health rather than the ocean.
  #[serde(default)]
  pub diagnostic:  bool,
  /// The sensor whose raw text gives the instrument's run type.
  #[serde(default)]
  pub run_type:    bool,
  /// Measured against external standards during calibration runs.
  #[serde(default)]
  pub calibrated:  bool,
}

impl SensorType {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name:       name.into(),
      diagnostic: false,
      run_type:   false,
      calibrated: false,
    }
  }
}

/// A derived quantity and the sensor types its data reduction reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
  pub name:         String,
  pub sensor_types: Vec<String>,
}

/// Shape of the sensors file before validation.
#[derive(Debug, Deserialize)]
pub struct SensorsFile {
  pub sensor_types: Vec<SensorType>,
  #[serde(default)]
  pub variables:    Vec<Variable>,
}

/// The validated set of sensor types and variables known to an instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SensorsFile")]
pub struct SensorsConfiguration {
  sensor_types: Vec<SensorType>,
  variables:    Vec<Variable>,
}

impl SensorsConfiguration {
  /// Build a configuration, rejecting duplicate names and variables that
  /// read undeclared sensor types.
  pub fn new(
    sensor_types: Vec<SensorType>,
    variables: Vec<Variable>,
  ) -> Result<Self> {
    for (i, sensor_type) in sensor_types.iter().enumerate() {
      if sensor_types[..i].iter().any(|s| s.name == sensor_type.name) {
        return Err(Error::DuplicateSensorType(sensor_type.name.clone()));
      }
    }

    for (i, variable) in variables.iter().enumerate() {
      if variables[..i].iter().any(|v| v.name == variable.name) {
        return Err(Error::DuplicateVariable(variable.name.clone()));
      }
      if let Some(missing) = variable
        .sensor_types
        .iter()
        .find(|name| !sensor_types.iter().any(|s| &s.name == *name))
      {
        return Err(Error::UnknownVariableInput {
          variable:    variable.name.clone(),
          sensor_type: missing.clone(),
        });
      }
    }

    Ok(Self {
      sensor_types,
      variables,
    })
  }

  pub fn from_json(text: &str) -> Result<Self> {
    Ok(serde_json::from_str(text)?)
  }

  pub fn sensor_type(&self, name: &str) -> Option<&SensorType> {
    self.sensor_types.iter().find(|s| s.name == name)
  }

  pub fn variable(&self, name: &str) -> Option<&Variable> {
    self.variables.iter().find(|v| v.name == name)
  }

  pub fn sensor_types(&self) -> &[SensorType] { &self.sensor_types }

  pub fn variables(&self) -> &[Variable] { &self.variables }

  /// The sensor type that carries run types, if the instrument has one.
  pub fn run_type_sensor(&self) -> Option<&SensorType> {
    self.sensor_types.iter().find(|s| s.run_type)
  }
}

impl TryFrom<SensorsFile> for SensorsConfiguration {
  type Error = Error;

  fn try_from(raw: SensorsFile) -> Result<Self> {
    Self::new(raw.sensor_types, raw.variables)
  }
}
