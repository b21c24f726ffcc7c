//! Which measurement sensors each diagnostic sensor affects, and under which
//! run types.

use std::collections::{BTreeMap, BTreeSet};

use quince_core::sensor::SensorsConfiguration;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One configured effect of a diagnostic sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticLink {
  pub diagnostic:  String,
  pub measurement: String,
  pub run_types:   Vec<String>,
}

/// Diagnostic sensor × measurement sensor → affected run types.
///
/// Run-type names are matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<DiagnosticLink>", into = "Vec<DiagnosticLink>")]
pub struct DiagnosticQcConfig {
  links: BTreeMap<(String, String), BTreeSet<String>>,
}

impl DiagnosticQcConfig {
  pub fn new() -> Self { Self::default() }

  /// Set the run types under which `diagnostic` affects `measurement`,
  /// replacing any previous setting. An empty set removes the link.
  pub fn set<I, S>(&mut self, diagnostic: &str, measurement: &str, run_types: I)
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let key = (diagnostic.to_string(), measurement.to_string());
    let run_types: BTreeSet<String> = run_types
      .into_iter()
      .map(|r| r.as_ref().to_lowercase())
      .collect();
    if run_types.is_empty() {
      self.links.remove(&key);
    } else {
      self.links.insert(key, run_types);
    }
  }

  /// Whether `diagnostic` affects `measurement` when any of `run_types` is
  /// in effect. Callers pass both the recorded and the alias-resolved name.
  pub fn affects(
    &self,
    diagnostic: &str,
    measurement: &str,
    run_types: &[&str],
  ) -> bool {
    self
      .links
      .get(&(diagnostic.to_string(), measurement.to_string()))
      .is_some_and(|set| {
        run_types.iter().any(|r| set.contains(&r.to_lowercase()))
      })
  }

  /// Diagnostic sensors that affect `measurement` under any of `run_types`.
  pub fn diagnostics_for<'a>(
    &'a self,
    measurement: &'a str,
    run_types: &'a [&'a str],
  ) -> impl Iterator<Item = &'a str> + 'a {
    self
      .links
      .iter()
      .filter(move |((_, m), set)| {
        m == measurement
          && run_types.iter().any(|r| set.contains(&r.to_lowercase()))
      })
      .map(|((d, _), _)| d.as_str())
  }

  pub fn is_diagnostic(&self, sensor_type: &str) -> bool {
    self.links.keys().any(|(d, _)| d == sensor_type)
  }

  pub fn is_empty(&self) -> bool { self.links.is_empty() }

  /// Check every link against the instrument's sensors.
  pub fn validate(&self, sensors: &SensorsConfiguration) -> Result<()> {
    for (diagnostic, measurement) in self.links.keys() {
      let sensor = sensors
        .sensor_type(diagnostic)
        .ok_or_else(|| Error::UnknownSensorType(diagnostic.clone()))?;
      if !sensor.diagnostic {
        return Err(Error::NotDiagnostic(diagnostic.clone()));
      }
      if sensors.sensor_type(measurement).is_none() {
        return Err(Error::UnknownSensorType(measurement.clone()));
      }
    }
    Ok(())
  }
}

impl From<Vec<DiagnosticLink>> for DiagnosticQcConfig {
  fn from(links: Vec<DiagnosticLink>) -> Self {
    let mut config = Self::new();
    for link in links {
      config.set(&link.diagnostic, &link.measurement, &link.run_types);
    }
    config
  }
}

impl From<DiagnosticQcConfig> for Vec<DiagnosticLink> {
  fn from(config: DiagnosticQcConfig) -> Self {
    config
      .links
      .into_iter()
      .map(|((diagnostic, measurement), run_types)| DiagnosticLink {
        diagnostic,
        measurement,
        run_types: run_types.into_iter().collect(),
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use quince_core::sensor::SensorType;

  use super::*;

  fn config() -> DiagnosticQcConfig {
    let mut config = DiagnosticQcConfig::new();
    config.set("Water Flow", "SST", ["var_1", "VAR_2"]);
    config
  }

  #[test]
  fn run_types_match_case_insensitively() {
    let config = config();
    assert!(config.affects("Water Flow", "SST", &["VAR_1"]));
    assert!(config.affects("Water Flow", "SST", &["std1", "var_2"]));
    assert!(!config.affects("Water Flow", "SST", &["std1"]));
    assert!(!config.affects("Water Flow", "xCO2", &["var_1"]));
    assert_eq!(
      config.diagnostics_for("SST", &["var_1"]).collect::<Vec<_>>(),
      vec!["Water Flow"]
    );
  }

  #[test]
  fn empty_run_types_remove_the_link() {
    let mut config = config();
    config.set("Water Flow", "SST", Vec::<String>::new());
    assert!(config.is_empty());
  }

  #[test]
  fn deserializes_from_a_list_of_links() {
    let config: DiagnosticQcConfig = serde_json::from_str(
      r#"[{"diagnostic": "Water Flow", "measurement": "SST", "run_types": ["var_1"]}]"#,
    )
    .unwrap();
    assert!(config.affects("Water Flow", "SST", &["var_1"]));
  }

  #[test]
  fn validation_requires_a_diagnostic_source() {
    let mut flow = SensorType::new("Water Flow");
    let sensors = |flow: SensorType| {
      SensorsConfiguration::new(vec![flow, SensorType::new("SST")], vec![])
        .unwrap()
    };
    assert!(matches!(
      config().validate(&sensors(flow.clone())),
      Err(Error::NotDiagnostic(_))
    ));
    flow.diagnostic = true;
    assert!(config().validate(&sensors(flow)).is_ok());

    let mut unknown = DiagnosticQcConfig::new();
    unknown.set("Water Flow", "Flurble", ["var_1"]);
    let mut flow = SensorType::new("Water Flow");
    flow.diagnostic = true;
    assert!(matches!(
      unknown.validate(&sensors(flow)),
      Err(Error::UnknownSensorType(name)) if name == "Flurble"
    ));
  }
}
