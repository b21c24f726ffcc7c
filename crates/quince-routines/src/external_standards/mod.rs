//! Routines run against values recorded while the instrument measured an
//! external standard of known concentration.

mod offset;
mod stdev;

use std::collections::BTreeMap;

pub use offset::StandardOffsetRoutine;
use quince_core::value::SensorValue;
use serde::{Deserialize, Serialize};
pub use stdev::StandardStdevRoutine;

/// Known concentrations of the external standards, keyed by run type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct StandardTargets {
  /// Lower-cased run type → target.
  targets: BTreeMap<String, f64>,
}

impl StandardTargets {
  pub fn new() -> Self { Self::default() }

  pub fn insert(&mut self, run_type: &str, target: f64) {
    self.targets.insert(run_type.to_lowercase(), target);
  }

  pub fn target(&self, run_type: &str) -> Option<f64> {
    self.targets.get(&run_type.to_lowercase()).copied()
  }
}

impl From<BTreeMap<String, f64>> for StandardTargets {
  fn from(map: BTreeMap<String, f64>) -> Self {
    let mut targets = Self::new();
    for (run_type, target) in map {
      targets.insert(&run_type, target);
    }
    targets
  }
}

impl From<StandardTargets> for BTreeMap<String, f64> {
  fn from(targets: StandardTargets) -> Self { targets.targets }
}

/// The values of one sensor recorded during one standard run.
#[derive(Debug, Clone)]
pub struct StandardRun<'a> {
  /// Run type naming the standard.
  pub standard: &'a str,
  pub target:   Option<f64>,
  /// Values in time order.
  pub values:   Vec<&'a SensorValue>,
}
