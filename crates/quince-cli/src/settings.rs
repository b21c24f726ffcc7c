//! Instrument settings and loading the QC context they describe.

use std::{
  fs,
  path::{Path, PathBuf},
};

use anyhow::Context as _;
use quince_core::{run_type::RunTypeAssignments, sensor::SensorsConfiguration};
use quince_engine::{DiagnosticQcConfig, QcContext};
use quince_routines::{
  RoutineConfiguration, RoutineKind, external_standards::StandardTargets,
};
use serde::Deserialize;

/// Files describing one instrument. Relative paths are resolved against the
/// directory of the settings file.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  /// JSON sensor types and variables.
  pub sensors:                    PathBuf,
  /// Routine configurations, CSV or JSON by extension.
  pub sensor_value_routines:      Option<PathBuf>,
  pub external_standard_routines: Option<PathBuf>,
  pub data_reduction_routines:    Option<PathBuf>,
  /// JSON map of run type → assignment.
  pub run_types:                  Option<PathBuf>,
  /// JSON list of diagnostic links.
  pub diagnostics:                Option<PathBuf>,
  /// JSON map of run type → standard concentration.
  pub standards:                  Option<PathBuf>,
}

impl Settings {
  /// Read `path` (optional) and `QUINCE_*` environment variables.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("QUINCE"))
      .build()
      .context("failed to read settings")?;

    let settings: Settings = settings
      .try_deserialize()
      .context("failed to deserialise settings")?;

    let base = path.parent().unwrap_or(Path::new(""));
    Ok(settings.relative_to(base))
  }

  fn relative_to(self, base: &Path) -> Self {
    let resolve = |p: PathBuf| {
      if p.is_absolute() { p } else { base.join(p) }
    };
    Self {
      sensors:                    resolve(self.sensors),
      sensor_value_routines:      self.sensor_value_routines.map(resolve),
      external_standard_routines: self.external_standard_routines.map(resolve),
      data_reduction_routines:    self.data_reduction_routines.map(resolve),
      run_types:                  self.run_types.map(resolve),
      diagnostics:                self.diagnostics.map(resolve),
      standards:                  self.standards.map(resolve),
    }
  }

  /// Load and cross-check every configured file.
  pub fn context(&self) -> anyhow::Result<QcContext> {
    let sensors: SensorsConfiguration =
      SensorsConfiguration::from_json(&read(&self.sensors)?)
        .with_context(|| format!("invalid sensors file {}", self.sensors.display()))?;

    let mut ctx = QcContext::new(sensors);
    ctx.routines.sensor_values =
      routines(self.sensor_value_routines.as_deref(), &ctx.sensors)?;
    ctx.routines.external_standards =
      routines(self.external_standard_routines.as_deref(), &ctx.sensors)?;
    ctx.routines.data_reduction =
      routines(self.data_reduction_routines.as_deref(), &ctx.sensors)?;

    if let Some(path) = &self.run_types {
      ctx.run_types = json::<RunTypeAssignments>(path)?;
    }
    if let Some(path) = &self.diagnostics {
      ctx.diagnostics = json::<DiagnosticQcConfig>(path)?;
    }
    if let Some(path) = &self.standards {
      ctx.standards = json::<StandardTargets>(path)?;
    }

    ctx.validate().context("inconsistent instrument configuration")?;
    Ok(ctx)
  }
}

fn read(path: &Path) -> anyhow::Result<String> {
  fs::read_to_string(path)
    .with_context(|| format!("failed to read {}", path.display()))
}

fn json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
  serde_json::from_str(&read(path)?)
    .with_context(|| format!("invalid JSON in {}", path.display()))
}

fn routines<R: RoutineKind + ?Sized>(
  path: Option<&Path>,
  sensors: &SensorsConfiguration,
) -> anyhow::Result<RoutineConfiguration<R>> {
  let Some(path) = path else {
    return Ok(RoutineConfiguration::default());
  };
  let text = read(path)?;
  let name = path.display().to_string();
  let is_json = path
    .extension()
    .is_some_and(|e| e.eq_ignore_ascii_case("json"));

  let configuration = if is_json {
    RoutineConfiguration::from_json(&name, &text, sensors)?
  } else {
    RoutineConfiguration::from_csv(&name, &text, sensors)?
  };
  Ok(configuration)
}
