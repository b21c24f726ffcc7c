//! Builders for every routine, keyed by short name.
//!
//! Adding a routine means adding it to the match and the name list of its
//! group. Unknown names are rejected at configuration load.

use std::sync::Arc;

use quince_core::sensor::SensorsConfiguration;

use crate::{
  data_reduction::{InputDifferenceRoutine, ParameterRangeRoutine},
  definition::RoutineDefinition,
  error::ConfigErrorKind,
  external_standards::{StandardOffsetRoutine, StandardStdevRoutine},
  routine::{
    DataReductionRoutine, ExternalStandardRoutine, RoutineGroup, RoutineKind,
    SensorValueRoutine,
  },
  sensor_values::{
    ConstantValueRoutine, GradientRoutine, MissingRoutine, OutlierRoutine,
    RangeCheckRoutine,
  },
};

fn unknown(group: RoutineGroup, definition: &RoutineDefinition) -> ConfigErrorKind {
  ConfigErrorKind::UnknownRoutine(group.full_name(&definition.name))
}

impl RoutineKind for dyn SensorValueRoutine {
  const GROUP: RoutineGroup = RoutineGroup::SensorValues;

  fn build(
    definition: &RoutineDefinition,
    _sensors: &SensorsConfiguration,
  ) -> Result<Arc<Self>, ConfigErrorKind> {
    let routine: Arc<Self> = match definition.name.as_str() {
      "RangeCheck" => Arc::new(RangeCheckRoutine::from_definition(definition)?),
      "Gradient" => Arc::new(GradientRoutine::from_definition(definition)?),
      "ConstantValue" => {
        Arc::new(ConstantValueRoutine::from_definition(definition)?)
      }
      "Outlier" => Arc::new(OutlierRoutine::from_definition(definition)?),
      "Missing" => Arc::new(MissingRoutine::from_definition(definition)?),
      _ => return Err(unknown(Self::GROUP, definition)),
    };
    Ok(routine)
  }

  fn known_routines() -> &'static [&'static str] {
    &["RangeCheck", "Gradient", "ConstantValue", "Outlier", "Missing"]
  }
}

impl RoutineKind for dyn ExternalStandardRoutine {
  const GROUP: RoutineGroup = RoutineGroup::ExternalStandards;

  fn build(
    definition: &RoutineDefinition,
    _sensors: &SensorsConfiguration,
  ) -> Result<Arc<Self>, ConfigErrorKind> {
    let routine: Arc<Self> = match definition.name.as_str() {
      "StandardOffset" => {
        Arc::new(StandardOffsetRoutine::from_definition(definition)?)
      }
      "StandardStdev" => {
        Arc::new(StandardStdevRoutine::from_definition(definition)?)
      }
      _ => return Err(unknown(Self::GROUP, definition)),
    };
    Ok(routine)
  }

  fn known_routines() -> &'static [&'static str] {
    &["StandardOffset", "StandardStdev"]
  }
}

impl RoutineKind for dyn DataReductionRoutine {
  const GROUP: RoutineGroup = RoutineGroup::DataReduction;

  fn build(
    definition: &RoutineDefinition,
    sensors: &SensorsConfiguration,
  ) -> Result<Arc<Self>, ConfigErrorKind> {
    let routine: Arc<Self> = match definition.name.as_str() {
      "RangeCheck" => {
        Arc::new(ParameterRangeRoutine::from_definition(definition, sensors)?)
      }
      "InputDifference" => {
        Arc::new(InputDifferenceRoutine::from_definition(definition, sensors)?)
      }
      _ => return Err(unknown(Self::GROUP, definition)),
    };
    Ok(routine)
  }

  fn known_routines() -> &'static [&'static str] {
    &["RangeCheck", "InputDifference"]
  }
}
