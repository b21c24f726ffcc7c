//! The routine abstraction.
//!
//! Every routine has a fixed short message and a templated long message.
//! What a routine inspects depends on its group, so each group has its own
//! trait on top of [`Routine`].

use std::{collections::BTreeMap, fmt, sync::Arc};

use quince_core::{
  message::{MessageContext, fill_template},
  routine_flag::RoutineFlag,
  sensor::SensorsConfiguration,
  value::{DataReductionRecord, SensorValue, ValueId},
};

use crate::{
  definition::RoutineDefinition,
  error::{ConfigErrorKind, RoutineError},
  external_standards::StandardRun,
};

// ─── Groups ──────────────────────────────────────────────────────────────────

/// The three families of routine. Each has its own configuration, and its
/// namespace prefixes the serialized name of every routine in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutineGroup {
  SensorValues,
  ExternalStandards,
  DataReduction,
}

impl RoutineGroup {
  pub const ALL: [RoutineGroup; 3] = [
    Self::SensorValues,
    Self::ExternalStandards,
    Self::DataReduction,
  ];

  pub fn namespace(self) -> &'static str {
    match self {
      Self::SensorValues => "SensorValues",
      Self::ExternalStandards => "ExternalStandards",
      Self::DataReduction => "DataReduction",
    }
  }

  /// Serialized name for a routine short name, e.g. `RangeCheck` →
  /// `SensorValues.RangeCheckRoutine`.
  pub fn full_name(self, short_name: &str) -> String {
    format!("{}.{short_name}Routine", self.namespace())
  }

  /// The group a serialized routine name belongs to.
  pub fn of(serialized_name: &str) -> Option<RoutineGroup> {
    let (namespace, _) = serialized_name.split_once('.')?;
    Self::ALL.into_iter().find(|g| g.namespace() == namespace)
  }

  /// Whether routines of this group are configured per variable rather than
  /// per sensor type.
  pub fn keyed_by_variable(self) -> bool { self == Self::DataReduction }
}

impl fmt::Display for RoutineGroup {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.namespace())
  }
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Behaviour shared by every routine.
pub trait Routine: Send + Sync + fmt::Debug {
  /// Serialized, namespaced name.
  fn name(&self) -> &str;

  fn short_message(&self) -> &str;

  /// Template using `{column_name}`, `{field_value}` and `{valid_value}`.
  fn long_message_template(&self) -> &str;

  fn long_message(&self, context: &MessageContext<'_>) -> String {
    fill_template(self.long_message_template(), context)
  }

  /// Long message for a flag this routine raised against `column_name`.
  fn describe(&self, flag: &RoutineFlag, column_name: &str) -> String {
    self.long_message(&MessageContext {
      column_name: Some(column_name),
      field_value: flag.actual_value.as_deref(),
      valid_value: flag.required_value.as_deref(),
    })
  }
}

/// Automatic QC of one sensor's values.
pub trait SensorValueRoutine: Routine {
  /// Check a time-ordered series of values of a single sensor type.
  fn qc(
    &self,
    series: &[&SensorValue],
  ) -> Result<Vec<(ValueId, RoutineFlag)>, RoutineError>;
}

/// QC of values measured while the instrument ran an external standard.
pub trait ExternalStandardRoutine: Routine {
  fn qc(
    &self,
    run: &StandardRun<'_>,
  ) -> Result<Vec<(ValueId, RoutineFlag)>, RoutineError>;
}

/// QC of a record after data reduction.
pub trait DataReductionRoutine: Routine {
  /// Sensor types this routine's flags are reported against.
  fn flagged_sensors(&self) -> &[String];

  /// Column name used in this routine's long messages.
  fn column_name(&self) -> String;

  /// Check a record. `inputs` maps sensor type names to the record's input
  /// values.
  fn qc(
    &self,
    record: &DataReductionRecord,
    inputs: &BTreeMap<String, Option<f64>>,
  ) -> Result<Vec<RoutineFlag>, RoutineError>;
}

/// Ties a routine trait object to its group and its builder registry.
pub trait RoutineKind: Routine {
  const GROUP: RoutineGroup;

  /// Construct a routine from its configuration entry, validating every
  /// argument.
  fn build(
    definition: &RoutineDefinition,
    sensors: &SensorsConfiguration,
  ) -> Result<Arc<Self>, ConfigErrorKind>;

  /// Short names this group knows how to build.
  fn known_routines() -> &'static [&'static str];
}
