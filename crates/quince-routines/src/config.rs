//! Routine configuration: which routines run for which sensor type or
//! variable, loaded from CSV or JSON.
//!
//! A load either succeeds completely or fails with a single [`ConfigError`]
//! naming the source and position of the first problem. There is no partial
//! configuration.
//!
//! CSV lines are `<routine>,<subject>,<parameter>...`; blank lines and lines
//! starting with `#`, `!` or `//` are ignored. JSON documents are an array of
//! `{"sensor_type" | "variable": ..., "routines": [...]}` objects.

use std::{collections::BTreeMap, fmt, sync::Arc};

use quince_core::{
  message::Message,
  routine_flag::{MessageLookup, RoutineFlag},
  sensor::SensorsConfiguration,
};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
  definition::RoutineDefinition,
  error::{ConfigError, ConfigErrorKind, Position},
  routine::{
    DataReductionRoutine, ExternalStandardRoutine, Routine, RoutineGroup,
    RoutineKind, SensorValueRoutine,
  },
};

const COMMENT_MARKERS: [&str; 3] = ["#", "!", "//"];

// ─── Single-group configuration ──────────────────────────────────────────────

/// The routines of one group, by subject, in configured order.
pub struct RoutineConfiguration<R: ?Sized> {
  source_name: String,
  subjects:    BTreeMap<String, Vec<Arc<R>>>,
}

impl<R: ?Sized> Clone for RoutineConfiguration<R> {
  fn clone(&self) -> Self {
    Self {
      source_name: self.source_name.clone(),
      subjects:    self.subjects.clone(),
    }
  }
}

impl<R: ?Sized> Default for RoutineConfiguration<R> {
  fn default() -> Self {
    Self {
      source_name: String::new(),
      subjects:    BTreeMap::new(),
    }
  }
}

impl<R: ?Sized + fmt::Debug> fmt::Debug for RoutineConfiguration<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RoutineConfiguration")
      .field("source_name", &self.source_name)
      .field("subjects", &self.subjects)
      .finish()
  }
}

impl<R: RoutineKind + ?Sized> RoutineConfiguration<R> {
  /// Load a CSV configuration.
  pub fn from_csv(
    source_name: &str,
    text: &str,
    sensors: &SensorsConfiguration,
  ) -> Result<Self, ConfigError> {
    let mut entries = Vec::new();

    for (index, line) in text.lines().enumerate() {
      let line = line.trim();
      if line.is_empty() || COMMENT_MARKERS.iter().any(|m| line.starts_with(m)) {
        continue;
      }
      let position = Position::Line(index + 1);

      let mut fields = line.split(',').map(str::trim);
      let (Some(name), Some(subject)) = (fields.next(), fields.next()) else {
        return Err(config_error(
          source_name,
          position,
          ConfigErrorKind::Malformed(
            "expected at least a routine name and a subject".into(),
          ),
        ));
      };
      if name.is_empty() || subject.is_empty() {
        return Err(config_error(
          source_name,
          position,
          ConfigErrorKind::Malformed("empty routine name or subject".into()),
        ));
      }

      let definition = RoutineDefinition::new(name).with_parameters(fields);
      entries.push((position, subject.to_string(), definition));
    }

    Self::from_definitions(source_name, entries, sensors)
  }

  /// Load a JSON configuration.
  pub fn from_json(
    source_name: &str,
    text: &str,
    sensors: &SensorsConfiguration,
  ) -> Result<Self, ConfigError> {
    let documents: Vec<Value> = serde_json::from_str(text)
      .map_err(|e| config_error(source_name, Position::Document, e.into()))?;

    let mut entries = Vec::new();
    for (entry_index, document) in documents.into_iter().enumerate() {
      let entry_position = Position::Entry {
        entry:   entry_index,
        routine: None,
      };
      let entry: JsonEntry = serde_json::from_value(document)
        .map_err(|e| config_error(source_name, entry_position, e.into()))?;

      let subject = entry
        .subject(R::GROUP)
        .map_err(|kind| config_error(source_name, entry_position, kind))?;
      check_subject(R::GROUP, &subject, sensors)
        .map_err(|kind| config_error(source_name, entry_position, kind))?;

      for (routine_index, routine) in entry.routines.into_iter().enumerate() {
        let position = Position::Entry {
          entry:   entry_index,
          routine: Some(routine_index),
        };
        let definition = routine
          .into_definition()
          .map_err(|kind| config_error(source_name, position, kind))?;
        entries.push((position, subject.clone(), definition));
      }
    }

    Self::from_definitions(source_name, entries, sensors)
  }

  /// Build every definition, checking subjects and duplicate routines.
  pub fn from_definitions<I>(
    source_name: &str,
    definitions: I,
    sensors: &SensorsConfiguration,
  ) -> Result<Self, ConfigError>
  where
    I: IntoIterator<Item = (Position, String, RoutineDefinition)>,
  {
    let mut subjects: BTreeMap<String, Vec<Arc<R>>> = BTreeMap::new();

    for (position, subject, definition) in definitions {
      let fail = |kind| config_error(source_name, position, kind);

      check_subject(R::GROUP, &subject, sensors).map_err(fail)?;
      let routine = R::build(&definition, sensors).map_err(fail)?;

      let routines = subjects.entry(subject.clone()).or_default();
      if routines.iter().any(|r| r.name() == routine.name()) {
        return Err(fail(ConfigErrorKind::DuplicateRoutine {
          routine: routine.name().to_string(),
          subject,
        }));
      }
      tracing::debug!(
        source = source_name,
        %position,
        routine = routine.name(),
        subject = subject.as_str(),
        "configured routine"
      );
      routines.push(routine);
    }

    let configuration = Self {
      source_name: source_name.to_string(),
      subjects,
    };
    tracing::info!(
      source = source_name,
      group = %R::GROUP,
      subjects = configuration.subjects.len(),
      routines = configuration.routine_count(),
      "loaded routine configuration"
    );
    Ok(configuration)
  }

  /// Routines for `subject` in configured order. An unconfigured subject has
  /// no routines.
  pub fn routines_for(&self, subject: &str) -> &[Arc<R>] {
    self.subjects.get(subject).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Any configured instance of the routine with this serialized name.
  pub fn routine_by_name(&self, name: &str) -> Option<&R> {
    self
      .subjects
      .values()
      .flatten()
      .find(|r| r.name() == name)
      .map(|r| r.as_ref())
  }

  pub fn subjects(&self) -> impl Iterator<Item = (&str, &[Arc<R>])> {
    self
      .subjects
      .iter()
      .map(|(subject, routines)| (subject.as_str(), routines.as_slice()))
  }

  pub fn routine_count(&self) -> usize {
    self.subjects.values().map(Vec::len).sum()
  }

  pub fn source_name(&self) -> &str { &self.source_name }
}

fn config_error(
  source_name: &str,
  position: Position,
  kind: ConfigErrorKind,
) -> ConfigError {
  ConfigError {
    source_name: source_name.to_string(),
    position,
    kind,
  }
}

fn check_subject(
  group: RoutineGroup,
  subject: &str,
  sensors: &SensorsConfiguration,
) -> Result<(), ConfigErrorKind> {
  if group.keyed_by_variable() {
    sensors
      .variable(subject)
      .map(|_| ())
      .ok_or_else(|| ConfigErrorKind::UnknownVariable(subject.to_string()))
  } else {
    sensors
      .sensor_type(subject)
      .map(|_| ())
      .ok_or_else(|| ConfigErrorKind::UnknownSensorType(subject.to_string()))
  }
}

// ─── JSON shapes ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonEntry {
  variable:    Option<String>,
  sensor_type: Option<String>,
  routines:    Vec<JsonRoutine>,
}

impl JsonEntry {
  fn subject(&self, group: RoutineGroup) -> Result<String, ConfigErrorKind> {
    match (&self.variable, &self.sensor_type, group.keyed_by_variable()) {
      (Some(variable), None, true) => Ok(variable.clone()),
      (None, Some(sensor_type), false) => Ok(sensor_type.clone()),
      (_, _, true) => Err(ConfigErrorKind::Malformed(
        "entry must name a \"variable\" only".into(),
      )),
      (_, _, false) => Err(ConfigErrorKind::Malformed(
        "entry must name a \"sensor_type\" only".into(),
      )),
    }
  }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonRoutine {
  name:            String,
  #[serde(default)]
  parameters:      Vec<Value>,
  #[serde(default)]
  options:         Map<String, Value>,
  #[serde(default)]
  flagged_sensors: Vec<String>,
}

impl JsonRoutine {
  fn into_definition(self) -> Result<RoutineDefinition, ConfigErrorKind> {
    let parameters = self
      .parameters
      .into_iter()
      .map(|p| match p {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ConfigErrorKind::Malformed(format!(
          "parameter {other} is not a scalar"
        ))),
      })
      .collect::<Result<Vec<_>, _>>()?;

    Ok(RoutineDefinition {
      name: self.name,
      parameters,
      options: self.options,
      flagged_sensors: self.flagged_sensors,
    })
  }
}

// ─── All groups ──────────────────────────────────────────────────────────────

/// The complete routine configuration of an instrument. Built once at start
/// up and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct QcRoutines {
  pub sensor_values:      RoutineConfiguration<dyn SensorValueRoutine>,
  pub external_standards: RoutineConfiguration<dyn ExternalStandardRoutine>,
  pub data_reduction:     RoutineConfiguration<dyn DataReductionRoutine>,
}

impl QcRoutines {
  /// Short message of the routine with this serialized name.
  pub fn short_message(&self, routine_name: &str) -> Option<&str> {
    match RoutineGroup::of(routine_name)? {
      RoutineGroup::SensorValues => self
        .sensor_values
        .routine_by_name(routine_name)
        .map(|r| r.short_message()),
      RoutineGroup::ExternalStandards => self
        .external_standards
        .routine_by_name(routine_name)
        .map(|r| r.short_message()),
      RoutineGroup::DataReduction => self
        .data_reduction
        .routine_by_name(routine_name)
        .map(|r| r.short_message()),
    }
  }

  /// Long message for `flag` as raised against `column_name`.
  pub fn long_message(
    &self,
    flag: &RoutineFlag,
    column_name: &str,
  ) -> Option<String> {
    let name = flag.routine_name.as_str();
    match RoutineGroup::of(name)? {
      RoutineGroup::SensorValues => self
        .sensor_values
        .routine_by_name(name)
        .map(|r| r.describe(flag, column_name)),
      RoutineGroup::ExternalStandards => self
        .external_standards
        .routine_by_name(name)
        .map(|r| r.describe(flag, column_name)),
      RoutineGroup::DataReduction => self
        .data_reduction
        .routine_by_name(name)
        .map(|r| r.describe(flag, column_name)),
    }
  }

  /// Regenerate the text of a message decoded from a rebuild code.
  pub fn message_text(&self, message: &Message) -> Option<String> {
    let flag = RoutineFlag {
      flag:           message.flag,
      routine_name:   message.message_class.clone(),
      required_value: message.valid_value.clone(),
      actual_value:   message.field_value.clone(),
    };
    self.long_message(&flag, &message.column_name)
  }
}

impl MessageLookup for QcRoutines {
  fn short_message(&self, flag: &RoutineFlag) -> Option<String> {
    QcRoutines::short_message(self, &flag.routine_name).map(str::to_string)
  }

  fn long_message(
    &self,
    flag: &RoutineFlag,
    column_name: &str,
  ) -> Option<String> {
    QcRoutines::long_message(self, flag, column_name)
  }
}

#[cfg(test)]
mod tests {
  use quince_core::{
    Flag,
    message::{Message, decode_rebuild_codes, encode_rebuild_codes},
    sensor::{SensorType, Variable},
  };

  use super::*;

  fn sensors() -> SensorsConfiguration {
    let mut flow = SensorType::new("Water Flow");
    flow.diagnostic = true;
    let mut xco2 = SensorType::new("xCO2");
    xco2.calibrated = true;
    SensorsConfiguration::new(
      vec![SensorType::new("SST"), flow, xco2],
      vec![Variable {
        name:         "Underway pCO2".into(),
        sensor_types: vec!["SST".into(), "xCO2".into()],
      }],
    )
    .unwrap()
  }

  const CSV: &str = "\
# Sensor value routines
! legacy comment
// another comment

RangeCheck, SST, 0, 30, -2, 35
Gradient,SST,0.5
Missing,Water Flow
";

  #[test]
  fn loads_csv_in_order() {
    let config =
      RoutineConfiguration::<dyn SensorValueRoutine>::from_csv("qc.csv", CSV, &sensors())
        .unwrap();
    let names: Vec<&str> =
      config.routines_for("SST").iter().map(|r| r.name()).collect();
    assert_eq!(names, vec![
      "SensorValues.RangeCheckRoutine",
      "SensorValues.GradientRoutine"
    ]);
    assert_eq!(config.routines_for("Water Flow").len(), 1);
    assert_eq!(config.routine_count(), 3);
  }

  #[test]
  fn unconfigured_subject_has_no_routines() {
    let config =
      RoutineConfiguration::<dyn SensorValueRoutine>::from_csv("qc.csv", CSV, &sensors())
        .unwrap();
    assert!(config.routines_for("xCO2").is_empty());
    assert!(config.routines_for("Nonexistent").is_empty());
  }

  #[test]
  fn unknown_sensor_type_fails_the_whole_load() {
    let csv = format!("{CSV}RangeCheck,Flurble,0,1,-1,2\n");
    let err =
      RoutineConfiguration::<dyn SensorValueRoutine>::from_csv("qc.csv", &csv, &sensors())
        .unwrap_err();
    assert_eq!(err.source_name, "qc.csv");
    assert_eq!(err.position, Position::Line(8));
    assert!(matches!(err.kind, ConfigErrorKind::UnknownSensorType(ref s) if s == "Flurble"));
  }

  #[test]
  fn csv_errors_carry_line_numbers() {
    for (csv, line) in [
      ("Flurble,SST,1\n", 1),
      ("# c\nRangeCheck,SST,1,2\n", 2),
      ("\n\nRangeCheck\n", 3),
      ("Gradient,SST,1\nGradient,SST,2\n", 2),
    ] {
      let err =
        RoutineConfiguration::<dyn SensorValueRoutine>::from_csv("qc.csv", csv, &sensors())
          .unwrap_err();
      assert_eq!(err.position, Position::Line(line), "{csv:?}: {err}");
    }
  }

  #[test]
  fn loads_json_data_reduction_routines() {
    let json = r#"[
      {
        "variable": "Underway pCO2",
        "routines": [
          {
            "name": "RangeCheck",
            "options": {"parameter": "fCO2", "min": 100, "max": 600},
            "flagged_sensors": ["xCO2"]
          },
          {"name": "InputDifference", "parameters": ["SST", "xCO2", 5]}
        ]
      }
    ]"#;
    let config =
      RoutineConfiguration::<dyn DataReductionRoutine>::from_json("dr.json", json, &sensors())
        .unwrap();
    let routines = config.routines_for("Underway pCO2");
    assert_eq!(routines.len(), 2);
    assert_eq!(routines[0].flagged_sensors().to_vec(), vec!["xCO2".to_string()]);
  }

  #[test]
  fn json_errors_carry_entry_positions() {
    let unknown_variable = r#"[{"variable": "Flurble", "routines": [{"name": "RangeCheck"}]}]"#;
    let err = RoutineConfiguration::<dyn DataReductionRoutine>::from_json(
      "dr.json",
      unknown_variable,
      &sensors(),
    )
    .unwrap_err();
    assert!(matches!(err.kind, ConfigErrorKind::UnknownVariable(_)));
    assert_eq!(err.position, Position::Entry {
      entry:   0,
      routine: None,
    });

    let bad_flagged = r#"[
      {"variable": "Underway pCO2", "routines": []},
      {"variable": "Underway pCO2", "routines": [
        {"name": "RangeCheck", "parameters": ["fCO2", 0, 1], "flagged_sensors": ["Flurble"]}
      ]}
    ]"#;
    let err = RoutineConfiguration::<dyn DataReductionRoutine>::from_json(
      "dr.json",
      bad_flagged,
      &sensors(),
    )
    .unwrap_err();
    assert_eq!(err.position, Position::Entry {
      entry:   1,
      routine: Some(0),
    });

    let wrong_key = r#"[{"sensor_type": "SST", "routines": []}]"#;
    assert!(
      RoutineConfiguration::<dyn DataReductionRoutine>::from_json("dr.json", wrong_key, &sensors())
        .is_err()
    );

    let err = RoutineConfiguration::<dyn DataReductionRoutine>::from_json(
      "dr.json",
      "{not json",
      &sensors(),
    )
    .unwrap_err();
    assert_eq!(err.position, Position::Document);
  }

  #[test]
  fn unknown_subjects_fail_even_without_routines() {
    let err = RoutineConfiguration::<dyn DataReductionRoutine>::from_json(
      "dr.json",
      r#"[{"variable": "Flurble", "routines": []}]"#,
      &sensors(),
    )
    .unwrap_err();
    assert!(matches!(err.kind, ConfigErrorKind::UnknownVariable(ref v) if v == "Flurble"));
    assert_eq!(err.position, Position::Entry {
      entry:   0,
      routine: None,
    });

    let err = RoutineConfiguration::<dyn SensorValueRoutine>::from_json(
      "qc.json",
      r#"[
        {"sensor_type": "SST", "routines": [{"name": "Missing"}]},
        {"sensor_type": "Flurble", "routines": []}
      ]"#,
      &sensors(),
    )
    .unwrap_err();
    assert!(matches!(err.kind, ConfigErrorKind::UnknownSensorType(ref s) if s == "Flurble"));
    assert_eq!(err.position, Position::Entry {
      entry:   1,
      routine: None,
    });
  }

  #[test]
  fn reloading_is_repeatable() {
    let load = || {
      RoutineConfiguration::<dyn SensorValueRoutine>::from_csv("qc.csv", CSV, &sensors())
        .unwrap()
    };
    let (a, b) = (load(), load());
    assert_eq!(a.routine_count(), b.routine_count());
    assert_eq!(
      a.subjects().map(|(s, _)| s.to_string()).collect::<Vec<_>>(),
      b.subjects().map(|(s, _)| s.to_string()).collect::<Vec<_>>()
    );
  }

  #[test]
  fn messages_are_rebuilt_through_the_configuration() {
    let routines = QcRoutines {
      sensor_values: RoutineConfiguration::from_csv("qc.csv", CSV, &sensors()).unwrap(),
      ..QcRoutines::default()
    };
    let messages = vec![Message {
      message_class: "SensorValues.RangeCheckRoutine".into(),
      line_number:   12,
      column_index:  4,
      column_name:   "SST".into(),
      flag:          Flag::Bad,
      field_value:   Some("40".into()),
      valid_value:   None,
    }];
    let decoded = decode_rebuild_codes(&encode_rebuild_codes(&messages)).unwrap();
    assert_eq!(decoded, messages);
    assert_eq!(
      routines.message_text(&decoded[0]).unwrap(),
      "SST value 40 is outside the range MISSING_VALUE"
    );
    assert_eq!(
      routines.short_message("SensorValues.GradientRoutine"),
      Some("Changes too quickly")
    );
    assert_eq!(routines.short_message("DataReduction.RangeCheckRoutine"), None);
    assert_eq!(routines.short_message("Nowhere.RangeCheckRoutine"), None);
  }
}
