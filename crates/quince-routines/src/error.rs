//! Error types for routine configuration and routine execution.

use std::fmt;

use thiserror::Error;

/// Where in a configuration source an error was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
  /// 1-based line of a CSV file.
  Line(usize),
  /// 0-based entry, and routine within it, of a JSON file.
  Entry { entry: usize, routine: Option<usize> },
  /// The source as a whole (e.g. unparseable JSON).
  Document,
}

impl fmt::Display for Position {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Line(line) => write!(f, "line {line}"),
      Self::Entry {
        entry,
        routine: Some(routine),
      } => write!(f, "entry {entry}, routine {routine}"),
      Self::Entry {
        entry,
        routine: None,
      } => write!(f, "entry {entry}"),
      Self::Document => write!(f, "document"),
    }
  }
}

/// What was wrong with a configuration entry.
#[derive(Debug, Error)]
pub enum ConfigErrorKind {
  #[error("unknown routine {0:?}")]
  UnknownRoutine(String),

  #[error("{routine}: expected {expected} parameters, got {actual}")]
  WrongParameterCount {
    routine:  String,
    expected: usize,
    actual:   usize,
  },

  #[error("{routine}: missing argument {name:?}")]
  MissingArgument { routine: String, name: String },

  #[error("{routine}: invalid {name:?}: {reason}")]
  InvalidArgument {
    routine: String,
    name:    String,
    reason:  String,
  },

  #[error("unknown sensor type {0:?}")]
  UnknownSensorType(String),

  #[error("unknown variable {0:?}")]
  UnknownVariable(String),

  #[error("routine {routine:?} configured more than once for {subject:?}")]
  DuplicateRoutine { routine: String, subject: String },

  #[error("malformed entry: {0}")]
  Malformed(String),

  #[error("invalid JSON: {0}")]
  Json(#[from] serde_json::Error),
}

/// A fatal routine configuration error. The whole load is rejected.
#[derive(Debug, Error)]
#[error("{source_name} ({position}): {kind}")]
pub struct ConfigError {
  pub source_name: String,
  pub position:    Position,
  #[source]
  pub kind:        ConfigErrorKind,
}

/// A routine failed while checking values.
#[derive(Debug, Error)]
#[error("{routine}: {reason}")]
pub struct RoutineError {
  pub routine: String,
  pub reason:  String,
}

impl RoutineError {
  pub fn new(routine: impl Into<String>, reason: impl Into<String>) -> Self {
    Self {
      routine: routine.into(),
      reason:  reason.into(),
    }
  }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Routine(#[from] RoutineError),

  #[error("core error: {0}")]
  Core(#[from] quince_core::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
