//! Error types for `quince-engine`.

use quince_core::value::ValueId;
use quince_routines::RoutineError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] quince_core::Error),

  #[error(transparent)]
  Routines(#[from] quince_routines::Error),

  #[error("unknown sensor type {0:?}")]
  UnknownSensorType(String),

  #[error("sensor type {0:?} is not a diagnostic sensor")]
  NotDiagnostic(String),

  #[error("unknown variable {0:?}")]
  UnknownVariable(String),

  #[error("sensor value {0} not found")]
  ValueNotFound(ValueId),

  #[error("flag {flag} on sensor value {value_id} requires a comment")]
  CommentRequired { value_id: ValueId, flag: quince_core::Flag },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

/// A reducer could not calculate a record's parameters.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ReductionError(pub String);

/// A failure scoped to one sensor type or record. Reported alongside the
/// results; other values carry on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QcFailure {
  /// Sensor type or variable being checked.
  pub subject: String,
  /// Routine name, or "reduction" for a reducer failure.
  pub source:  String,
  pub reason:  String,
}

impl QcFailure {
  pub(crate) fn routine(subject: &str, error: RoutineError) -> Self {
    Self {
      subject: subject.to_string(),
      source:  error.routine,
      reason:  error.reason,
    }
  }

  pub(crate) fn reduction(subject: &str, reason: impl Into<String>) -> Self {
    Self {
      subject: subject.to_string(),
      source:  "reduction".to_string(),
      reason:  reason.into(),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
