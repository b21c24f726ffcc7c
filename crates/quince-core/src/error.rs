//! Error types for `quince-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid flag value: {0}")]
  InvalidFlag(i32),

  #[error("invalid flag character: {0:?}")]
  InvalidFlagChar(char),

  #[error("cannot resolve run type category for {0:?}")]
  RunTypeCategory(String),

  #[error("circular run type alias: {}", .0.join(" -> "))]
  CircularAlias(Vec<String>),

  #[error("malformed rebuild code {code:?}: {reason}")]
  MalformedRebuildCode { code: String, reason: String },

  #[error("duplicate sensor type: {0:?}")]
  DuplicateSensorType(String),

  #[error("duplicate variable: {0:?}")]
  DuplicateVariable(String),

  #[error("variable {variable:?} requires unknown sensor type {sensor_type:?}")]
  UnknownVariableInput {
    variable:    String,
    sensor_type: String,
  },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
