//! QC routines and their configuration.
//!
//! Routines come in three groups: sensor value routines check the readings
//! of a single sensor type, external standard routines check readings taken
//! while a calibration gas was flowing, and data reduction routines check
//! calculated records. Each group is configured separately, from CSV or JSON,
//! into a [`RoutineConfiguration`].

pub mod config;
pub mod data_reduction;
pub mod definition;
pub mod error;
pub mod external_standards;
pub mod registry;
pub mod routine;
pub mod sensor_values;
mod stats;

pub use config::{QcRoutines, RoutineConfiguration};
pub use definition::RoutineDefinition;
pub use error::{ConfigError, ConfigErrorKind, Error, Position, Result, RoutineError};
pub use routine::{
  DataReductionRoutine, ExternalStandardRoutine, Routine, RoutineGroup,
  RoutineKind, SensorValueRoutine,
};
