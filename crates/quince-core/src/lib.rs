//! Core types for QuinCe quality control.
//!
//! Flags and their significance order, routine-annotated flags, QC messages,
//! sensor values, data-reduction records and run types. This crate does no
//! I/O; the routine framework and the QC engine build on it.

pub mod dataset;
pub mod error;
pub mod flag;
pub mod message;
pub mod routine_flag;
pub mod run_type;
pub mod sensor;
pub mod significance;
pub mod value;

pub use error::{Error, Result};
pub use flag::Flag;
