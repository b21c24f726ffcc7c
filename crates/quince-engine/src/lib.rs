//! The QuinCe QC engine.
//!
//! Runs automatic QC over a dataset's sensor values, cascades diagnostic
//! sensor flags onto the measurements they affect, and re-reduces and
//! re-checks the data-reduction records that read the changed values. All
//! work is in memory over a caller-owned [`Dataset`](quince_core::dataset::Dataset);
//! the caller persists the results.

pub mod auto_qc;
pub mod cascade;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod reduction;

pub use auto_qc::{AutoQcReport, run_auto_qc};
pub use cascade::{CascadeEngine, CascadePlan, SensorValueUpdate, UserFlagChange};
pub use context::QcContext;
pub use diagnostics::DiagnosticQcConfig;
pub use error::{Error, QcFailure, ReductionError, Result};
pub use reduction::{FnReducer, Reducer, ReducerSet, RecordUpdate};
