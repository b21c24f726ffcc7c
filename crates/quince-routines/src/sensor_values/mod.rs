//! Automatic QC routines run against the raw values of one sensor type.

mod constant_value;
mod gradient;
mod missing;
mod outlier;
mod range_check;

pub use constant_value::ConstantValueRoutine;
pub use gradient::GradientRoutine;
pub use missing::MissingRoutine;
pub use outlier::OutlierRoutine;
pub use range_check::RangeCheckRoutine;

use quince_core::value::SensorValue;

/// Whether a routine can check `value`: it has no number, or a finite one.
/// NaN and infinite readings are left to the caller to report.
pub fn is_checkable(value: &SensorValue) -> bool {
  value.value.is_none_or(f64::is_finite)
}

/// The finite numeric value of `value`, if any.
pub(crate) fn finite_value(value: &SensorValue) -> Option<f64> {
  value.value.filter(|v| v.is_finite())
}

/// `(value, number)` for every value in `series` with a finite number.
pub(crate) fn numeric_values<'a>(
  series: &[&'a SensorValue],
) -> Vec<(&'a SensorValue, f64)> {
  series
    .iter()
    .filter_map(|value| finite_value(value).map(|v| (*value, v)))
    .collect()
}
