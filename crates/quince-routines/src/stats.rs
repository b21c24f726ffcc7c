//! Small statistics helpers shared by routines.

/// Mean and population standard deviation, or `None` for an empty slice.
pub(crate) fn mean_and_stdev(values: &[f64]) -> Option<(f64, f64)> {
  if values.is_empty() {
    return None;
  }
  let n = values.len() as f64;
  let mean = values.iter().sum::<f64>() / n;
  let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
  Some((mean, variance.sqrt()))
}

/// Format a number for a message without trailing noise.
pub(crate) fn format_number(value: f64) -> String {
  let rounded = (value * 1000.0).round() / 1000.0;
  rounded.to_string()
}
