//! One configured routine before it is built, plus helpers that routines
//! use to read and validate their arguments.
//!
//! An argument may be given positionally (`parameters`) or by name
//! (`options`); positional values win.

use quince_core::{Flag, sensor::SensorsConfiguration};
use serde_json::{Map, Value};

use crate::error::ConfigErrorKind;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutineDefinition {
  /// Short name, e.g. `RangeCheck`.
  pub name:            String,
  pub parameters:      Vec<String>,
  pub options:         Map<String, Value>,
  pub flagged_sensors: Vec<String>,
}

impl RoutineDefinition {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Self::default()
    }
  }

  pub fn with_parameters<I, S>(mut self, parameters: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.parameters = parameters.into_iter().map(Into::into).collect();
    self
  }
}

/// Reads the arguments of one definition on behalf of one routine.
pub(crate) struct Arguments<'a> {
  routine:    String,
  definition: &'a RoutineDefinition,
  names:      &'a [&'a str],
}

impl<'a> Arguments<'a> {
  /// Check the positional arity. `names` lists every argument in positional
  /// order; the first `required` of them must be supplied one way or another.
  pub(crate) fn new(
    routine: &str,
    definition: &'a RoutineDefinition,
    names: &'a [&'a str],
    required: usize,
  ) -> Result<Self, ConfigErrorKind> {
    let given = definition.parameters.len();
    if given > names.len() {
      return Err(ConfigErrorKind::WrongParameterCount {
        routine:  routine.to_string(),
        expected: names.len(),
        actual:   given,
      });
    }

    for name in names.iter().take(required).skip(given) {
      if definition.options.contains_key(*name) {
        continue;
      }
      return Err(if given > 0 {
        ConfigErrorKind::WrongParameterCount {
          routine:  routine.to_string(),
          expected: required,
          actual:   given,
        }
      } else {
        ConfigErrorKind::MissingArgument {
          routine: routine.to_string(),
          name:    name.to_string(),
        }
      });
    }

    Ok(Self {
      routine: routine.to_string(),
      definition,
      names,
    })
  }

  fn position(&self, name: &str) -> Option<usize> {
    self.names.iter().position(|n| *n == name)
  }

  /// The raw text of an argument, if supplied.
  pub(crate) fn text(&self, name: &str) -> Result<Option<String>, ConfigErrorKind> {
    if let Some(value) = self
      .position(name)
      .and_then(|i| self.definition.parameters.get(i))
    {
      return Ok(Some(value.trim().to_string()));
    }
    match self.definition.options.get(name) {
      None | Some(Value::Null) => Ok(None),
      Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
      Some(Value::Number(n)) => Ok(Some(n.to_string())),
      Some(Value::Bool(b)) => Ok(Some(b.to_string())),
      Some(_) => Err(self.invalid(name, "expected a scalar value")),
    }
  }

  pub(crate) fn required_text(&self, name: &str) -> Result<String, ConfigErrorKind> {
    self
      .text(name)?
      .filter(|t| !t.is_empty())
      .ok_or_else(|| ConfigErrorKind::MissingArgument {
        routine: self.routine.clone(),
        name:    name.to_string(),
      })
  }

  /// A required, finite number.
  pub(crate) fn number(&self, name: &str) -> Result<f64, ConfigErrorKind> {
    let text = self.required_text(name)?;
    let value: f64 = text
      .parse()
      .map_err(|_| self.invalid(name, &format!("{text:?} is not a number")))?;
    if !value.is_finite() {
      return Err(self.invalid(name, "must be finite"));
    }
    Ok(value)
  }

  /// A required number that must be strictly positive.
  pub(crate) fn positive_number(&self, name: &str) -> Result<f64, ConfigErrorKind> {
    let value = self.number(name)?;
    if value <= 0.0 {
      return Err(self.invalid(name, "must be greater than zero"));
    }
    Ok(value)
  }

  /// An optional flag argument restricted to `Questionable` or `Bad`, given
  /// as a mnemonic character or a numeric code.
  pub(crate) fn flag(&self, name: &str, default: Flag) -> Result<Flag, ConfigErrorKind> {
    let Some(text) = self.text(name)?.filter(|t| !t.is_empty()) else {
      return Ok(default);
    };
    let flag = match text.parse::<i32>() {
      Ok(code) => Flag::try_from(code),
      Err(_) => {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
          (Some(c), None) => Flag::from_char(c),
          _ => return Err(self.invalid(name, &format!("{text:?} is not a flag"))),
        }
      }
    }
    .map_err(|e| self.invalid(name, &e.to_string()))?;

    if !matches!(flag, Flag::Questionable | Flag::Bad) {
      return Err(self.invalid(name, "must be Questionable or Bad"));
    }
    Ok(flag)
  }

  /// A required sensor type name that must exist in `sensors`.
  pub(crate) fn sensor_type(
    &self,
    name: &str,
    sensors: &SensorsConfiguration,
  ) -> Result<String, ConfigErrorKind> {
    let sensor_type = self.required_text(name)?;
    if sensors.sensor_type(&sensor_type).is_none() {
      return Err(ConfigErrorKind::UnknownSensorType(sensor_type));
    }
    Ok(sensor_type)
  }

  pub(crate) fn invalid(&self, name: &str, reason: &str) -> ConfigErrorKind {
    ConfigErrorKind::InvalidArgument {
      routine: self.routine.clone(),
      name:    name.to_string(),
      reason:  reason.to_string(),
    }
  }
}
