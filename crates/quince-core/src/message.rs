//! QC messages and their "rebuild code" text form.
//!
//! A rebuild code stores just enough of a message to regenerate its text
//! later:
//!
//! ```text
//! <messageClass>_<line>_<columnIndex>_<columnName>_<flag>_<fieldValue>_<validValue>;
//! ```
//!
//! Codes are concatenated with no separator. Inside text fields, `_`, `;` and
//! `\` are escaped with a backslash. An absent field or valid value is
//! written as an empty field.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, flag::Flag};

/// Placeholder text substituted for template values that were not supplied.
pub const MISSING_VALUE: &str = "MISSING_VALUE";

const FIELD_SEPARATOR: char = '_';
const CODE_TERMINATOR: char = ';';
const ESCAPE: char = '\\';
const FIELD_COUNT: usize = 7;

// ─── Templates ───────────────────────────────────────────────────────────────

/// Values available to a long-message template.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageContext<'a> {
  pub column_name: Option<&'a str>,
  pub field_value: Option<&'a str>,
  pub valid_value: Option<&'a str>,
}

/// Substitute `{column_name}`, `{field_value}` and `{valid_value}` in
/// `template`. Absent values become [`MISSING_VALUE`].
pub fn fill_template(template: &str, context: &MessageContext<'_>) -> String {
  let substitute = |value: Option<&str>| {
    value.filter(|v| !v.is_empty()).unwrap_or(MISSING_VALUE).to_string()
  };
  template
    .replace("{column_name}", &substitute(context.column_name))
    .replace("{field_value}", &substitute(context.field_value))
    .replace("{valid_value}", &substitute(context.valid_value))
}

// ─── Message ─────────────────────────────────────────────────────────────────

/// A message attached to one column of one line of a data file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  /// Namespaced routine name that produced the message.
  pub message_class: String,
  pub line_number:   i64,
  pub column_index:  i32,
  pub column_name:   String,
  pub flag:          Flag,
  pub field_value:   Option<String>,
  pub valid_value:   Option<String>,
}

impl Message {
  /// The template context for this message.
  pub fn context(&self) -> MessageContext<'_> {
    MessageContext {
      column_name: Some(&self.column_name),
      field_value: self.field_value.as_deref(),
      valid_value: self.valid_value.as_deref(),
    }
  }

  /// This message as a single semicolon-terminated rebuild code.
  pub fn rebuild_code(&self) -> String {
    let mut code = String::new();
    escape_into(&mut code, &self.message_class);
    code.push(FIELD_SEPARATOR);
    code.push_str(&self.line_number.to_string());
    code.push(FIELD_SEPARATOR);
    code.push_str(&self.column_index.to_string());
    code.push(FIELD_SEPARATOR);
    escape_into(&mut code, &self.column_name);
    code.push(FIELD_SEPARATOR);
    code.push_str(&self.flag.code().to_string());
    code.push(FIELD_SEPARATOR);
    escape_into(&mut code, self.field_value.as_deref().unwrap_or(""));
    code.push(FIELD_SEPARATOR);
    escape_into(&mut code, self.valid_value.as_deref().unwrap_or(""));
    code.push(CODE_TERMINATOR);
    code
  }
}

/// Concatenate the rebuild codes of `messages`.
pub fn encode_rebuild_codes(messages: &[Message]) -> String {
  messages.iter().map(Message::rebuild_code).collect()
}

/// Parse a string of concatenated rebuild codes.
pub fn decode_rebuild_codes(codes: &str) -> Result<Vec<Message>> {
  let mut messages = Vec::new();
  let mut fields: Vec<String> = Vec::with_capacity(FIELD_COUNT);
  let mut current = String::new();
  let mut raw = String::new();
  let mut chars = codes.chars();

  while let Some(c) = chars.next() {
    raw.push(c);
    match c {
      ESCAPE => match chars.next() {
        Some(escaped) => {
          raw.push(escaped);
          current.push(escaped);
        }
        None => return Err(malformed(&raw, "dangling escape")),
      },
      FIELD_SEPARATOR => fields.push(std::mem::take(&mut current)),
      CODE_TERMINATOR => {
        fields.push(std::mem::take(&mut current));
        messages.push(message_from_fields(&raw, std::mem::take(&mut fields))?);
        raw.clear();
      }
      _ => current.push(c),
    }
  }

  if !raw.is_empty() {
    return Err(malformed(&raw, "missing terminating ';'"));
  }

  Ok(messages)
}

fn message_from_fields(raw: &str, fields: Vec<String>) -> Result<Message> {
  let fields: [String; FIELD_COUNT] = fields
    .try_into()
    .map_err(|_| malformed(raw, "expected 7 fields"))?;
  let [
    class,
    line,
    column_index,
    column_name,
    flag,
    field_value,
    valid_value,
  ] = fields;

  let line_number = line
    .parse()
    .map_err(|_| malformed(raw, "line number is not an integer"))?;
  let column_index = column_index
    .parse()
    .map_err(|_| malformed(raw, "column index is not an integer"))?;
  let flag_code: i32 = flag
    .parse()
    .map_err(|_| malformed(raw, "flag is not an integer"))?;
  let flag = Flag::try_from(flag_code)?;

  Ok(Message {
    message_class: class,
    line_number,
    column_index,
    column_name,
    flag,
    field_value: (!field_value.is_empty()).then_some(field_value),
    valid_value: (!valid_value.is_empty()).then_some(valid_value),
  })
}

fn escape_into(out: &mut String, text: &str) {
  for c in text.chars() {
    if matches!(c, FIELD_SEPARATOR | CODE_TERMINATOR | ESCAPE) {
      out.push(ESCAPE);
    }
    out.push(c);
  }
}

fn malformed(code: &str, reason: &str) -> Error {
  Error::MalformedRebuildCode {
    code:   code.to_string(),
    reason: reason.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn message(class: &str, field: Option<&str>, valid: Option<&str>) -> Message {
    Message {
      message_class: class.to_string(),
      line_number:   42,
      column_index:  3,
      column_name:   "Intake_Temp; (°C)".to_string(),
      flag:          Flag::Questionable,
      field_value:   field.map(str::to_string),
      valid_value:   valid.map(str::to_string),
    }
  }

  #[test]
  fn encodes_expected_layout() {
    let m = Message {
      message_class: "SensorValues.RangeCheckRoutine".to_string(),
      line_number:   7,
      column_index:  2,
      column_name:   "SST".to_string(),
      flag:          Flag::Bad,
      field_value:   Some("41.2".to_string()),
      valid_value:   Some("-2:35".to_string()),
    };
    assert_eq!(
      m.rebuild_code(),
      "SensorValues.RangeCheckRoutine_7_2_SST_4_41.2_-2:35;"
    );
  }

  #[test]
  fn multiple_messages_survive_encoding() {
    let messages = vec![
      message("SensorValues.RangeCheckRoutine", Some("1_000"), Some("<5;")),
      message("DataReduction.RangeCheckRoutine", None, None),
      message("ExternalStandards.StandardOffsetRoutine", Some("a\\b"), None),
    ];
    let codes = encode_rebuild_codes(&messages);
    assert_eq!(decode_rebuild_codes(&codes).unwrap(), messages);
  }

  #[test]
  fn empty_input_decodes_to_nothing() {
    assert!(decode_rebuild_codes("").unwrap().is_empty());
  }

  #[test]
  fn malformed_codes_are_rejected() {
    for bad in [
      "Routine_1_2_col_4_a_b",
      "Routine_1_2_col_4_a;",
      "Routine_x_2_col_4_a_b;",
      "Routine_1_2_col_9_a_b;",
      "Routine_1_2_col_4_a_b\\",
    ] {
      assert!(decode_rebuild_codes(bad).is_err(), "{bad}");
    }
  }

  #[test]
  fn templates_substitute_missing_values() {
    let filled = fill_template(
      "{column_name} value {field_value} outside {valid_value}",
      &MessageContext {
        column_name: Some("SST"),
        field_value: Some("40"),
        valid_value: None,
      },
    );
    assert_eq!(filled, "SST value 40 outside MISSING_VALUE");
  }
}
