//! QC flags and their significance lattice.
//!
//! A flag's numeric code is what gets stored and exported. Conflicts between
//! flags are never settled by comparing codes; they are settled by the
//! separate significance table below, where e.g. `Flushing` outranks `Bad`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::{Error, Result};

/// WOCE value used for flags with no WOCE equivalent.
pub const NO_WOCE_VALUE: i32 = -1;

/// One of the fixed QC states a value can be in.
///
/// Two flags are equal iff their codes are equal; `Good` and `AssumedGood`
/// share a significance but are different flags.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize,
  Deserialize,
)]
#[serde(try_from = "i32", into = "i32")]
#[repr(i32)]
pub enum Flag {
  #[strum(to_string = "No QC")]
  NoQc          = 0,
  #[strum(to_string = "Not Calibrated")]
  NotCalibrated = 1,
  #[strum(to_string = "Good")]
  Good          = 2,
  #[strum(to_string = "Assumed Good")]
  AssumedGood   = -2,
  #[strum(to_string = "Questionable")]
  Questionable  = 3,
  #[strum(to_string = "Bad")]
  Bad           = 4,
  #[strum(to_string = "Needed")]
  Needed        = -10,
  #[strum(to_string = "Flushing")]
  Flushing      = -100,
  #[strum(to_string = "Lookup")]
  Lookup        = -200,
}

impl Flag {
  /// The numeric code stored for this flag.
  pub const fn code(self) -> i32 { self as i32 }

  /// Position in the conflict-resolution order. Higher wins.
  pub const fn significance(self) -> u8 {
    match self {
      Self::Flushing => 70,
      Self::Lookup => 60,
      Self::Needed => 50,
      Self::NoQc => 40,
      Self::Bad => 30,
      Self::Questionable => 20,
      Self::NotCalibrated => 10,
      Self::Good | Self::AssumedGood => 0,
    }
  }

  pub fn cmp_significance(self, other: Flag) -> Ordering {
    self.significance().cmp(&other.significance())
  }

  pub fn more_significant_than(self, other: Flag) -> bool {
    self.cmp_significance(other) == Ordering::Greater
  }

  pub fn less_significant_than(self, other: Flag) -> bool {
    self.cmp_significance(other) == Ordering::Less
  }

  pub fn equal_significance(self, other: Flag) -> bool {
    self.cmp_significance(other) == Ordering::Equal
  }

  /// `Good` and `AssumedGood`; the sign of the code carries no meaning here.
  pub fn is_good(self) -> bool { self.code().abs() == 2 }

  /// Whether a user must supply a comment when setting this flag.
  pub fn comment_required(self) -> bool {
    matches!(self, Self::Questionable | Self::Bad | Self::Lookup)
  }

  /// WOCE equivalent of this flag, or [`NO_WOCE_VALUE`].
  pub fn woce_value(self) -> i32 { Self::woce_value_of(self.code()) }

  /// WOCE equivalent of a raw flag code. Unknown codes map to
  /// [`NO_WOCE_VALUE`] rather than failing.
  pub fn woce_value_of(code: i32) -> i32 {
    match code {
      1 => 1,
      2 | -2 => 2,
      3 => 3,
      4 => 4,
      _ => NO_WOCE_VALUE,
    }
  }

  /// Single-character mnemonic, the inverse of [`Flag::from_char`].
  pub fn as_char(self) -> char {
    match self {
      Self::NoQc => 'N',
      Self::NotCalibrated => 'C',
      Self::Good => 'G',
      Self::AssumedGood => 'A',
      Self::Questionable => 'Q',
      Self::Bad => 'B',
      Self::Needed => 'D',
      Self::Flushing => 'F',
      Self::Lookup => 'L',
    }
  }

  /// Parse a single-character mnemonic (case-insensitive).
  pub fn from_char(c: char) -> Result<Flag> {
    match c.to_ascii_uppercase() {
      'N' => Ok(Self::NoQc),
      'C' => Ok(Self::NotCalibrated),
      'G' => Ok(Self::Good),
      'A' => Ok(Self::AssumedGood),
      'Q' => Ok(Self::Questionable),
      'B' => Ok(Self::Bad),
      'D' => Ok(Self::Needed),
      'F' => Ok(Self::Flushing),
      'L' => Ok(Self::Lookup),
      _ => Err(Error::InvalidFlagChar(c)),
    }
  }

  /// The most significant of `flags`, skipping absent entries.
  ///
  /// Returns `None` for an empty input. When `Good` and `AssumedGood` tie,
  /// `Good` is returned regardless of order.
  pub fn most_significant<I>(flags: I) -> Option<Flag>
  where
    I: IntoIterator,
    I::Item: Into<Option<Flag>>,
  {
    flags
      .into_iter()
      .filter_map(|f| Into::<Option<Flag>>::into(f))
      .fold(None::<Flag>, |best, flag| match best {
        None => Some(flag),
        Some(current) if flag.more_significant_than(current) => Some(flag),
        Some(current)
          if flag.equal_significance(current) && flag == Self::Good =>
        {
          Some(flag)
        }
        keep => keep,
      })
  }

  /// True if any flag in `flags` is strictly more significant than
  /// `reference`.
  pub fn contains_worse_flag<I>(flags: I, reference: Flag) -> bool
  where
    I: IntoIterator<Item = Flag>,
  {
    flags.into_iter().any(|f| f.more_significant_than(reference))
  }
}

impl TryFrom<i32> for Flag {
  type Error = Error;

  fn try_from(code: i32) -> Result<Self> {
    match code {
      0 => Ok(Self::NoQc),
      1 => Ok(Self::NotCalibrated),
      2 => Ok(Self::Good),
      -2 => Ok(Self::AssumedGood),
      3 => Ok(Self::Questionable),
      4 => Ok(Self::Bad),
      -10 => Ok(Self::Needed),
      -100 => Ok(Self::Flushing),
      -200 => Ok(Self::Lookup),
      other => Err(Error::InvalidFlag(other)),
    }
  }
}

impl From<Flag> for i32 {
  fn from(flag: Flag) -> Self { flag.code() }
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator;

  use super::*;

  const VALID_CODES: [i32; 9] = [-200, -100, -10, -2, 0, 1, 2, 3, 4];

  #[test]
  fn valid_codes_round_trip() {
    for code in VALID_CODES {
      let flag = Flag::try_from(code).unwrap();
      assert_eq!(flag.code(), code);
      assert_eq!(i32::from(flag), code);
    }
  }

  #[test]
  fn invalid_codes_are_rejected() {
    for code in [-201, -99, -3, -1, 5, 6, 100, i32::MIN, i32::MAX] {
      assert!(matches!(Flag::try_from(code), Err(Error::InvalidFlag(c)) if c == code));
    }
  }

  #[test]
  fn significance_is_a_total_order() {
    for a in Flag::iter() {
      for b in Flag::iter() {
        let held = [
          a.more_significant_than(b),
          b.more_significant_than(a),
          a.equal_significance(b),
        ];
        assert_eq!(held.iter().filter(|h| **h).count(), 1, "{a} vs {b}");
        assert_eq!(a.less_significant_than(b), b.more_significant_than(a));
      }
    }
  }

  #[test]
  fn significance_order_is_not_code_order() {
    assert!(Flag::Flushing.more_significant_than(Flag::Lookup));
    assert!(Flag::Lookup.more_significant_than(Flag::Needed));
    assert!(Flag::Needed.more_significant_than(Flag::NoQc));
    assert!(Flag::NoQc.more_significant_than(Flag::Bad));
    assert!(Flag::Bad.more_significant_than(Flag::Questionable));
    assert!(Flag::Questionable.more_significant_than(Flag::NotCalibrated));
    assert!(Flag::NotCalibrated.more_significant_than(Flag::Good));
  }

  #[test]
  fn good_and_assumed_good_share_significance_only() {
    assert!(Flag::Good.equal_significance(Flag::AssumedGood));
    assert_ne!(Flag::Good, Flag::AssumedGood);
    assert!(Flag::Good.is_good());
    assert!(Flag::AssumedGood.is_good());
    assert!(!Flag::Questionable.is_good());
  }

  #[test]
  fn most_significant_handles_empty_and_absent() {
    assert_eq!(Flag::most_significant(Vec::<Flag>::new()), None);
    assert_eq!(
      Flag::most_significant([Flag::Questionable, Flag::Bad, Flag::Good]),
      Some(Flag::Bad)
    );
    assert_eq!(
      Flag::most_significant([Some(Flag::Questionable), None, Some(Flag::Good)]),
      Some(Flag::Questionable)
    );
    assert_eq!(Flag::most_significant([None::<Flag>, None]), None);
  }

  #[test]
  fn most_significant_prefers_good_on_tie() {
    assert_eq!(
      Flag::most_significant([Flag::AssumedGood, Flag::Good]),
      Some(Flag::Good)
    );
    assert_eq!(
      Flag::most_significant([Flag::Good, Flag::AssumedGood]),
      Some(Flag::Good)
    );
  }

  #[test]
  fn woce_mapping() {
    assert_eq!(Flag::NotCalibrated.woce_value(), 1);
    assert_eq!(Flag::Good.woce_value(), 2);
    assert_eq!(Flag::AssumedGood.woce_value(), 2);
    assert_eq!(Flag::Questionable.woce_value(), 3);
    assert_eq!(Flag::Bad.woce_value(), 4);
    for flag in [Flag::Needed, Flag::Flushing, Flag::Lookup, Flag::NoQc] {
      assert_eq!(flag.woce_value(), NO_WOCE_VALUE);
    }
    assert_eq!(Flag::woce_value_of(17), NO_WOCE_VALUE);
  }

  #[test]
  fn comment_required_flags() {
    let required: Vec<Flag> =
      Flag::iter().filter(|f| f.comment_required()).collect();
    assert_eq!(required, vec![Flag::Questionable, Flag::Bad, Flag::Lookup]);
  }

  #[test]
  fn chars_round_trip() {
    for flag in Flag::iter() {
      assert_eq!(Flag::from_char(flag.as_char()).unwrap(), flag);
      assert_eq!(
        Flag::from_char(flag.as_char().to_ascii_lowercase()).unwrap(),
        flag
      );
    }
    assert!(matches!(Flag::from_char('X'), Err(Error::InvalidFlagChar('X'))));
  }

  #[test]
  fn contains_worse_flag() {
    let flags = [Flag::Good, Flag::Questionable];
    assert!(Flag::contains_worse_flag(flags, Flag::Good));
    assert!(!Flag::contains_worse_flag(flags, Flag::Questionable));
    assert!(!Flag::contains_worse_flag([], Flag::Good));
  }

  #[test]
  fn serializes_as_bare_code() {
    assert_eq!(serde_json::to_string(&Flag::Flushing).unwrap(), "-100");
    let flag: Flag = serde_json::from_str("3").unwrap();
    assert_eq!(flag, Flag::Questionable);
    assert!(serde_json::from_str::<Flag>("7").is_err());
  }

  #[test]
  fn display_text() {
    assert_eq!(Flag::AssumedGood.to_string(), "Assumed Good");
    assert_eq!(Flag::NoQc.to_string(), "No QC");
  }
}
