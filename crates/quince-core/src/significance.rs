//! Combining several candidate flags for one value into a single result.

use serde::{Deserialize, Serialize};

use crate::flag::Flag;

/// The outcome of resolving a set of candidate flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
  pub flag:     Flag,
  /// Distinct messages of every candidate as significant as `flag`, in the
  /// order they were first seen.
  pub messages: Vec<String>,
}

/// Pick the most significant of `candidates` and merge the messages of all
/// candidates that tie with it. Messages of less significant candidates are
/// dropped. Returns `None` when there are no candidates.
pub fn resolve<I, M>(candidates: I) -> Option<Resolution>
where
  I: IntoIterator<Item = (Flag, M)>,
  M: IntoIterator<Item = String>,
{
  let candidates: Vec<(Flag, M)> = candidates.into_iter().collect();
  let flag = Flag::most_significant(candidates.iter().map(|(f, _)| *f))?;

  let mut messages: Vec<String> = Vec::new();
  for (candidate, candidate_messages) in candidates {
    if !candidate.equal_significance(flag) {
      continue;
    }
    for message in candidate_messages {
      if !message.is_empty() && !messages.contains(&message) {
        messages.push(message);
      }
    }
  }

  Some(Resolution { flag, messages })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn msgs(m: &[&str]) -> Vec<String> {
    m.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn empty_input_has_no_resolution() {
    assert_eq!(resolve(Vec::<(Flag, Vec<String>)>::new()), None);
  }

  #[test]
  fn less_significant_messages_are_dropped() {
    let r = resolve(vec![
      (Flag::Questionable, msgs(&["gradient"])),
      (Flag::Bad, msgs(&["out of range"])),
      (Flag::Bad, msgs(&["flow bad", "out of range"])),
    ])
    .unwrap();
    assert_eq!(r.flag, Flag::Bad);
    assert_eq!(r.messages, msgs(&["out of range", "flow bad"]));
  }

  #[test]
  fn good_ties_merge_messages_and_prefer_good() {
    let r = resolve(vec![
      (Flag::AssumedGood, msgs(&["a"])),
      (Flag::Good, msgs(&["b"])),
    ])
    .unwrap();
    assert_eq!(r.flag, Flag::Good);
    assert_eq!(r.messages, msgs(&["a", "b"]));
  }

  #[test]
  fn empty_messages_are_skipped() {
    let r = resolve(vec![(Flag::Good, msgs(&[""]))]).unwrap();
    assert!(r.messages.is_empty());
  }
}
