//! Domain models used by the backend: problems, difficulty, the per-user problem set
//! and the append-only attempt history rows.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable user identifier as returned by the identity provider.
pub type UserId = String;

/// Catalog problem identifier.
pub type ProblemId = i64;

/// Difficulty label shared by the catalog rating and the per-user classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Difficulty {
  Easy,
  Medium,
  Hard,
}

impl Difficulty {
  pub fn as_str(&self) -> &'static str {
    match self {
      Difficulty::Easy => "Easy",
      Difficulty::Medium => "Medium",
      Difficulty::Hard => "Hard",
    }
  }
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Difficulty {
  type Err = String;

  /// Case-insensitive; anything else is rejected rather than defaulted.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "easy" => Ok(Difficulty::Easy),
      "medium" => Ok(Difficulty::Medium),
      "hard" => Ok(Difficulty::Hard),
      other => Err(format!("unknown difficulty '{}'", other)),
    }
  }
}

/// Immutable catalog record. Created by import, never mutated, identified by `id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Problem {
  pub id: ProblemId,
  pub title: String,
  pub description: String,
  pub difficulty: Difficulty,
  /// Fraction in [0, 1].
  pub acceptance_rate: f64,
  pub frequency: f64,
  #[serde(default)] pub related_topics: Vec<String>,
  #[serde(default)] pub asked_by_faang: bool,
}

/// Ordered problems assigned to one user for one cycle.
///
/// Order is fixed at assignment time; resuming never reshuffles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProblemSet {
  problems: Vec<Problem>,
}

impl ProblemSet {
  pub fn new(problems: Vec<Problem>) -> Self {
    Self { problems }
  }

  pub fn len(&self) -> usize {
    self.problems.len()
  }

  pub fn is_empty(&self) -> bool {
    self.problems.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<&Problem> {
    self.problems.get(index)
  }

  pub fn iter(&self) -> impl Iterator<Item = &Problem> {
    self.problems.iter()
  }
}

/// One finalized walkthrough attempt. Appended, never updated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
  #[serde(default)] pub id: Option<i64>,
  pub user_id: UserId,
  pub problem_id: ProblemId,
  pub iterations: u32,
  pub user_difficulty: Difficulty,
  pub leetcode_difficulty: Difficulty,
  pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn difficulty_parses_case_insensitively() {
    assert_eq!("easy".parse::<Difficulty>(), Ok(Difficulty::Easy));
    assert_eq!(" MEDIUM ".parse::<Difficulty>(), Ok(Difficulty::Medium));
    assert_eq!("Hard".parse::<Difficulty>(), Ok(Difficulty::Hard));
    assert!("extreme".parse::<Difficulty>().is_err());
  }

  #[test]
  fn problem_set_serializes_as_plain_array() {
    let set = ProblemSet::new(vec![Problem {
      id: 1,
      title: "Two Sum".into(),
      description: "find two numbers".into(),
      difficulty: Difficulty::Easy,
      acceptance_rate: 0.5,
      frequency: 1.0,
      related_topics: vec!["Array".into()],
      asked_by_faang: true,
    }]);
    let json = serde_json::to_string(&set).unwrap();
    assert!(json.starts_with('['));
    let back: ProblemSet = serde_json::from_str(&json).unwrap();
    assert_eq!(back, set);
  }
}
