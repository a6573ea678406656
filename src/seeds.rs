//! Built-in starter problems so an empty catalog is still usable.

use tracing::info;

use crate::domain::{Difficulty, Problem};
use crate::error::StoreError;
use crate::store::Catalog;

pub fn seed_problems() -> Vec<Problem> {
  vec![
    Problem {
      id: 1,
      title: "Two Sum".into(),
      description: "Given an array of integers nums and an integer target, return indices of the two numbers such that they add up to target. Each input has exactly one solution and the same element may not be used twice.".into(),
      difficulty: Difficulty::Easy,
      acceptance_rate: 0.51,
      frequency: 1.0,
      related_topics: vec!["Array".into(), "Hash Table".into()],
      asked_by_faang: true,
    },
    Problem {
      id: 20,
      title: "Valid Parentheses".into(),
      description: "Given a string containing just the characters '(', ')', '{', '}', '[' and ']', determine if the input string is valid: brackets close in the correct order and every closing bracket has a matching opening bracket.".into(),
      difficulty: Difficulty::Easy,
      acceptance_rate: 0.40,
      frequency: 0.9,
      related_topics: vec!["String".into(), "Stack".into()],
      asked_by_faang: true,
    },
    Problem {
      id: 3,
      title: "Longest Substring Without Repeating Characters".into(),
      description: "Given a string s, find the length of the longest substring without repeating characters.".into(),
      difficulty: Difficulty::Medium,
      acceptance_rate: 0.34,
      frequency: 0.95,
      related_topics: vec!["Hash Table".into(), "String".into(), "Sliding Window".into()],
      asked_by_faang: true,
    },
    Problem {
      id: 146,
      title: "LRU Cache".into(),
      description: "Design a data structure that follows the constraints of a Least Recently Used cache with O(1) get and put.".into(),
      difficulty: Difficulty::Medium,
      acceptance_rate: 0.42,
      frequency: 0.8,
      related_topics: vec!["Hash Table".into(), "Linked List".into(), "Design".into()],
      asked_by_faang: true,
    },
    Problem {
      id: 42,
      title: "Trapping Rain Water".into(),
      description: "Given n non-negative integers representing an elevation map where the width of each bar is 1, compute how much water it can trap after raining.".into(),
      difficulty: Difficulty::Hard,
      acceptance_rate: 0.60,
      frequency: 0.85,
      related_topics: vec!["Array".into(), "Two Pointers".into(), "Stack".into()],
      asked_by_faang: true,
    },
  ]
}

/// Insert the starter problems only when the catalog is empty.
pub async fn seed_if_empty(catalog: &dyn Catalog) -> Result<usize, StoreError> {
  if catalog.problem_count().await? > 0 {
    return Ok(0);
  }
  let n = catalog.import_problems(&seed_problems()).await?;
  info!(target: "leetcoach_backend", seeded = n, "Catalog was empty; inserted starter problems");
  Ok(n)
}
