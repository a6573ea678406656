//! Per-user cursor into the assigned problem set.
//!
//! Advancement is strictly sequential and uses compare-and-swap on the stored
//! index, so two concurrent advances move the cursor twice instead of once.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::{PracticeError, StoreError};
use crate::store::{keys, KvStore};

/// Observable state of a practice session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
  Active { index: usize },
  Completed,
  Ended,
}

impl SessionState {
  /// Active while the index points inside the set, Completed once past it.
  pub fn for_index(index: usize, len: usize) -> Self {
    if index < len { SessionState::Active { index } } else { SessionState::Completed }
  }
}

/// Result of one advance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advance {
  Moved(usize),
  Completed,
}

#[derive(Clone)]
pub struct Cursor {
  kv: Arc<dyn KvStore>,
}

impl Cursor {
  pub fn new(kv: Arc<dyn KvStore>) -> Self {
    Self { kv }
  }

  async fn raw(&self, user_id: &str) -> Result<(Option<String>, usize), PracticeError> {
    let key = keys::current_index(user_id);
    let raw = self.kv.get(&key).await?;
    let index = match raw.as_deref() {
      None => 0,
      Some(s) => s.trim().parse::<usize>().map_err(|e| StoreError::Corrupt { key, detail: e.to_string() })?,
    };
    Ok((raw, index))
  }

  /// Stored index; a user without one is at 0.
  pub async fn load(&self, user_id: &str) -> Result<usize, PracticeError> {
    Ok(self.raw(user_id).await?.1)
  }

  pub async fn reset(&self, user_id: &str) -> Result<(), PracticeError> {
    self.kv.set(&keys::current_index(user_id), "0").await?;
    Ok(())
  }

  /// Move to `index + 1`. When that falls off the end of a set of `len` problems
  /// the cursor is parked at `len` and `Completed` is returned; it never wraps.
  #[instrument(level = "debug", skip(self))]
  pub async fn advance(&self, user_id: &str, len: usize) -> Result<Advance, PracticeError> {
    let key = keys::current_index(user_id);
    loop {
      let (raw, index) = self.raw(user_id).await?;
      let next = index + 1;
      if next >= len {
        if index < len && !self.kv.compare_and_swap(&key, raw.as_deref(), &len.to_string()).await? {
          continue;
        }
        debug!(target: "practice", %user_id, index, len, "Cursor exhausted");
        return Ok(Advance::Completed);
      }
      if self.kv.compare_and_swap(&key, raw.as_deref(), &next.to_string()).await? {
        debug!(target: "practice", %user_id, from = index, to = next, "Cursor advanced");
        return Ok(Advance::Moved(next));
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::MemoryKv;

  fn cursor() -> Cursor {
    Cursor::new(Arc::new(MemoryKv::new()))
  }

  #[tokio::test]
  async fn completes_exactly_on_nth_advance() {
    let c = cursor();
    let n = 4;
    for expected in 1..n {
      assert_eq!(c.advance("u", n).await.unwrap(), Advance::Moved(expected));
    }
    assert_eq!(c.advance("u", n).await.unwrap(), Advance::Completed);
    assert_eq!(c.load("u").await.unwrap(), n);
    // stays parked
    assert_eq!(c.advance("u", n).await.unwrap(), Advance::Completed);
    assert_eq!(c.load("u").await.unwrap(), n);
  }

  #[tokio::test]
  async fn single_problem_set_completes_immediately() {
    let c = cursor();
    assert_eq!(c.advance("u", 1).await.unwrap(), Advance::Completed);
    assert_eq!(SessionState::for_index(c.load("u").await.unwrap(), 1), SessionState::Completed);
  }

  #[tokio::test]
  async fn reset_returns_to_start() {
    let c = cursor();
    c.advance("u", 5).await.unwrap();
    c.reset("u").await.unwrap();
    assert_eq!(c.load("u").await.unwrap(), 0);
  }

  #[tokio::test]
  async fn concurrent_advances_are_all_applied() {
    let c = cursor();
    let mut handles = Vec::new();
    for _ in 0..5 {
      let c = c.clone();
      handles.push(tokio::spawn(async move { c.advance("u", 100).await.unwrap() }));
    }
    for h in handles {
      h.await.unwrap();
    }
    assert_eq!(c.load("u").await.unwrap(), 5);
  }

  #[test]
  fn state_serializes_with_tag() {
    let json = serde_json::to_value(SessionState::Active { index: 2 }).unwrap();
    assert_eq!(json, serde_json::json!({"state": "active", "index": 2}));
    assert_eq!(serde_json::to_value(SessionState::Ended).unwrap(), serde_json::json!({"state": "ended"}));
  }
}
