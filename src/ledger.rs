//! Attempt ledger: live per-(user, problem) counters and solved flags in the
//! key-value layer, plus the append-only history of finalized attempts.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::domain::{Difficulty, HistoryEntry, ProblemId};
use crate::error::{PracticeError, StoreError};
use crate::store::{keys, AttemptHistory, Catalog, KvStore};

#[derive(Clone)]
pub struct AttemptLedger {
  kv: Arc<dyn KvStore>,
  catalog: Arc<dyn Catalog>,
  history: Arc<dyn AttemptHistory>,
}

impl AttemptLedger {
  pub fn new(kv: Arc<dyn KvStore>, catalog: Arc<dyn Catalog>, history: Arc<dyn AttemptHistory>) -> Self {
    Self { kv, catalog, history }
  }

  /// Count one more submission and return the new total (1 on first submission).
  #[instrument(level = "debug", skip(self))]
  pub async fn record_submission(&self, user_id: &str, problem_id: ProblemId) -> Result<u32, PracticeError> {
    let key = keys::attempts(user_id, problem_id);
    let n = self.kv.incr(&key).await?;
    let n = u32::try_from(n).map_err(|e| StoreError::Corrupt { key, detail: e.to_string() })?;
    debug!(target: "practice", %user_id, problem_id, iterations = n, "Submission recorded");
    Ok(n)
  }

  /// Current submission count; 0 if the problem was never attempted.
  pub async fn iterations(&self, user_id: &str, problem_id: ProblemId) -> Result<u32, PracticeError> {
    let key = keys::attempts(user_id, problem_id);
    match self.kv.get(&key).await? {
      None => Ok(0),
      Some(raw) => raw
        .trim()
        .parse::<u32>()
        .map_err(|e| StoreError::Corrupt { key, detail: e.to_string() }.into()),
    }
  }

  /// Idempotent; the flag never goes back to false.
  #[instrument(level = "debug", skip(self))]
  pub async fn mark_solved(&self, user_id: &str, problem_id: ProblemId) -> Result<(), PracticeError> {
    self.kv.set(&keys::solved(user_id, problem_id), "1").await?;
    Ok(())
  }

  pub async fn is_solved(&self, user_id: &str, problem_id: ProblemId) -> Result<bool, PracticeError> {
    Ok(matches!(self.kv.get(&keys::solved(user_id, problem_id)).await?.as_deref(), Some("1")))
  }

  /// Append an immutable history row. The catalog rating is resolved here, so an
  /// unknown problem fails with `ProblemNotFound` and nothing is written.
  #[instrument(level = "info", skip(self))]
  pub async fn finalize_history(
    &self,
    user_id: &str,
    problem_id: ProblemId,
    iterations: u32,
    user_difficulty: Difficulty,
  ) -> Result<HistoryEntry, PracticeError> {
    let problem = self.catalog.get_problem(problem_id).await?;
    let mut entry = HistoryEntry {
      id: None,
      user_id: user_id.to_string(),
      problem_id,
      iterations,
      user_difficulty,
      leetcode_difficulty: problem.difficulty,
      timestamp: Utc::now(),
    };
    entry.id = Some(self.history.append(&entry).await?);
    info!(target: "practice", %user_id, problem_id, iterations, %user_difficulty, leetcode_difficulty = %entry.leetcode_difficulty, "Attempt finalized");
    Ok(entry)
  }

  pub async fn history(&self, user_id: &str) -> Result<Vec<HistoryEntry>, PracticeError> {
    Ok(self.history.for_user(user_id).await?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::{Database, MemoryKv};
  use crate::testing::problem;

  async fn ledger() -> AttemptLedger {
    let db = Arc::new(Database::open_in_memory().unwrap());
    db.import_problems(&[problem(1, Difficulty::Medium)]).await.unwrap();
    AttemptLedger::new(Arc::new(MemoryKv::new()), db.clone(), db)
  }

  #[tokio::test]
  async fn k_submissions_count_to_k() {
    let l = ledger().await;
    assert_eq!(l.iterations("u", 1).await.unwrap(), 0);
    for k in 1..=7 {
      assert_eq!(l.record_submission("u", 1).await.unwrap(), k);
    }
    assert_eq!(l.iterations("u", 1).await.unwrap(), 7);
    // other users and problems are independent
    assert_eq!(l.iterations("v", 1).await.unwrap(), 0);
    assert_eq!(l.iterations("u", 2).await.unwrap(), 0);
  }

  #[tokio::test]
  async fn mark_solved_is_idempotent() {
    let l = ledger().await;
    assert!(!l.is_solved("u", 1).await.unwrap());
    l.mark_solved("u", 1).await.unwrap();
    l.mark_solved("u", 1).await.unwrap();
    assert!(l.is_solved("u", 1).await.unwrap());
  }

  #[tokio::test]
  async fn finalize_history_resolves_catalog_rating() {
    let l = ledger().await;
    let entry = l.finalize_history("u", 1, 5, Difficulty::Hard).await.unwrap();
    assert_eq!(entry.leetcode_difficulty, Difficulty::Medium);
    assert!(entry.id.is_some());
    l.finalize_history("u", 1, 6, Difficulty::Hard).await.unwrap();
    let rows = l.history("u").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].iterations, 6);
  }

  #[tokio::test]
  async fn finalize_history_unknown_problem_fails() {
    let l = ledger().await;
    let err = l.finalize_history("u", 99, 1, Difficulty::Easy).await.unwrap_err();
    assert!(matches!(err, PracticeError::ProblemNotFound(99)));
    assert!(l.history("u").await.unwrap().is_empty());
  }
}
