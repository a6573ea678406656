//! Persistence seams: the problem catalog, the append-only attempt history and the
//! key-value layer holding per-user progress.

use async_trait::async_trait;

use crate::domain::{HistoryEntry, Problem, ProblemId};
use crate::error::{PracticeError, StoreError};

pub mod kv;
pub mod sqlite;

pub use kv::{KvStore, MemoryKv};
pub use sqlite::Database;

/// Durable table of problems.
#[async_trait]
pub trait Catalog: Send + Sync {
  /// Up to `n` distinct problems chosen uniformly at random.
  /// Fails with `EmptyCatalog` when nothing is stored.
  async fn sample_problems(&self, n: usize) -> Result<Vec<Problem>, PracticeError>;

  async fn get_problem(&self, id: ProblemId) -> Result<Problem, PracticeError>;

  /// Insert or replace by id; returns the number of rows written.
  async fn import_problems(&self, problems: &[Problem]) -> Result<usize, StoreError>;

  async fn problem_count(&self) -> Result<usize, StoreError>;
}

/// Append-only log of finalized attempts.
#[async_trait]
pub trait AttemptHistory: Send + Sync {
  async fn append(&self, entry: &HistoryEntry) -> Result<i64, StoreError>;

  /// Newest first.
  async fn for_user(&self, user_id: &str) -> Result<Vec<HistoryEntry>, StoreError>;
}

/// Key layout in the key-value layer. Everything is namespaced by user id.
pub mod keys {
  use crate::domain::ProblemId;

  pub fn problems(user_id: &str) -> String {
    format!("user:{}:problems", user_id)
  }

  pub fn current_index(user_id: &str) -> String {
    format!("user:{}:current_index", user_id)
  }

  pub fn attempts(user_id: &str, problem_id: ProblemId) -> String {
    format!("user:{}:problem:{}:attempts", user_id, problem_id)
  }

  pub fn solved(user_id: &str, problem_id: ProblemId) -> String {
    format!("user:{}:problem:{}:solved", user_id, problem_id)
  }
}
