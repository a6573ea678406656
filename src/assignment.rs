//! Problem assignment: resolve the user's stored problem set or sample a new one.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::domain::ProblemSet;
use crate::error::{PracticeError, StoreError};
use crate::store::{keys, Catalog, KvStore};

#[derive(Clone)]
pub struct ProblemAssigner {
  kv: Arc<dyn KvStore>,
  catalog: Arc<dyn Catalog>,
}

impl ProblemAssigner {
  pub fn new(kv: Arc<dyn KvStore>, catalog: Arc<dyn Catalog>) -> Self {
    Self { kv, catalog }
  }

  /// Stored set for this cycle, if any.
  pub async fn stored(&self, user_id: &str) -> Result<Option<ProblemSet>, PracticeError> {
    match self.kv.get(&keys::problems(user_id)).await? {
      Some(raw) => Ok(Some(decode(&raw)?)),
      None => Ok(None),
    }
  }

  /// Return the stored set unchanged (whatever `requested_count` says), or sample
  /// `requested_count` problems, persist them and put the cursor at 0.
  ///
  /// A catalog smaller than `requested_count` yields every available problem.
  #[instrument(level = "info", skip(self))]
  pub async fn assign_or_resume(&self, user_id: &str, requested_count: usize) -> Result<ProblemSet, PracticeError> {
    let key = keys::problems(user_id);
    let observed = self.kv.get(&key).await?;
    if let Some(raw) = &observed {
      let set = decode(raw)?;
      if !set.is_empty() {
        return Ok(set);
      }
    }

    let problems = self.catalog.sample_problems(requested_count.max(1)).await?;
    if problems.is_empty() {
      return Err(PracticeError::EmptyCatalog);
    }
    let set = ProblemSet::new(problems);
    let encoded = serde_json::to_string(&set).map_err(StoreError::from)?;

    // A concurrent start for the same user keeps whichever set landed first.
    if !self.kv.compare_and_swap(&key, observed.as_deref(), &encoded).await? {
      match self.stored(user_id).await? {
        Some(winner) if !winner.is_empty() => return Ok(winner),
        _ => self.kv.set(&key, &encoded).await?,
      }
    }
    self.kv.set(&keys::current_index(user_id), "0").await?;
    info!(target: "practice", %user_id, requested_count, assigned = set.len(), "Assigned new problem set");
    Ok(set)
  }

  /// Drop the stored set and sample a fresh one. Used when a cycle is exhausted.
  #[instrument(level = "info", skip(self))]
  pub async fn reassign(&self, user_id: &str, requested_count: usize) -> Result<ProblemSet, PracticeError> {
    self.kv.delete(&keys::problems(user_id)).await?;
    self.assign_or_resume(user_id, requested_count).await
  }
}

fn decode(raw: &str) -> Result<ProblemSet, PracticeError> {
  Ok(serde_json::from_str(raw).map_err(StoreError::from)?)
}
