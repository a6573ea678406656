//! Key-value layer for per-user progress.
//!
//! Besides plain get/set, implementations provide an atomic `incr` and a
//! `compare_and_swap` so concurrent requests for the same user cannot lose
//! counter increments or cursor moves.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StoreError;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Atomically add one to an integer value (absent counts as 0) and return the result.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Write `new` only if the current value equals `expected` (`None` = key absent).
    /// Returns whether the write happened.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, StoreError>;
}

/// Process-local store. Loses everything on restart; used for tests and `KV_BACKEND=memory`.
#[derive(Default)]
pub struct MemoryKv {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

pub(crate) fn parse_counter(key: &str, raw: &str) -> Result<i64, StoreError> {
    raw.trim().parse::<i64>().map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        detail: e.to_string(),
    })
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.lock().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut map = self.inner.lock().await;
        let current = match map.get(key) {
            Some(raw) => parse_counter(key, raw)?,
            None => 0,
        };
        let next = current + 1;
        map.insert(key.to_string(), next.to_string());
        Ok(next)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.lock().await.remove(key);
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, StoreError> {
        let mut map = self.inner.lock().await;
        if map.get(key).map(String::as_str) != expected {
            return Ok(false);
        }
        map.insert(key.to_string(), new.to_string());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn incr_starts_at_one() {
        let kv = MemoryKv::new();
        assert_eq!(kv.incr("c").await.unwrap(), 1);
        assert_eq!(kv.incr("c").await.unwrap(), 2);
        assert_eq!(kv.get("c").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn incr_rejects_non_integer() {
        let kv = MemoryKv::new();
        kv.set("c", "abc").await.unwrap();
        assert!(matches!(kv.incr("c").await, Err(StoreError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn compare_and_swap_checks_expected_value() {
        let kv = MemoryKv::new();
        assert!(kv.compare_and_swap("k", None, "a").await.unwrap());
        assert!(!kv.compare_and_swap("k", None, "b").await.unwrap());
        assert!(!kv.compare_and_swap("k", Some("x"), "b").await.unwrap());
        assert!(kv.compare_and_swap("k", Some("a"), "b").await.unwrap());
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let kv = Arc::new(MemoryKv::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let kv = kv.clone();
            handles.push(tokio::spawn(async move { kv.incr("n").await.unwrap() }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(kv.get("n").await.unwrap().as_deref(), Some("32"));
    }
}
