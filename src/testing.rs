//! Shared fixtures for unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::auth::DevTokens;
use crate::config::AppConfig;
use crate::domain::{Difficulty, Problem};
use crate::error::AnalysisError;
use crate::openai::Analyzer;
use crate::state::AppState;
use crate::store::{Catalog, Database, MemoryKv};

pub fn problem(id: i64, difficulty: Difficulty) -> Problem {
  Problem {
    id,
    title: format!("Problem {}", id),
    description: format!("Description of problem {}", id),
    difficulty,
    acceptance_rate: 0.5,
    frequency: 1.0,
    related_topics: vec![],
    asked_by_faang: false,
  }
}

/// Analyzer replaying scripted replies in order (the last one repeats), or failing every call.
pub struct ScriptedAnalyzer {
  replies: Mutex<Vec<String>>,
}

impl ScriptedAnalyzer {
  pub fn replying(text: &str) -> Self {
    Self::sequence(&[text])
  }

  pub fn sequence(texts: &[&str]) -> Self {
    Self { replies: Mutex::new(texts.iter().map(|t| t.to_string()).collect()) }
  }

  pub fn failing() -> Self {
    Self::sequence(&[])
  }

  fn answer(&self) -> Result<String, AnalysisError> {
    let mut replies = self.replies.lock().unwrap();
    if replies.len() > 1 {
      return Ok(replies.remove(0));
    }
    replies.first().cloned().ok_or(AnalysisError::Provider { status: 503, message: "overloaded".into() })
  }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
  async fn analyze(&self, _problem: &Problem, _text: &str) -> Result<String, AnalysisError> {
    self.answer()
  }

  async fn verify_walkthrough(&self, _problem: &Problem, _walkthrough: &str) -> Result<String, AnalysisError> {
    self.answer()
  }

  async fn reference_solution(&self, _problem: &Problem) -> Result<String, AnalysisError> {
    self.answer()
  }
}

/// In-memory state over the given catalog, dev authentication (token = user id).
pub async fn test_state(problems: Vec<Problem>, analyzer: ScriptedAnalyzer) -> AppState {
  let db = Arc::new(Database::open_in_memory().unwrap());
  db.import_problems(&problems).await.unwrap();
  AppState::from_parts(
    AppConfig::default(),
    db,
    Arc::new(MemoryKv::new()),
    Arc::new(analyzer),
    Arc::new(DevTokens),
  )
}
