//! "Solved" detection over analysis text.
//!
//! This is a best-effort classification of free text produced by the analysis
//! provider, not a correctness judgement. It sits behind `CompletionPolicy` so a
//! structured-output policy can replace it without touching the session machine.

/// Phrases that, when present in an analysis, mark the sketch as complete.
pub const COMPLETION_TRIGGERS: [&str; 5] = [
  "solution is complete",
  "approach is correct",
  "logic is sound",
  "well structured",
  "handles all cases",
];

/// Decides whether an analysis marks the submitted sketch as complete.
pub trait CompletionPolicy: Send + Sync {
  fn is_complete(&self, analysis: &str) -> bool;
}

/// Case-insensitive substring match against a fixed vocabulary.
#[derive(Clone, Debug)]
pub struct TriggerPhrases {
  triggers: Vec<String>,
}

impl TriggerPhrases {
  pub fn new<I, S>(triggers: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self { triggers: triggers.into_iter().map(|t| t.into().to_lowercase()).collect() }
  }
}

impl Default for TriggerPhrases {
  fn default() -> Self {
    Self::new(COMPLETION_TRIGGERS)
  }
}

impl CompletionPolicy for TriggerPhrases {
  fn is_complete(&self, analysis: &str) -> bool {
    if analysis.trim().is_empty() {
      return false;
    }
    let lower = analysis.to_lowercase();
    self.triggers.iter().any(|t| lower.contains(t.as_str()))
  }
}
