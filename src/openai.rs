//! Analysis provider: the `Analyzer` seam and a minimal OpenAI chat-completions client.
//!
//! Calls are instrumented and log model names, latencies and response sizes (not contents).
//! We never log the API key or the submitted text.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::domain::Problem;
use crate::error::AnalysisError;
use crate::util::fill_template;

/// Natural-language feedback on user-submitted text about a problem.
#[async_trait]
pub trait Analyzer: Send + Sync {
  /// Review a pseudocode sketch.
  async fn analyze(&self, problem: &Problem, text: &str) -> Result<String, AnalysisError>;

  /// Check a worked walkthrough of the solution.
  async fn verify_walkthrough(&self, problem: &Problem, walkthrough: &str) -> Result<String, AnalysisError>;

  /// Produce a complete reference solution with complexity notes.
  async fn reference_solution(&self, problem: &Problem) -> Result<String, AnalysisError>;
}

/// Stand-in when no API key is configured; every call fails with `NotConfigured`.
pub struct Unconfigured;

#[async_trait]
impl Analyzer for Unconfigured {
  async fn analyze(&self, _problem: &Problem, _text: &str) -> Result<String, AnalysisError> {
    Err(AnalysisError::NotConfigured)
  }

  async fn verify_walkthrough(&self, _problem: &Problem, _walkthrough: &str) -> Result<String, AnalysisError> {
    Err(AnalysisError::NotConfigured)
  }

  async fn reference_solution(&self, _problem: &Problem) -> Result<String, AnalysisError> {
    Err(AnalysisError::NotConfigured)
  }
}

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub strong_model: String,
  pub prompts: Prompts,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(prompts: Prompts) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model =
      std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let strong_model =
      std::env::var("OPENAI_STRONG_MODEL").unwrap_or_else(|_| "gpt-4o".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(60))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model, strong_model, prompts })
  }

  /// Plain-text chat completion.
  #[instrument(level = "info", skip(self, model, system, user), fields(model = %model))]
  async fn chat_plain(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
    max_tokens: u32,
  ) -> Result<String, AnalysisError> {
    let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      max_tokens: Some(max_tokens),
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "leetcoach-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      error!(elapsed = ?start.elapsed(), status, "OpenAI call failed");
      return Err(AnalysisError::Provider { status, message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default().trim().to_string();
    info!(elapsed = ?start.elapsed(), reply_len = text.len(), "OpenAI reply received");

    if text.is_empty() {
      return Err(AnalysisError::EmptyReply);
    }
    Ok(text)
  }
}

fn problem_pairs<'a>(problem: &'a Problem, difficulty: &'a str) -> Vec<(&'a str, &'a str)> {
  vec![
    ("title", problem.title.as_str()),
    ("description", problem.description.as_str()),
    ("difficulty", difficulty),
  ]
}

#[async_trait]
impl Analyzer for OpenAI {
  #[instrument(level = "info", skip(self, problem, text), fields(problem_id = problem.id, text_len = text.len()))]
  async fn analyze(&self, problem: &Problem, text: &str) -> Result<String, AnalysisError> {
    let mut pairs = problem_pairs(problem, problem.difficulty.as_str());
    pairs.push(("text", text));
    let user = fill_template(&self.prompts.analysis_user_template, &pairs);
    self.chat_plain(&self.model, &self.prompts.analysis_system, &user, 0.2, 1000).await
  }

  #[instrument(level = "info", skip(self, problem, walkthrough), fields(problem_id = problem.id, text_len = walkthrough.len()))]
  async fn verify_walkthrough(&self, problem: &Problem, walkthrough: &str) -> Result<String, AnalysisError> {
    let mut pairs = problem_pairs(problem, problem.difficulty.as_str());
    pairs.push(("walkthrough", walkthrough));
    let user = fill_template(&self.prompts.walkthrough_user_template, &pairs);
    self.chat_plain(&self.model, &self.prompts.walkthrough_system, &user, 0.2, 1000).await
  }

  #[instrument(level = "info", skip(self, problem), fields(problem_id = problem.id))]
  async fn reference_solution(&self, problem: &Problem) -> Result<String, AnalysisError> {
    let pairs = problem_pairs(problem, problem.difficulty.as_str());
    let user = fill_template(&self.prompts.solution_user_template, &pairs);
    self.chat_plain(&self.strong_model, &self.prompts.solution_system, &user, 0.7, 2000).await
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
