//! Runtime configuration.
//!
//! - `AppConfig`: process settings read once from environment variables.
//! - `AgentConfig`: analysis prompts loaded from a TOML file (AGENT_CONFIG_PATH).

use std::path::PathBuf;

use chrono::Duration;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::auth::GOOGLE_USERINFO_URL;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KvBackend {
  Sqlite,
  Memory,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMode {
  Google,
  /// The bearer token is taken as the user id. Never use in production.
  Dev,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
  pub port: u16,
  pub database_path: String,
  pub kv_backend: KvBackend,
  /// Idle time after which a session is dropped.
  pub session_ttl_secs: u64,
  pub default_problem_count: usize,
  pub catalog_csv_path: Option<PathBuf>,
  pub auth_mode: AuthMode,
  pub google_userinfo_url: String,
  pub cors_allow_origin: Option<String>,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      port: 3000,
      database_path: "leetcoach.db".into(),
      kv_backend: KvBackend::Sqlite,
      session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
      default_problem_count: 20,
      catalog_csv_path: None,
      auth_mode: AuthMode::Google,
      google_userinfo_url: GOOGLE_USERINFO_URL.into(),
      cors_allow_origin: None,
    }
  }
}

impl AppConfig {
  pub fn session_ttl(&self) -> Duration {
    ttl_duration(self.session_ttl_secs).unwrap_or_else(|| Duration::hours(24))
  }

  pub fn from_env() -> Self {
    Self::from_lookup(|k| std::env::var(k).ok())
  }

  /// Build from any key lookup; unparsable values fall back to defaults with a warning.
  pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
    let d = Self::default();
    let parsed = |key: &str| -> Option<String> { get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) };

    let port = parsed("PORT").and_then(|p| parse_or_warn("PORT", &p)).unwrap_or(d.port);
    let kv_backend = match parsed("KV_BACKEND").as_deref() {
      Some("memory") => KvBackend::Memory,
      Some("sqlite") | None => KvBackend::Sqlite,
      Some(other) => {
        warn!(target: "leetcoach_backend", value = %other, "Unknown KV_BACKEND; using sqlite");
        KvBackend::Sqlite
      }
    };
    let auth_mode = match parsed("AUTH_MODE").as_deref() {
      Some("dev") => AuthMode::Dev,
      Some("google") | None => AuthMode::Google,
      Some(other) => {
        warn!(target: "leetcoach_backend", value = %other, "Unknown AUTH_MODE; using google");
        AuthMode::Google
      }
    };

    Self {
      port,
      database_path: parsed("DATABASE_PATH").unwrap_or(d.database_path),
      kv_backend,
      session_ttl_secs: parsed("SESSION_TTL_SECS")
        .and_then(|v| parse_or_warn::<u64>("SESSION_TTL_SECS", &v))
        .filter(|s| {
          let ok = *s > 0 && ttl_duration(*s).is_some();
          if !ok {
            warn!(target: "leetcoach_backend", value = *s, "SESSION_TTL_SECS out of range; using default");
          }
          ok
        })
        .unwrap_or(d.session_ttl_secs),
      default_problem_count: parsed("DEFAULT_PROBLEM_COUNT")
        .and_then(|v| parse_or_warn::<usize>("DEFAULT_PROBLEM_COUNT", &v))
        .filter(|n| *n > 0)
        .unwrap_or(d.default_problem_count),
      catalog_csv_path: parsed("CATALOG_CSV_PATH").map(PathBuf::from),
      auth_mode,
      google_userinfo_url: parsed("GOOGLE_USERINFO_URL").unwrap_or(d.google_userinfo_url),
      cors_allow_origin: parsed("CORS_ALLOW_ORIGIN"),
    }
  }
}

const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;

fn ttl_duration(secs: u64) -> Option<Duration> {
  i64::try_from(secs).ok().and_then(Duration::try_seconds)
}

fn parse_or_warn<T: std::str::FromStr>(key: &str, raw: &str) -> Option<T> {
  match raw.parse::<T>() {
    Ok(v) => Some(v),
    Err(_) => {
      warn!(target: "leetcoach_backend", %key, value = %raw, "Ignoring unparsable setting");
      None
    }
  }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
}

/// Prompts used by the analysis client. Placeholders: `{title}`, `{description}`,
/// `{difficulty}`, plus `{text}` (analysis) and `{walkthrough}` (verification).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub analysis_system: String,
  pub analysis_user_template: String,
  pub walkthrough_system: String,
  pub walkthrough_user_template: String,
  pub solution_system: String,
  pub solution_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      analysis_system: "You are an interview coach reviewing algorithm pseudocode. Be specific and concise. When the sketch is complete and correct, say so explicitly using the phrase \"solution is complete\".".into(),
      analysis_user_template: "Problem: {title}\nDescription: {description}\n\nUser's pseudocode:\n{text}\n\nProvide your analysis in markdown covering:\n## Logical completeness\nIs the solution logically sound? Are all steps clearly defined?\n## Edge cases\nWhich edge cases are handled and which are missing?\n## Efficiency\nTime complexity, space complexity, performance considerations.\n## Suggested improvements\nSpecific improvements and alternative approaches.".into(),
      walkthrough_system: "You verify worked examples of algorithm solutions. Be concise.".into(),
      walkthrough_user_template: "Problem: {title}\n\nUser's solution walkthrough:\n{walkthrough}\n\nVerify whether the walkthrough:\n1. Correctly handles all cases\n2. Shows clear understanding\n3. Misses any edge cases".into(),
      solution_system: "You write clear, efficient reference solutions for coding interview problems.".into(),
      solution_user_template: "Problem: {title}\nDescription: {description}\n\nGenerate a complete, efficient Python solution. Include time and space complexity analysis, clear variable names and comments, edge case handling, and example test cases. Format the answer as a single python code block.".into(),
    }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "leetcoach_backend", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "leetcoach_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "leetcoach_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
