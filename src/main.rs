//! LeetCoach · Practice Progress Backend
//!
//! - Axum HTTP + WebSocket API
//! - SQLite problem catalog, attempt history and durable key-value progress
//! - Optional OpenAI integration for pseudocode analysis (via environment variables)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   DATABASE_PATH       : SQLite file (default "leetcoach.db", ":memory:" for scratch runs)
//!   KV_BACKEND          : "sqlite" (default) or "memory"
//!   SESSION_TTL_SECS    : idle session expiry (default 86400)
//!   CATALOG_CSV_PATH    : problem CSV imported at startup
//!   AUTH_MODE           : "google" (default) or "dev"
//!   OPENAI_API_KEY      : enables OpenAI integration if present
//!   AGENT_CONFIG_PATH   : path to TOML config (prompts)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod classifier;
mod completion;
mod store;
mod import;
mod seeds;
mod ledger;
mod assignment;
mod cursor;
mod sessions;
mod auth;
mod openai;
mod state;
mod protocol;
mod logic;
mod routes;
#[cfg(test)]
mod testing;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::config::AppConfig;
use crate::routes::build_router;
use crate::state::{spawn_session_sweeper, AppState};

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let config = AppConfig::from_env();
  let port = config.port;

  // Shared application state (storage, sessions, analyzer, identity provider).
  let state = Arc::new(AppState::build(config).await?);

  // Idle sessions are dropped in the background.
  spawn_session_sweeper(state.clone());

  let app = build_router(state.clone());

  let addr = SocketAddr::from(([0, 0, 0, 0], port));
  let listener = TcpListener::bind(addr).await?;
  info!(target: "leetcoach_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
