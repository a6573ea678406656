//! Application state: every collaborator the handlers need, built once at startup
//! and shared behind an `Arc`. There are no process-wide singletons; tests build
//! their own state with in-memory stores.

use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::assignment::ProblemAssigner;
use crate::auth::{Authenticator, DevTokens, GoogleUserInfo};
use crate::completion::{CompletionPolicy, TriggerPhrases};
use crate::config::{load_agent_config_from_env, AppConfig, AuthMode, KvBackend};
use crate::cursor::Cursor;
use crate::import::import_csv;
use crate::ledger::AttemptLedger;
use crate::openai::{Analyzer, OpenAI, Unconfigured};
use crate::seeds::seed_if_empty;
use crate::sessions::SessionStore;
use crate::store::{Catalog, Database, KvStore, MemoryKv};

pub struct AppState {
    pub config: AppConfig,
    pub catalog: Arc<dyn Catalog>,
    pub sessions: SessionStore,
    pub assigner: ProblemAssigner,
    pub cursor: Cursor,
    pub ledger: AttemptLedger,
    pub analyzer: Arc<dyn Analyzer>,
    pub auth: Arc<dyn Authenticator>,
    pub completion: Arc<dyn CompletionPolicy>,
}

impl AppState {
    /// Wire the components over an already opened database and key-value store.
    pub fn from_parts(
        config: AppConfig,
        db: Arc<Database>,
        kv: Arc<dyn KvStore>,
        analyzer: Arc<dyn Analyzer>,
        auth: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            sessions: SessionStore::new(Some(config.session_ttl())),
            assigner: ProblemAssigner::new(kv.clone(), db.clone()),
            cursor: Cursor::new(kv.clone()),
            ledger: AttemptLedger::new(kv, db.clone(), db.clone()),
            catalog: db,
            analyzer,
            auth,
            completion: Arc::new(TriggerPhrases::default()),
            config,
        }
    }

    /// Build state from config + env: open storage, import/seed the catalog, init
    /// the analysis client and the identity provider.
    #[instrument(level = "info", skip_all)]
    pub async fn build(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let db = Arc::new(if config.database_path == ":memory:" {
            Database::open_in_memory()?
        } else {
            Database::open(&config.database_path)?
        });

        if let Some(path) = &config.catalog_csv_path {
            match import_csv(db.as_ref(), path).await {
                Ok(n) => info!(target: "leetcoach_backend", path = %path.display(), imported = n, "Catalog import done"),
                Err(e) => error!(target: "leetcoach_backend", path = %path.display(), error = %e, "Catalog import failed"),
            }
        }
        seed_if_empty(db.as_ref()).await?;

        let kv: Arc<dyn KvStore> = match config.kv_backend {
            KvBackend::Sqlite => db.clone(),
            KvBackend::Memory => {
                warn!(target: "leetcoach_backend", "KV_BACKEND=memory: progress is lost on restart");
                Arc::new(MemoryKv::new())
            }
        };

        let prompts = load_agent_config_from_env().map(|c| c.prompts).unwrap_or_default();
        let analyzer: Arc<dyn Analyzer> = match OpenAI::from_env(prompts) {
            Some(oa) => {
                info!(target: "leetcoach_backend", base_url = %oa.base_url, model = %oa.model, strong_model = %oa.strong_model, "OpenAI enabled.");
                Arc::new(oa)
            }
            None => {
                warn!(target: "leetcoach_backend", "OPENAI_API_KEY not set; submissions will fail with analysis_failed");
                Arc::new(Unconfigured)
            }
        };

        let auth: Arc<dyn Authenticator> = match config.auth_mode {
            AuthMode::Google => Arc::new(GoogleUserInfo::new(config.google_userinfo_url.clone())?),
            AuthMode::Dev => {
                warn!(target: "leetcoach_backend", "AUTH_MODE=dev: bearer tokens are trusted as user ids");
                Arc::new(DevTokens)
            }
        };

        Ok(Self::from_parts(config, db, kv, analyzer, auth))
    }
}

/// Periodically evict expired sessions. Runs every TTL seconds, at most once a minute.
pub fn spawn_session_sweeper(state: Arc<AppState>) -> JoinHandle<()> {
    let every = Duration::from_secs(state.config.session_ttl_secs.clamp(1, 60));
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        loop {
            tick.tick().await;
            let purged = state.sessions.purge_expired().await;
            if purged > 0 {
                let live = state.sessions.len().await;
                debug!(target: "leetcoach_backend", purged, live, "Expired sessions purged");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Difficulty;
    use crate::testing::{problem, test_state, ScriptedAnalyzer};

    #[tokio::test]
    async fn sweeper_runs_on_the_runtime() {
        let mut state = test_state(vec![problem(1, Difficulty::Easy)], ScriptedAnalyzer::replying("ok")).await;
        state.config.session_ttl_secs = 1;
        state.sessions = SessionStore::new(Some(chrono::Duration::zero()));
        let state = Arc::new(state);
        state.sessions.create("u").await;

        let handle = spawn_session_sweeper(state.clone());
        for _ in 0..50 {
            if state.sessions.len().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();
        assert_eq!(state.sessions.len().await, 0);
    }
}
