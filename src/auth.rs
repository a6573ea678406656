//! Identity: bearer token → stable user id.
//!
//! `GoogleUserInfo` asks the OAuth userinfo endpoint for the token's subject.
//! `DevTokens` treats the token itself as the user id (local development and tests).

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
  extract::{FromRequestParts, Query},
  http::{header::AUTHORIZATION, request::Parts},
};
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use tracing::{debug, error, instrument};

use crate::domain::UserId;
use crate::error::{AuthError, PracticeError};
use crate::state::AppState;

pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

#[async_trait]
pub trait Authenticator: Send + Sync {
  async fn authenticate(&self, token: &str) -> Result<UserId, AuthError>;
}

pub struct GoogleUserInfo {
  client: reqwest::Client,
  endpoint: String,
}

impl GoogleUserInfo {
  pub fn new(endpoint: impl Into<String>) -> Result<Self, AuthError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(10))
      .build()
      .map_err(|e| AuthError::Unreachable(e.to_string()))?;
    Ok(Self { client, endpoint: endpoint.into() })
  }
}

#[derive(Deserialize)]
struct UserInfo {
  #[serde(default)] sub: Option<String>,
}

#[async_trait]
impl Authenticator for GoogleUserInfo {
  #[instrument(level = "debug", skip_all)]
  async fn authenticate(&self, token: &str) -> Result<UserId, AuthError> {
    let res = self.client
      .get(&self.endpoint)
      .header(USER_AGENT, "leetcoach-backend/0.1")
      .bearer_auth(token)
      .send()
      .await
      .map_err(|e| {
        error!(target: "leetcoach_backend", error = %e, "Identity provider request failed");
        AuthError::Unreachable(e.to_string())
      })?;

    if !res.status().is_success() {
      return Err(AuthError::Rejected(res.status().as_u16()));
    }
    let info: UserInfo = res.json().await.map_err(|e| AuthError::Unreachable(e.to_string()))?;
    let sub = info.sub.filter(|s| !s.trim().is_empty()).ok_or(AuthError::MissingSubject)?;
    debug!(target: "leetcoach_backend", "Verified user");
    Ok(sub)
  }
}

/// Development provider: any non-empty token is its own user id.
#[derive(Default)]
pub struct DevTokens;

#[async_trait]
impl Authenticator for DevTokens {
  async fn authenticate(&self, token: &str) -> Result<UserId, AuthError> {
    let t = token.trim();
    if t.is_empty() {
      return Err(AuthError::MissingToken);
    }
    Ok(t.to_string())
  }
}

/// `Authorization: Bearer <token>`; `None` when the header is absent.
pub fn bearer_from_header(value: Option<&str>) -> Result<Option<String>, AuthError> {
  let Some(v) = value else { return Ok(None) };
  let mut parts = v.trim().splitn(2, ' ');
  match (parts.next(), parts.next()) {
    (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
      Ok(Some(token.trim().to_string()))
    }
    _ => Err(AuthError::Malformed),
  }
}

#[derive(Deserialize)]
struct TokenQuery {
  token: Option<String>,
}

/// Authenticated caller. Reads the Authorization header, falling back to a
/// `token` query parameter (browsers cannot set headers on WebSocket upgrades).
pub struct AuthUser(pub UserId);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
  type Rejection = PracticeError;

  async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
    let header = parts.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let token = match bearer_from_header(header)? {
      Some(t) => t,
      None => Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.trim().is_empty())
        .ok_or(AuthError::MissingToken)?,
    };
    let user = state.auth.authenticate(&token).await?;
    Ok(AuthUser(user))
  }
}
