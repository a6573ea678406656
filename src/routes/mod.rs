//! Router assembly: HTTP endpoints, WebSocket upgrade, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{warn, Level};

use crate::state::AppState;

pub mod http;
pub mod ws;

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let allow_origin = match origin.map(HeaderValue::from_str) {
        Some(Ok(v)) => AllowOrigin::exact(v),
        Some(Err(e)) => {
            warn!(target: "leetcoach_backend", error = %e, "Invalid CORS_ALLOW_ORIGIN; allowing any origin");
            AllowOrigin::from(Any)
        }
        None => AllowOrigin::from(Any),
    };
    CorsLayer::new().allow_origin(allow_origin).allow_methods(Any).allow_headers(Any)
}

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - CORS (any origin unless CORS_ALLOW_ORIGIN is set)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(state.config.cors_allow_origin.as_deref());

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/session/start", post(http::http_start_session))
        .route("/api/v1/session/:session_id", delete(http::http_end_session))
        .route("/api/v1/session/:session_id/current", get(http::http_current))
        .route("/api/v1/session/:session_id/submit-pseudocode", post(http::http_submit_pseudocode))
        .route("/api/v1/session/:session_id/walkthrough", post(http::http_submit_walkthrough))
        .route("/api/v1/session/:session_id/next-problem", post(http::http_next_problem))
        .route("/api/v1/session/:session_id/status", get(http::http_status))
        .route("/api/v1/history", get(http::http_history))
        .route("/api/v1/problems/:problem_id/solution", get(http::http_solution))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header::AUTHORIZATION, Method, Request, StatusCode},
    };
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::domain::Difficulty;
    use crate::testing::{problem, test_state, ScriptedAnalyzer};

    async fn app(reply: &str) -> Router {
        let problems = vec![problem(1, Difficulty::Easy), problem(2, Difficulty::Medium), problem(3, Difficulty::Hard)];
        build_router(Arc::new(test_state(problems, ScriptedAnalyzer::replying(reply)).await))
    }

    async fn call(app: &Router, method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(u) = user {
            req = req.header(AUTHORIZATION, format!("Bearer {}", u));
        }
        let req = match body {
            Some(b) => req.header("content-type", "application/json").body(Body::from(b.to_string())).unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    fn encode(id: &str) -> String {
        id.replace(':', "%3A")
    }

    #[tokio::test]
    async fn health_needs_no_auth() {
        let app = app("ok").await;
        let (status, body) = call(&app, Method::GET, "/api/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));
    }

    #[tokio::test]
    async fn session_routes_require_bearer_token() {
        let app = app("ok").await;
        let (status, body) = call(&app, Method::POST, "/api/v1/session/start", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");
    }

    #[tokio::test]
    async fn full_session_over_http() {
        let app = app("The approach is correct and handles all cases.").await;

        let (status, started) = call(&app, Method::POST, "/api/v1/session/start?problem_count=3", Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(started["total_problems"], 3);
        let sid = encode(started["session_id"].as_str().unwrap());

        let (status, submitted) = call(
            &app,
            Method::POST,
            &format!("/api/v1/session/{}/submit-pseudocode", sid),
            Some("alice"),
            Some(json!({"pseudocode": "two pointers"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(submitted["iterations"], 1);
        assert_eq!(submitted["problem_solved"], true);

        let (_, walk) = call(
            &app,
            Method::POST,
            &format!("/api/v1/session/{}/walkthrough", sid),
            Some("alice"),
            Some(json!({"walkthrough": "trace on [1,2,3]"})),
        )
        .await;
        assert_eq!(walk["user_difficulty"], "Easy");

        for expected in ["success", "success", "completed"] {
            let (status, next) = call(&app, Method::POST, &format!("/api/v1/session/{}/next-problem", sid), Some("alice"), None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(next["status"], expected);
        }

        let (_, status_body) = call(&app, Method::GET, &format!("/api/v1/session/{}/status", sid), Some("alice"), None).await;
        assert_eq!(status_body["state"], "completed");
        assert_eq!(status_body["completed_problems"], 3);
        assert_eq!(status_body["solved_problems"], 1);
        assert!(status_body["current_problem"].is_null());

        let (status, cur) = call(&app, Method::GET, &format!("/api/v1/session/{}/current", sid), Some("alice"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(cur["error"], "set_completed");

        let (_, history) = call(&app, Method::GET, "/api/v1/history", Some("alice"), None).await;
        assert_eq!(history["attempts"].as_array().unwrap().len(), 1);

        let (status, _) = call(&app, Method::DELETE, &format!("/api/v1/session/{}", sid), Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, again) = call(&app, Method::DELETE, &format!("/api/v1/session/{}", sid), Some("alice"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(again["error"], "session_not_found");
    }

    #[tokio::test]
    async fn sessions_are_private_to_their_user() {
        let app = app("ok").await;
        let (_, started) = call(&app, Method::POST, "/api/v1/session/start", Some("alice"), None).await;
        let sid = encode(started["session_id"].as_str().unwrap());
        let (status, _) = call(&app, Method::GET, &format!("/api/v1/session/{}/status", sid), Some("bob"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_problem_solution_is_not_found() {
        let app = app("def solve(): pass").await;
        let (status, body) = call(&app, Method::GET, "/api/v1/problems/404/solution", Some("alice"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "problem_not_found");
        let (status, body) = call(&app, Method::GET, "/api/v1/problems/2/solution", Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["problem_id"], 2);
    }
}
