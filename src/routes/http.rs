//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{Path, Query, State},
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::auth::AuthUser;
use crate::domain::ProblemId;
use crate::error::PracticeError;
use crate::logic;
use crate::protocol::*;
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, PracticeError>;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state, user), fields(problem_count = ?q.problem_count))]
pub async fn http_start_session(
  State(state): State<Arc<AppState>>,
  AuthUser(user): AuthUser,
  Query(q): Query<StartQuery>,
) -> ApiResult<StartOut> {
  let started = logic::start_session(&state, &user, q.problem_count).await?;
  info!(target: "practice", session_id = %started.session.id, total = started.total, "HTTP session started");
  Ok(Json(started.into()))
}

#[instrument(level = "info", skip(state, user))]
pub async fn http_current(
  State(state): State<Arc<AppState>>,
  AuthUser(user): AuthUser,
  Path(session_id): Path<String>,
) -> ApiResult<CurrentOut> {
  let (problem, index, total_problems) = logic::current_problem(&state, &session_id, &user).await?;
  Ok(Json(CurrentOut { problem, index, total_problems }))
}

#[instrument(level = "info", skip(state, user, body), fields(text_len = body.pseudocode.len()))]
pub async fn http_submit_pseudocode(
  State(state): State<Arc<AppState>>,
  AuthUser(user): AuthUser,
  Path(session_id): Path<String>,
  Json(body): Json<PseudocodeIn>,
) -> ApiResult<SubmitOut> {
  let out = logic::submit_pseudocode(&state, &session_id, &user, &body.pseudocode, body.problem_id).await?;
  info!(target: "practice", %session_id, iterations = out.iterations, solved = out.solved, "HTTP pseudocode evaluated");
  Ok(Json(out.into()))
}

#[instrument(level = "info", skip(state, user, body), fields(text_len = body.walkthrough.len()))]
pub async fn http_submit_walkthrough(
  State(state): State<Arc<AppState>>,
  AuthUser(user): AuthUser,
  Path(session_id): Path<String>,
  Json(body): Json<WalkthroughIn>,
) -> ApiResult<WalkthroughOut> {
  let out = logic::submit_walkthrough(&state, &session_id, &user, &body.walkthrough).await?;
  Ok(Json(out.into()))
}

#[instrument(level = "info", skip(state, user))]
pub async fn http_next_problem(
  State(state): State<Arc<AppState>>,
  AuthUser(user): AuthUser,
  Path(session_id): Path<String>,
) -> ApiResult<NextOut> {
  let next = logic::next_problem(&state, &session_id, &user).await?;
  Ok(Json(next.into()))
}

#[instrument(level = "info", skip(state, user))]
pub async fn http_status(
  State(state): State<Arc<AppState>>,
  AuthUser(user): AuthUser,
  Path(session_id): Path<String>,
) -> ApiResult<StatusOut> {
  let status = logic::session_status(&state, &session_id, &user).await?;
  Ok(Json(status.into()))
}

#[instrument(level = "info", skip(state, user))]
pub async fn http_end_session(
  State(state): State<Arc<AppState>>,
  AuthUser(user): AuthUser,
  Path(session_id): Path<String>,
) -> ApiResult<EndOut> {
  let ended = logic::end_session(&state, &session_id, &user).await?;
  Ok(Json(ended.into()))
}

#[instrument(level = "info", skip(state, user))]
pub async fn http_history(
  State(state): State<Arc<AppState>>,
  AuthUser(user): AuthUser,
) -> ApiResult<HistoryOut> {
  let attempts = logic::history(&state, &user).await?;
  Ok(Json(HistoryOut { attempts }))
}

#[instrument(level = "info", skip(state, _user))]
pub async fn http_solution(
  State(state): State<Arc<AppState>>,
  AuthUser(_user): AuthUser,
  Path(problem_id): Path<ProblemId>,
) -> ApiResult<SolutionOut> {
  let (problem, solution) = logic::reference_solution(&state, problem_id).await?;
  Ok(Json(SolutionOut { problem_id: problem.id, title: problem.title, solution }))
}
