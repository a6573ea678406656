//! Session machine operations shared by both HTTP and WebSocket handlers.
//!
//! Flow: start → (submit pseudocode)* → walkthrough? → next → ... → completed.
//! Every operation on an existing session validates the session before it
//! touches durable state.

use tracing::{info, instrument, warn};

use crate::classifier::{classify, comparison_message};
use crate::cursor::{Advance, SessionState};
use crate::domain::{Difficulty, HistoryEntry, Problem, ProblemId, ProblemSet};
use crate::error::PracticeError;
use crate::sessions::Session;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct Started {
  pub session: Session,
  pub problem: Problem,
  pub index: usize,
  pub total: usize,
}

#[derive(Debug, Clone)]
pub struct Submitted {
  pub analysis: String,
  pub iterations: u32,
  pub solved: bool,
}

#[derive(Debug, Clone)]
pub struct Walkthrough {
  pub verification: String,
  pub entry: HistoryEntry,
  pub comparison_message: String,
}

#[derive(Debug, Clone)]
pub enum Next {
  Problem { problem: Problem, index: usize, remaining: usize },
  Completed,
}

#[derive(Debug, Clone)]
pub struct Status {
  pub state: SessionState,
  pub total: usize,
  pub completed: usize,
  pub solved: usize,
  pub current: Option<Problem>,
}

/// Session, its user's problem set and the cursor index, in that order of validation.
async fn context(state: &AppState, session_id: &str, user_id: &str) -> Result<(Session, ProblemSet, usize), PracticeError> {
  let session = state.sessions.get(session_id, user_id).await?;
  let set = state
    .assigner
    .stored(&session.user_id)
    .await?
    .filter(|s| !s.is_empty())
    .ok_or_else(|| PracticeError::InvalidRequest("no problem set assigned; start a new session".into()))?;
  let index = state.cursor.load(&session.user_id).await?;
  Ok((session, set, index))
}

fn current_of(set: &ProblemSet, index: usize) -> Result<Problem, PracticeError> {
  set.get(index).cloned().ok_or(PracticeError::SetCompleted)
}

/// Resolve (or assign) the user's set and open a session on the stored cursor.
/// A cursor already past the end starts a new cycle with a freshly assigned set.
#[instrument(level = "info", skip(state))]
pub async fn start_session(state: &AppState, user_id: &str, requested_count: Option<usize>) -> Result<Started, PracticeError> {
  let count = requested_count.unwrap_or(state.config.default_problem_count);
  let mut set = state.assigner.assign_or_resume(user_id, count).await?;
  let mut index = state.cursor.load(user_id).await?;

  if index >= set.len() {
    info!(target: "practice", %user_id, index, len = set.len(), "Previous cycle exhausted; reassigning");
    state.cursor.reset(user_id).await?;
    set = state.assigner.reassign(user_id, count).await?;
    index = 0;
  }

  let problem = current_of(&set, index)?;
  let session = state.sessions.create(user_id).await;
  info!(target: "practice", session_id = %session.id, %user_id, index, total = set.len(), problem_id = problem.id, "Session started");
  Ok(Started { session, problem, index, total: set.len() })
}

#[instrument(level = "debug", skip(state))]
pub async fn current_problem(state: &AppState, session_id: &str, user_id: &str) -> Result<(Problem, usize, usize), PracticeError> {
  let (_, set, index) = context(state, session_id, user_id).await?;
  Ok((current_of(&set, index)?, index, set.len()))
}

/// Analyze a pseudocode sketch for the current problem, count the attempt and
/// update the solved flag. An analysis failure records nothing.
#[instrument(level = "info", skip(state, pseudocode), fields(text_len = pseudocode.len()))]
pub async fn submit_pseudocode(
  state: &AppState,
  session_id: &str,
  user_id: &str,
  pseudocode: &str,
  problem_id: Option<ProblemId>,
) -> Result<Submitted, PracticeError> {
  if pseudocode.trim().is_empty() {
    return Err(PracticeError::InvalidRequest("pseudocode is empty".into()));
  }
  let (session, set, index) = context(state, session_id, user_id).await?;
  let problem = current_of(&set, index)?;
  if let Some(submitted) = problem_id {
    if submitted != problem.id {
      return Err(PracticeError::ProblemMismatch { submitted, current: problem.id });
    }
  }

  let analysis = state.analyzer.analyze(&problem, pseudocode).await.map_err(|e| {
    warn!(target: "practice", %session_id, problem_id = problem.id, error = %e, "Analysis failed; caller may retry");
    e
  })?;

  let user = &session.user_id;
  let iterations = state.ledger.record_submission(user, problem.id).await?;
  if state.completion.is_complete(&analysis) {
    state.ledger.mark_solved(user, problem.id).await?;
  }
  let solved = state.ledger.is_solved(user, problem.id).await?;
  info!(target: "practice", %session_id, problem_id = problem.id, iterations, solved, "Pseudocode evaluated");
  Ok(Submitted { analysis, iterations, solved })
}

/// Verify a walkthrough and append the attempt to the history log.
#[instrument(level = "info", skip(state, walkthrough), fields(text_len = walkthrough.len()))]
pub async fn submit_walkthrough(
  state: &AppState,
  session_id: &str,
  user_id: &str,
  walkthrough: &str,
) -> Result<Walkthrough, PracticeError> {
  if walkthrough.trim().is_empty() {
    return Err(PracticeError::InvalidRequest("walkthrough is empty".into()));
  }
  let (session, set, index) = context(state, session_id, user_id).await?;
  let problem = current_of(&set, index)?;

  let verification = state.analyzer.verify_walkthrough(&problem, walkthrough).await?;

  let iterations = state.ledger.iterations(&session.user_id, problem.id).await?;
  let user_difficulty: Difficulty = classify(iterations);
  let entry = state.ledger.finalize_history(&session.user_id, problem.id, iterations, user_difficulty).await?;
  let comparison_message = comparison_message(entry.user_difficulty, entry.leetcode_difficulty);
  Ok(Walkthrough { verification, entry, comparison_message })
}

/// Move the cursor one step. Past the last problem this reports completion and
/// leaves the reset to the next `start_session`.
#[instrument(level = "info", skip(state))]
pub async fn next_problem(state: &AppState, session_id: &str, user_id: &str) -> Result<Next, PracticeError> {
  let (session, set, _) = context(state, session_id, user_id).await?;
  match state.cursor.advance(&session.user_id, set.len()).await? {
    Advance::Moved(index) => {
      let problem = current_of(&set, index)?;
      let remaining = set.len() - index - 1;
      info!(target: "practice", %session_id, index, remaining, problem_id = problem.id, "Advanced to next problem");
      Ok(Next::Problem { problem, index, remaining })
    }
    Advance::Completed => {
      info!(target: "practice", %session_id, total = set.len(), "Problem set completed");
      Ok(Next::Completed)
    }
  }
}

#[instrument(level = "debug", skip(state))]
pub async fn session_status(state: &AppState, session_id: &str, user_id: &str) -> Result<Status, PracticeError> {
  let (session, set, index) = context(state, session_id, user_id).await?;
  let mut solved = 0;
  for p in set.iter() {
    if state.ledger.is_solved(&session.user_id, p.id).await? {
      solved += 1;
    }
  }
  Ok(Status {
    state: SessionState::for_index(index, set.len()),
    total: set.len(),
    completed: index.min(set.len()),
    solved,
    current: set.get(index).cloned(),
  })
}

/// Drop the ephemeral session. Durable progress is untouched.
#[instrument(level = "info", skip(state))]
pub async fn end_session(state: &AppState, session_id: &str, user_id: &str) -> Result<SessionState, PracticeError> {
  let session = state.sessions.remove(session_id, user_id).await?;
  info!(target: "practice", session_id = %session.id, "Session ended");
  Ok(SessionState::Ended)
}

pub async fn history(state: &AppState, user_id: &str) -> Result<Vec<HistoryEntry>, PracticeError> {
  state.ledger.history(user_id).await
}

#[instrument(level = "info", skip(state))]
pub async fn reference_solution(state: &AppState, problem_id: ProblemId) -> Result<(Problem, String), PracticeError> {
  let problem = state.catalog.get_problem(problem_id).await?;
  let solution = state.analyzer.reference_solution(&problem).await?;
  Ok((problem, solution))
}
