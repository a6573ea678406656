//! WebSocket upgrade + message loop. The caller authenticates once on upgrade; each
//! client message is parsed as JSON and forwarded to core logic. We reply with a
//! single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use crate::auth::AuthUser;
use crate::domain::UserId;
use crate::error::PracticeError;
use crate::logic;
use crate::protocol::{ClientWsMessage, CurrentOut, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state, ws, user))]
pub async fn ws_upgrade(
  ws: WebSocketUpgrade,
  State(state): State<Arc<AppState>>,
  AuthUser(user): AuthUser,
) -> impl IntoResponse {
  info!(target: "leetcoach_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state, user))
}

/// What the loop does with one incoming frame.
#[derive(Debug)]
enum Reply {
  Send(Message),
  Close,
  Ignore,
}

#[instrument(level = "info", skip(socket, state, user))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, user: UserId) {
  info!(target: "leetcoach_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match reply_to(msg, &state, &user).await {
      Reply::Send(out) => {
        if let Err(e) = socket.send(out).await {
          error!(target: "leetcoach_backend", error = %e, "WS send error");
          break;
        }
      }
      Reply::Close => break,
      Reply::Ignore => {}
    }
  }
  info!(target: "leetcoach_backend", "WebSocket disconnected");
}

async fn reply_to(msg: Message, state: &AppState, user: &str) -> Reply {
  match msg {
    Message::Text(txt) => {
      // Parse, dispatch, serialize response.
      let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
        Ok(incoming) => {
          debug!(target: "leetcoach_backend", kind = incoming.kind(), text_len = incoming.text_len(), "WS received");
          handle_client_ws(incoming, state, user).await
        }
        Err(e) => {
          debug!(target: "leetcoach_backend", len = txt.len(), "WS invalid JSON");
          ServerWsMessage::Error { code: "invalid_request", message: format!("Invalid JSON: {}", e), retryable: false }
        }
      };

      let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
        serde_json::json!({ "type": "error", "code": "serialization", "message": format!("Serialization error: {}", e) }).to_string()
      });
      Reply::Send(Message::Text(out))
    }
    Message::Ping(payload) => Reply::Send(Message::Pong(payload)),
    Message::Close(_) => Reply::Close,
    _ => Reply::Ignore,
  }
}

fn ws_error(e: PracticeError) -> ServerWsMessage {
  ServerWsMessage::Error { code: e.code(), message: e.to_string(), retryable: e.is_retryable() }
}

#[instrument(level = "info", skip(msg, state, user), fields(kind = msg.kind(), text_len = msg.text_len()))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, user: &str) -> ServerWsMessage {
  let result = match msg {
    ClientWsMessage::Ping => Ok(ServerWsMessage::Pong),

    ClientWsMessage::StartSession { problem_count } => logic::start_session(state, user, problem_count)
      .await
      .map(|s| ServerWsMessage::SessionStarted(s.into())),

    ClientWsMessage::Current { session_id } => logic::current_problem(state, &session_id, user)
      .await
      .map(|(problem, index, total_problems)| ServerWsMessage::Current(CurrentOut { problem, index, total_problems })),

    ClientWsMessage::SubmitPseudocode { session_id, pseudocode, problem_id } => {
      logic::submit_pseudocode(state, &session_id, user, &pseudocode, problem_id)
        .await
        .map(|s| ServerWsMessage::PseudocodeResult(s.into()))
    }

    ClientWsMessage::SubmitWalkthrough { session_id, walkthrough } => {
      logic::submit_walkthrough(state, &session_id, user, &walkthrough)
        .await
        .map(|w| ServerWsMessage::WalkthroughResult(w.into()))
    }

    ClientWsMessage::NextProblem { session_id } => logic::next_problem(state, &session_id, user)
      .await
      .map(|n| ServerWsMessage::NextProblem(n.into())),

    ClientWsMessage::Status { session_id } => logic::session_status(state, &session_id, user)
      .await
      .map(|s| ServerWsMessage::Status(s.into())),

    ClientWsMessage::EndSession { session_id } => logic::end_session(state, &session_id, user)
      .await
      .map(|s| ServerWsMessage::SessionEnded(s.into())),
  };
  result.unwrap_or_else(ws_error)
}

#[cfg(test)]
mod tests {
  use std::{
    io,
    sync::{Arc as StdArc, Mutex},
  };

  use super::*;
  use crate::domain::Difficulty;
  use crate::testing::{problem, test_state, ScriptedAnalyzer};

  #[derive(Clone, Default)]
  struct LogBuffer(StdArc<Mutex<Vec<u8>>>);

  impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
      self.0.lock().unwrap().extend_from_slice(buf);
      Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
      Ok(())
    }
  }

  impl LogBuffer {
    fn contents(&self) -> String {
      String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
  }

  #[tokio::test]
  async fn submitted_text_never_reaches_logs() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
      .with_max_level(tracing::Level::TRACE)
      .with_ansi(false)
      .with_writer(move || writer.clone())
      .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let state = test_state(vec![problem(1, Difficulty::Easy)], ScriptedAnalyzer::replying("logic is sound")).await;
    let started = handle_client_ws(ClientWsMessage::StartSession { problem_count: Some(1) }, &state, "u").await;
    let session_id = match started {
      ServerWsMessage::SessionStarted(s) => s.session_id,
      other => panic!("unexpected {:?}", other),
    };

    let frame = serde_json::json!({
      "type": "submit_pseudocode",
      "sessionId": session_id,
      "pseudocode": "SECRET_SKETCH_TEXT",
    })
    .to_string();
    assert!(matches!(reply_to(Message::Text(frame), &state, "u").await, Reply::Send(Message::Text(_))));
    let walk = serde_json::json!({
      "type": "submit_walkthrough",
      "sessionId": session_id,
      "walkthrough": "SECRET_WALKTHROUGH",
    })
    .to_string();
    reply_to(Message::Text(walk), &state, "u").await;
    reply_to(Message::Text("SECRET_GARBAGE {".into()), &state, "u").await;

    let out = logs.contents();
    assert!(out.contains("text_len=18"), "{}", out);
    assert!(!out.contains("SECRET"), "{}", out);
  }

  #[tokio::test]
  async fn control_frames_map_to_replies() {
    let state = test_state(vec![problem(1, Difficulty::Easy)], ScriptedAnalyzer::replying("ok")).await;
    match reply_to(Message::Ping(vec![1, 2]), &state, "u").await {
      Reply::Send(Message::Pong(p)) => assert_eq!(p, vec![1, 2]),
      other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(reply_to(Message::Close(None), &state, "u").await, Reply::Close));
    assert!(matches!(reply_to(Message::Binary(vec![0]), &state, "u").await, Reply::Ignore));
  }

  #[tokio::test]
  async fn ws_dispatch_runs_the_session_machine() {
    let state = test_state(vec![problem(1, Difficulty::Easy)], ScriptedAnalyzer::replying("logic is sound")).await;

    let started = handle_client_ws(ClientWsMessage::StartSession { problem_count: Some(1) }, &state, "u").await;
    let session_id = match started {
      ServerWsMessage::SessionStarted(s) => s.session_id,
      other => panic!("unexpected {:?}", other),
    };

    let submitted = handle_client_ws(
      ClientWsMessage::SubmitPseudocode { session_id: session_id.clone(), pseudocode: "scan".into(), problem_id: Some(1) },
      &state,
      "u",
    )
    .await;
    assert!(matches!(submitted, ServerWsMessage::PseudocodeResult(ref s) if s.problem_solved && s.iterations == 1));

    let next = handle_client_ws(ClientWsMessage::NextProblem { session_id: session_id.clone() }, &state, "u").await;
    let json = serde_json::to_value(&next).unwrap();
    assert_eq!(json["type"], "next_problem");
    assert_eq!(json["status"], "completed");
  }

  #[tokio::test]
  async fn ws_errors_carry_stable_codes() {
    let state = test_state(vec![problem(1, Difficulty::Easy)], ScriptedAnalyzer::replying("ok")).await;
    let reply = handle_client_ws(ClientWsMessage::Status { session_id: "missing".into() }, &state, "u").await;
    assert!(matches!(reply, ServerWsMessage::Error { code: "session_not_found", .. }));
  }
}
