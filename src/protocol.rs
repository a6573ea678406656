//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::cursor::SessionState;
use crate::domain::{Difficulty, HistoryEntry, Problem, ProblemId};
use crate::logic::{Next, Started, Status, Submitted, Walkthrough};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    StartSession {
        #[serde(default, rename = "problemCount")]
        problem_count: Option<usize>,
    },
    Current {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    SubmitPseudocode {
        #[serde(rename = "sessionId")]
        session_id: String,
        pseudocode: String,
        #[serde(default, rename = "problemId")]
        problem_id: Option<ProblemId>,
    },
    SubmitWalkthrough {
        #[serde(rename = "sessionId")]
        session_id: String,
        walkthrough: String,
    },
    NextProblem {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Status {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    EndSession {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

impl ClientWsMessage {
    /// Wire tag, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientWsMessage::Ping => "ping",
            ClientWsMessage::StartSession { .. } => "start_session",
            ClientWsMessage::Current { .. } => "current",
            ClientWsMessage::SubmitPseudocode { .. } => "submit_pseudocode",
            ClientWsMessage::SubmitWalkthrough { .. } => "submit_walkthrough",
            ClientWsMessage::NextProblem { .. } => "next_problem",
            ClientWsMessage::Status { .. } => "status",
            ClientWsMessage::EndSession { .. } => "end_session",
        }
    }

    /// Length of the submitted text, if the message carries any. The text itself is never logged.
    pub fn text_len(&self) -> usize {
        match self {
            ClientWsMessage::SubmitPseudocode { pseudocode, .. } => pseudocode.len(),
            ClientWsMessage::SubmitWalkthrough { walkthrough, .. } => walkthrough.len(),
            _ => 0,
        }
    }
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    SessionStarted(StartOut),
    Current(CurrentOut),
    PseudocodeResult(SubmitOut),
    WalkthroughResult(WalkthroughOut),
    NextProblem(NextOut),
    Status(StatusOut),
    SessionEnded(EndOut),
    Error {
        code: &'static str,
        message: String,
        retryable: bool,
    },
}

//
// HTTP request/response DTOs (also embedded in WS replies)
//

#[derive(Debug, Deserialize)]
pub struct StartQuery {
    pub problem_count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct StartOut {
    pub session_id: String,
    pub current_problem: Problem,
    pub current_index: usize,
    pub total_problems: usize,
}

impl From<Started> for StartOut {
    fn from(s: Started) -> Self {
        Self { session_id: s.session.id, current_problem: s.problem, current_index: s.index, total_problems: s.total }
    }
}

#[derive(Debug, Serialize)]
pub struct CurrentOut {
    pub problem: Problem,
    pub index: usize,
    pub total_problems: usize,
}

#[derive(Debug, Deserialize)]
pub struct PseudocodeIn {
    #[serde(default)]
    pub problem_id: Option<ProblemId>,
    pub pseudocode: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitOut {
    pub analysis: String,
    pub iterations: u32,
    pub problem_solved: bool,
}

impl From<Submitted> for SubmitOut {
    fn from(s: Submitted) -> Self {
        Self { analysis: s.analysis, iterations: s.iterations, problem_solved: s.solved }
    }
}

#[derive(Debug, Deserialize)]
pub struct WalkthroughIn {
    pub walkthrough: String,
}

#[derive(Debug, Serialize)]
pub struct WalkthroughOut {
    pub verification: String,
    pub iterations: u32,
    pub user_difficulty: Difficulty,
    pub leetcode_difficulty: Difficulty,
    pub comparison_message: String,
}

impl From<Walkthrough> for WalkthroughOut {
    fn from(w: Walkthrough) -> Self {
        Self {
            verification: w.verification,
            iterations: w.entry.iterations,
            user_difficulty: w.entry.user_difficulty,
            leetcode_difficulty: w.entry.leetcode_difficulty,
            comparison_message: w.comparison_message,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NextOut {
    Success {
        problem: Problem,
        index: usize,
        remaining_problems: usize,
    },
    Completed {
        message: String,
        problem: Option<Problem>,
    },
}

impl From<Next> for NextOut {
    fn from(n: Next) -> Self {
        match n {
            Next::Problem { problem, index, remaining } => NextOut::Success { problem, index, remaining_problems: remaining },
            Next::Completed => NextOut::Completed { message: "All problems completed".into(), problem: None },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusOut {
    #[serde(flatten)]
    pub state: SessionState,
    pub total_problems: usize,
    pub completed_problems: usize,
    pub solved_problems: usize,
    pub current_problem: Option<Problem>,
}

impl From<Status> for StatusOut {
    fn from(s: Status) -> Self {
        Self {
            state: s.state,
            total_problems: s.total,
            completed_problems: s.completed,
            solved_problems: s.solved,
            current_problem: s.current,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EndOut {
    pub message: String,
    #[serde(flatten)]
    pub state: SessionState,
}

impl From<SessionState> for EndOut {
    fn from(state: SessionState) -> Self {
        Self { message: "Session ended successfully".into(), state }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryOut {
    pub attempts: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
pub struct SolutionOut {
    pub problem_id: ProblemId,
    pub title: String,
    pub solution: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
