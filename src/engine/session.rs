//! Per-user conversation state.
//!
//! Sessions live only in process memory; a restart drops them and the
//! user simply restarts the flow.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::store::Student;

/// The steps of the request conversation.
///
/// The legacy design also carried a `code_verified` step that was never
/// transitioned into or out of; it is omitted here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Idle,
    WaitingName,
    SelectingStudent,
    WaitingDestination,
    HasExistingChoice,
    WaitingCode,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::WaitingName => "waiting_name",
            Self::SelectingStudent => "selecting_student",
            Self::WaitingDestination => "waiting_destination",
            Self::HasExistingChoice => "has_existing_choice",
            Self::WaitingCode => "waiting_code",
        };
        write!(f, "{s}")
    }
}

/// Per-user conversation state, mutated in place by every inbound event.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Current step.
    pub step: Step,
    /// Candidate students, present only while `selecting_student`.
    pub candidates: Vec<Student>,
    /// The student being acted upon, present from
    /// `waiting_destination`/`has_existing_choice` onward.
    pub selected: Option<Student>,
    /// Existing destination shown to the user when a conflict is detected.
    pub current_destination: Option<String>,
}

impl Session {
    /// Back to `idle` with all transient state dropped.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Session state keyed by user identifier.
///
/// Each session sits behind its own mutex so that concurrent events for
/// the same user are serialized (the state machine is not reentrant),
/// while different users proceed independently. The outer lock is held
/// only long enough to fetch or create the entry.
pub struct SessionMap {
    inner: Mutex<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionMap {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Handle for `user_id`, created at `idle` on first contact.
    pub async fn entry(&self, user_id: &str) -> Arc<Mutex<Session>> {
        let mut map = self.inner.lock().await;
        Arc::clone(map.entry(user_id.to_string()).or_default())
    }

    /// Current step for a user, if a session exists.
    pub async fn step_of(&self, user_id: &str) -> Option<Step> {
        let handle = {
            let map = self.inner.lock().await;
            map.get(user_id).cloned()
        };
        match handle {
            Some(session) => Some(session.lock().await.step),
            None => None,
        }
    }
}

impl Default for SessionMap {
    fn default() -> Self {
        Self::new()
    }
}
