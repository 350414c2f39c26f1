//! Shared conversation state
//!
//! An append-only log of turns owned by a single run. Sequence indices are
//! assigned on append and never change. Readers get a `Snapshot`, an
//! immutable copy they can hold across awaits without touching the log.

use crate::agent::WorkerResult;
use crate::error::StateError;
use crate::supervisor::DecisionRecord;
use crate::tool::ToolCallRecord;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::Arc;

/// Origin id used for user turns
pub const USER_ORIGIN: &str = "user";
/// Origin id used for turns authored by the orchestrator itself
pub const SUPERVISOR_ORIGIN: &str = "supervisor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
    ToolResult,
    RoutingDecision,
}

/// Turn content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Payload {
    Text(String),
    Result(WorkerResult),
    ToolCall(ToolCallRecord),
    Decision(DecisionRecord),
}

impl Payload {
    /// Human-readable text of the payload, if it has any
    pub fn text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Result(result) => Some(result.message()),
            Payload::ToolCall(_) | Payload::Decision(_) => None,
        }
    }
}

/// A committed entry in the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    seq: u64,
    role: Role,
    origin: String,
    payload: Payload,
}

impl Turn {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The worker result carried by this turn, if any
    pub fn result(&self) -> Option<&WorkerResult> {
        match &self.payload {
            Payload::Result(result) => Some(result),
            _ => None,
        }
    }
}

/// A turn waiting to be appended. Role and payload are optional so that
/// callers assembling turns from untyped input get a `StateError` rather
/// than a panic.
#[derive(Debug, Clone)]
pub struct NewTurn {
    pub role: Option<Role>,
    pub origin: String,
    pub payload: Option<Payload>,
}

impl NewTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some(Role::User),
            origin: USER_ORIGIN.to_string(),
            payload: Some(Payload::Text(text.into())),
        }
    }

    pub fn agent(result: WorkerResult) -> Self {
        Self {
            role: Some(Role::Agent),
            origin: result.worker().as_str().to_string(),
            payload: Some(Payload::Result(result)),
        }
    }

    pub fn tool_result(origin: &str, call: ToolCallRecord) -> Self {
        Self {
            role: Some(Role::ToolResult),
            origin: origin.to_string(),
            payload: Some(Payload::ToolCall(call)),
        }
    }

    pub fn decision(record: DecisionRecord) -> Self {
        Self {
            role: Some(Role::RoutingDecision),
            origin: SUPERVISOR_ORIGIN.to_string(),
            payload: Some(Payload::Decision(record)),
        }
    }

    /// Orchestrator-authored message (abort diagnostics)
    pub fn diagnostic(text: impl Into<String>) -> Self {
        Self {
            role: Some(Role::Agent),
            origin: SUPERVISOR_ORIGIN.to_string(),
            payload: Some(Payload::Text(text.into())),
        }
    }
}

/// Immutable view of the log at a point in time
#[derive(Debug, Clone)]
pub struct Snapshot {
    turns: Arc<[Turn]>,
}

impl Snapshot {
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }
}

impl Deref for Snapshot {
    type Target = [Turn];

    fn deref(&self) -> &[Turn] {
        &self.turns
    }
}

/// The canonical log
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from history returned by an earlier run
    pub fn from_history(turns: Vec<Turn>) -> Result<Self, StateError> {
        for (expected, turn) in turns.iter().enumerate() {
            if turn.seq != expected as u64 {
                return Err(StateError::OutOfSequence {
                    expected: expected as u64,
                    found: turn.seq,
                });
            }
            if turn.origin.trim().is_empty() {
                return Err(StateError::EmptyOrigin);
            }
        }
        Ok(Self { turns })
    }

    /// Append a turn, assigning the next sequence index
    pub fn append(&mut self, turn: NewTurn) -> Result<&Turn, StateError> {
        let role = turn.role.ok_or(StateError::MissingRole)?;
        let payload = turn.payload.ok_or(StateError::MissingPayload)?;
        if turn.origin.trim().is_empty() {
            return Err(StateError::EmptyOrigin);
        }

        let seq = self.turns.len() as u64;
        self.turns.push(Turn {
            seq,
            role,
            origin: turn.origin,
            payload,
        });
        Ok(&self.turns[self.turns.len() - 1])
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            turns: Arc::from(self.turns.as_slice()),
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_assigns_sequence() {
        let mut conv = Conversation::new();
        assert_eq!(conv.append(NewTurn::user("hello")).unwrap().seq(), 0);
        assert_eq!(conv.append(NewTurn::user("again")).unwrap().seq(), 1);
        assert_eq!(conv.len(), 2);
    }

    #[test]
    fn test_append_rejects_malformed_turns() {
        let mut conv = Conversation::new();

        let mut turn = NewTurn::user("x");
        turn.role = None;
        assert_eq!(conv.append(turn).unwrap_err(), StateError::MissingRole);

        let mut turn = NewTurn::user("x");
        turn.payload = None;
        assert_eq!(conv.append(turn).unwrap_err(), StateError::MissingPayload);

        let mut turn = NewTurn::user("x");
        turn.origin = "  ".into();
        assert_eq!(conv.append(turn).unwrap_err(), StateError::EmptyOrigin);

        assert!(conv.is_empty());
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_appends() {
        let mut conv = Conversation::new();
        conv.append(NewTurn::user("first")).unwrap();
        let snapshot = conv.snapshot();
        conv.append(NewTurn::user("second")).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].payload().text(), Some("first"));
        assert_eq!(conv.snapshot().len(), 2);
    }

    #[test]
    fn test_from_history_checks_sequence() {
        let mut conv = Conversation::new();
        conv.append(NewTurn::user("a")).unwrap();
        conv.append(NewTurn::user("b")).unwrap();
        let mut turns = conv.into_turns();

        let restored = Conversation::from_history(turns.clone()).unwrap();
        assert_eq!(restored.len(), 2);

        turns.remove(0);
        assert_eq!(
            Conversation::from_history(turns).unwrap_err(),
            StateError::OutOfSequence {
                expected: 0,
                found: 1
            }
        );
    }

    #[test]
    fn test_turn_serde_shape() {
        let mut conv = Conversation::new();
        conv.append(NewTurn::user("hi")).unwrap();
        let json = serde_json::to_value(&conv.snapshot()[0]).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["payload"]["kind"], "text");
        assert_eq!(json["payload"]["body"], "hi");

        let back: Turn = serde_json::from_value(json).unwrap();
        assert_eq!(back.seq(), 0);
    }
}
