use crate::domain::types::{Timestamp, ToolCallId, TurnId};
use serde::{Deserialize, Serialize};

/// Canonical event set the reducer understands.
///
/// Every wire event is mapped onto one of these (or dropped) by
/// [`crate::protocol::normalize`] before it reaches the reducer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// A turn began. The driver supplies `turn_id` when it opens a turn;
    /// the wire acknowledgement carries none.
    TurnStarted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        turn_id: Option<TurnId>,
    },

    TurnFinished,

    TurnFailed {
        message: String,
    },

    TextDelta {
        delta: String,
    },

    ReasoningDelta {
        delta: String,
    },

    ToolCallStarted {
        id: ToolCallId,
        name: String,
    },

    ToolCallArgsDelta {
        id: ToolCallId,
        delta: String,
    },

    ToolCallResult {
        id: ToolCallId,
        result: String,
    },

    ToolCallFailed {
        id: ToolCallId,
        error: String,
    },

    StepStarted {
        name: String,
    },

    StepFinished {
        name: String,
    },
}

impl TurnEvent {
    pub fn started() -> Self {
        TurnEvent::TurnStarted { turn_id: None }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TurnEvent::TurnFinished | TurnEvent::TurnFailed { .. }
        )
    }

    pub fn tool_call_id(&self) -> Option<&ToolCallId> {
        match self {
            TurnEvent::ToolCallStarted { id, .. }
            | TurnEvent::ToolCallArgsDelta { id, .. }
            | TurnEvent::ToolCallResult { id, .. }
            | TurnEvent::ToolCallFailed { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TurnEvent::TurnStarted { .. } => "turn_started",
            TurnEvent::TurnFinished => "turn_finished",
            TurnEvent::TurnFailed { .. } => "turn_failed",
            TurnEvent::TextDelta { .. } => "text_delta",
            TurnEvent::ReasoningDelta { .. } => "reasoning_delta",
            TurnEvent::ToolCallStarted { .. } => "tool_call_started",
            TurnEvent::ToolCallArgsDelta { .. } => "tool_call_args_delta",
            TurnEvent::ToolCallResult { .. } => "tool_call_result",
            TurnEvent::ToolCallFailed { .. } => "tool_call_failed",
            TurnEvent::StepStarted { .. } => "step_started",
            TurnEvent::StepFinished { .. } => "step_finished",
        }
    }
}

/// A canonical event plus the time the driver accepted it.
///
/// The reducer never reads a clock; everything time-dependent comes from
/// `at`, so replaying the same stamped sequence reproduces the same state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampedEvent {
    pub event: TurnEvent,
    pub at: Timestamp,
}

impl StampedEvent {
    pub fn new(event: TurnEvent, at: Timestamp) -> Self {
        Self { event, at }
    }
}
