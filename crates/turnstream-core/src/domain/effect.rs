use crate::domain::types::TurnId;
use serde::{Deserialize, Serialize};

/// How a turn ended, as seen by the caller that submitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TurnOutcome {
    Completed,
    Failed { message: String },
    Cancelled,
}

impl TurnOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TurnOutcome::Completed)
    }
}

/// Follow-up work the reducer asks its owner to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// The active turn reached a terminal state.
    TurnResolved {
        turn_id: TurnId,
        outcome: TurnOutcome,
    },
}

impl Effect {
    pub fn into_outcome(self) -> Option<(TurnId, TurnOutcome)> {
        match self {
            Effect::TurnResolved { turn_id, outcome } => Some((turn_id, outcome)),
        }
    }
}
