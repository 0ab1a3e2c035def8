pub mod effect;
pub mod event;
pub mod ledger;
pub mod reduce;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;

pub use effect::{Effect, TurnOutcome};
pub use event::{StampedEvent, TurnEvent};
pub use ledger::{ToolCall, ToolCallLedger, ToolCallStatus};
pub use reduce::reduce;
pub use state::{
    Message, ReasoningFragment, Role, StepStatus, Turn, TurnLifecycle, TurnState, WorkflowStep,
};
pub use types::{
    FragmentId, IdGenerator, MessageId, NonEmptyString, StepId, ThreadId, Timestamp, ToolCallId,
    TurnId,
};
