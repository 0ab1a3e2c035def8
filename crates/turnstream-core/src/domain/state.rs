use crate::domain::ledger::{ToolCall, ToolCallLedger};
use crate::domain::types::{
    FragmentId, IdGenerator, MessageId, StepId, ThreadId, Timestamp, ToolCallId, TurnId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningFragment {
    pub id: FragmentId,
    pub text: String,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub created_at: Timestamp,
    pub streaming: bool,
    #[serde(default)]
    pub reasoning: Vec<ReasoningFragment>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    pub fn user(id: MessageId, content: impl Into<String>, created_at: Timestamp) -> Self {
        Self {
            id,
            role: Role::User,
            content: content.into(),
            created_at,
            streaming: false,
            reasoning: Vec::new(),
            tool_calls: Vec::new(),
        }
    }

    pub fn streaming_assistant(id: MessageId, created_at: Timestamp) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: String::new(),
            created_at,
            streaming: true,
            reasoning: Vec::new(),
            tool_calls: Vec::new(),
        }
    }

    /// Visible reasoning trace: fragment texts in arrival order.
    pub fn reasoning_text(&self) -> String {
        self.reasoning.iter().map(|f| f.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepStatus {
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: StepId,
    pub name: String,
    pub status: StepStatus,
    pub started_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
    /// Milliseconds between start and finish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnLifecycle {
    Active,
    Finished,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub thread_id: ThreadId,
    /// Assistant message opened for this turn. Finalization targets this id,
    /// not whatever `streaming_message_id` holds at the time.
    pub message_id: MessageId,
    pub lifecycle: TurnLifecycle,
    pub started_at: Timestamp,
}

impl Turn {
    pub fn is_active(&self) -> bool {
        self.lifecycle == TurnLifecycle::Active
    }
}

/// The aggregate: everything a renderer needs to draw the conversation,
/// including the turn currently in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnState {
    pub thread_id: ThreadId,

    /// Append-only across turns. Shared with published snapshots; a message
    /// is copied only when the reducer changes it.
    pub messages: Vec<Arc<Message>>,

    pub streaming_message_id: Option<MessageId>,

    /// Reasoning fragments of the current turn.
    pub reasoning: Vec<ReasoningFragment>,

    /// Tool calls of the current turn.
    pub tool_calls: ToolCallLedger,

    /// Workflow steps of the current turn.
    pub steps: Vec<WorkflowStep>,

    pub loading: bool,

    /// Last turn-level error. Only [`TurnState::clear_error`] clears it.
    pub error: Option<String>,

    pub turn: Option<Turn>,

    #[serde(skip)]
    pub(crate) ids: IdGenerator,
}

impl TurnState {
    pub fn new(thread_id: ThreadId) -> Self {
        Self::with_ids(thread_id, IdGenerator::new())
    }

    pub fn with_ids(thread_id: ThreadId, ids: IdGenerator) -> Self {
        Self {
            thread_id,
            messages: Vec::new(),
            streaming_message_id: None,
            reasoning: Vec::new(),
            tool_calls: ToolCallLedger::new(),
            steps: Vec::new(),
            loading: false,
            error: None,
            turn: None,
            ids,
        }
    }

    pub fn ids_mut(&mut self) -> &mut IdGenerator {
        &mut self.ids
    }

    pub fn is_turn_active(&self) -> bool {
        self.turn.as_ref().is_some_and(Turn::is_active)
    }

    pub fn active_turn_id(&self) -> Option<&TurnId> {
        self.turn.as_ref().filter(|t| t.is_active()).map(|t| &t.id)
    }

    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| &m.id == id)
            .map(|m| &**m)
    }

    pub(crate) fn message_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        self.messages
            .iter_mut()
            .rev()
            .find(|m| &m.id == id)
            .map(Arc::make_mut)
    }

    pub fn streaming_message(&self) -> Option<&Message> {
        self.streaming_message_id
            .as_ref()
            .and_then(|id| self.message(id))
    }

    pub(crate) fn streaming_message_mut(&mut self) -> Option<&mut Message> {
        let id = self.streaming_message_id.clone()?;
        self.message_mut(&id)
    }

    pub fn last_assistant_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| &**m)
    }

    /// Appends a completed user message and returns its id.
    pub fn push_user_message(&mut self, text: impl Into<String>, at: Timestamp) -> MessageId {
        let id = self.ids.message_id();
        self.messages
            .push(Arc::new(Message::user(id.clone(), text, at)));
        id
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub(crate) fn clear_turn_scratch(&mut self) {
        self.reasoning.clear();
        self.tool_calls.clear();
        self.steps.clear();
    }

    /// Copies one ledger entry into the streaming message so renderers see
    /// every call from its start event on. Entries keep ledger order.
    pub(crate) fn mirror_tool_call(&mut self, id: &ToolCallId) {
        let Some(call) = self.tool_calls.get(id).cloned() else {
            return;
        };
        if let Some(message) = self.streaming_message_mut() {
            match message.tool_calls.iter_mut().find(|c| &c.id == id) {
                Some(existing) => *existing = call,
                None => message.tool_calls.push(call),
            }
        }
    }
}
