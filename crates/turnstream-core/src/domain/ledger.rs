//! Tool-call ledger: the keyed, insertion-ordered set of tool calls that
//! belong to the current turn.

use crate::domain::types::ToolCallId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Display lifecycle of a tool call. Execution happens remotely; this only
/// tracks what the stream has told us so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    Executing,
    Completed,
    Error,
}

impl ToolCallStatus {
    fn rank(self) -> u8 {
        match self {
            ToolCallStatus::Pending => 0,
            ToolCallStatus::Executing => 1,
            ToolCallStatus::Completed | ToolCallStatus::Error => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ToolCallStatus::Completed | ToolCallStatus::Error)
    }

    /// Returns the status after attempting to move to `next`. Moves that
    /// would go backwards, or leave a terminal state, keep `self`.
    pub fn advance(self, next: ToolCallStatus) -> ToolCallStatus {
        if self.is_terminal() || next.rank() < self.rank() {
            self
        } else {
            next
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: ToolCallId,
    pub name: String,
    /// Concatenation of every argument delta, in arrival order.
    pub arguments: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status: ToolCallStatus,
}

impl ToolCall {
    pub fn new(id: ToolCallId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            arguments: String::new(),
            result: None,
            error: None,
            status: ToolCallStatus::Pending,
        }
    }

    /// Arguments parsed as JSON, once enough of them have streamed in.
    pub fn parsed_arguments(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.arguments).ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolCallLedger {
    calls: IndexMap<ToolCallId, ToolCall>,
}

impl ToolCallLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn get(&self, id: &ToolCallId) -> Option<&ToolCall> {
        self.calls.get(id)
    }

    pub fn contains(&self, id: &ToolCallId) -> bool {
        self.calls.contains_key(id)
    }

    /// Calls in the order their start events arrived.
    pub fn iter(&self) -> impl Iterator<Item = &ToolCall> {
        self.calls.values()
    }

    pub fn to_vec(&self) -> Vec<ToolCall> {
        self.calls.values().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    /// Registers a new call. A second start for the same id replaces the
    /// first one but keeps its original position.
    pub fn start(&mut self, id: ToolCallId, name: impl Into<String>) {
        let call = ToolCall::new(id.clone(), name);
        if self.calls.insert(id, call).is_some() {
            tracing::debug!(target: "turnstream::ledger", "Duplicate tool call start replaced an existing entry");
        }
    }

    /// Appends an argument fragment. Returns false for unknown ids.
    pub fn append_arguments(&mut self, id: &ToolCallId, delta: &str) -> bool {
        let Some(call) = self.calls.get_mut(id) else {
            return false;
        };
        call.arguments.push_str(delta);
        call.status = call.status.advance(ToolCallStatus::Executing);
        true
    }

    /// Records a result. Returns false for unknown ids or calls that have
    /// already reached a terminal state.
    pub fn complete(&mut self, id: &ToolCallId, result: String) -> bool {
        let Some(call) = self.calls.get_mut(id) else {
            return false;
        };
        if call.status.is_terminal() {
            return false;
        }
        call.result = Some(result);
        call.status = ToolCallStatus::Completed;
        true
    }

    /// Records a failure. Same rules as [`ToolCallLedger::complete`].
    pub fn fail(&mut self, id: &ToolCallId, error: String) -> bool {
        let Some(call) = self.calls.get_mut(id) else {
            return false;
        };
        if call.status.is_terminal() {
            return false;
        }
        call.error = Some(error);
        call.status = ToolCallStatus::Error;
        true
    }
}
