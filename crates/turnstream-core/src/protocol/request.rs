//! Body of the run request posted to the agent endpoint.

use crate::domain::state::{Message, Role};
use crate::domain::types::{ThreadId, TurnId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool message content for a call that never produced a result or error.
pub const UNFINISHED_TOOL_CALL: &str = "Tool call did not complete";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireToolCallFunction {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: WireToolCallFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<WireToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// `RunAgentInput`: thread/run ids, conversation so far, tool definitions,
/// shared state and pass-through properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub thread_id: String,
    pub run_id: String,
    pub messages: Vec<WireMessage>,
    #[serde(default)]
    pub tools: Vec<Value>,
    #[serde(default)]
    pub context: Vec<Value>,
    #[serde(default)]
    pub state: Value,
    #[serde(default)]
    pub forwarded_props: Value,
}

impl RunRequest {
    /// Builds the request from conversation history. Streaming (unfinished)
    /// assistant messages are skipped; finished ones carry their tool calls,
    /// and every tool call is answered by a `tool` message (its result, its
    /// error, or [`UNFINISHED_TOOL_CALL`]) so no call id is left dangling.
    pub fn from_history<'a>(
        thread_id: &ThreadId,
        run_id: &TurnId,
        history: impl IntoIterator<Item = &'a Message>,
    ) -> Self {
        let mut messages = Vec::new();

        for message in history.into_iter().filter(|m| !m.streaming) {
            let tool_calls = message
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.0.clone(),
                    kind: "function".to_string(),
                    function: WireToolCallFunction {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                })
                .collect();

            messages.push(WireMessage {
                id: message.id.0.clone(),
                role: message.role,
                content: message.content.clone(),
                tool_calls,
                tool_call_id: None,
            });

            for call in &message.tool_calls {
                let content = match (&call.result, &call.error) {
                    (Some(result), _) => result.clone(),
                    (None, Some(error)) => format!("Error: {error}"),
                    (None, None) => UNFINISHED_TOOL_CALL.to_string(),
                };
                messages.push(WireMessage {
                    id: format!("{}_result", call.id),
                    role: Role::Tool,
                    content,
                    tool_calls: Vec::new(),
                    tool_call_id: Some(call.id.0.clone()),
                });
            }
        }

        Self {
            thread_id: thread_id.0.clone(),
            run_id: run_id.0.clone(),
            messages,
            tools: Vec::new(),
            context: Vec::new(),
            state: Value::Object(serde_json::Map::new()),
            forwarded_props: Value::Object(serde_json::Map::new()),
        }
    }
}
