//! Event normalizer: maps aliased, loosely shaped wire events onto the
//! closed [`TurnEvent`] set. All field probing happens here; the reducer
//! only ever sees canonical events.

use crate::domain::event::TurnEvent;
use crate::domain::types::ToolCallId;
use crate::protocol::raw::RawEvent;

const ERROR_MESSAGE_FIELDS: &[&str] = &["message", "error", "detail"];
const TEXT_DELTA_FIELDS: &[&str] = &["delta", "content", "text"];
const REASONING_DELTA_FIELDS: &[&str] = &["delta", "content", "text", "thinking", "reasoning"];
const TOOL_CALL_ID_FIELDS: &[&str] = &["toolCallId", "tool_call_id", "id"];
const TOOL_CALL_NAME_FIELDS: &[&str] = &["toolCallName", "tool_call_name", "name"];
const TOOL_ARGS_FIELDS: &[&str] = &["delta", "args", "arguments"];
const TOOL_RESULT_FIELDS: &[&str] = &["result", "content", "output"];
const TOOL_ERROR_FIELDS: &[&str] = &["error"];
const TOOL_ERROR_FLAGS: &[&str] = &["isError", "is_error"];
const STEP_NAME_FIELDS: &[&str] = &["stepName", "step_name", "name"];

const REASONING_MARKERS: &[&str] = &["THINKING", "REASONING"];

const DEFAULT_ERROR_MESSAGE: &str = "Unknown error";
const DEFAULT_TOOL_NAME: &str = "unknown";

/// Produces zero or one canonical event for a wire event. Unknown tags and
/// events missing their payload are dropped.
pub fn normalize(raw: &RawEvent) -> Option<TurnEvent> {
    let tag = canonical_tag(&raw.kind);

    let event = if REASONING_MARKERS.iter().any(|m| tag.contains(m)) {
        raw.first_str(REASONING_DELTA_FIELDS)
            .map(|delta| TurnEvent::ReasoningDelta {
                delta: delta.to_string(),
            })
    } else {
        match tag.as_str() {
            "RUN_STARTED" => Some(TurnEvent::started()),
            "RUN_FINISHED" => Some(TurnEvent::TurnFinished),
            "RUN_ERROR" => Some(TurnEvent::TurnFailed {
                message: raw
                    .first_text(ERROR_MESSAGE_FIELDS)
                    .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
            }),

            "TEXT_MESSAGE_CONTENT" | "TEXT_MESSAGE_CHUNK" | "TEXT_DELTA" => raw
                .first_str(TEXT_DELTA_FIELDS)
                .map(|delta| TurnEvent::TextDelta {
                    delta: delta.to_string(),
                }),

            "TOOL_CALL_START" => tool_call_id(raw).map(|id| TurnEvent::ToolCallStarted {
                id,
                name: raw
                    .first_str(TOOL_CALL_NAME_FIELDS)
                    .unwrap_or(DEFAULT_TOOL_NAME)
                    .to_string(),
            }),

            "TOOL_CALL_ARGS" | "TOOL_CALL_CHUNK" => {
                let id = tool_call_id(raw)?;
                raw.first_text(TOOL_ARGS_FIELDS)
                    .map(|delta| TurnEvent::ToolCallArgsDelta { id, delta })
            }

            "TOOL_CALL_END" | "TOOL_CALL_RESULT" => tool_call_outcome(raw),

            "STEP_STARTED" => raw
                .first_str(STEP_NAME_FIELDS)
                .map(|name| TurnEvent::StepStarted {
                    name: name.to_string(),
                }),
            "STEP_FINISHED" => raw
                .first_str(STEP_NAME_FIELDS)
                .map(|name| TurnEvent::StepFinished {
                    name: name.to_string(),
                }),

            _ => None,
        }
    };

    if event.is_none() {
        tracing::trace!(target: "turnstream::normalize", tag = %raw.kind, "Dropped wire event");
    }
    event
}

/// Upper-cases the tag and folds `-`, `.` and spaces to `_`, so
/// `text-message-content` and `TEXT_MESSAGE_CONTENT` match the same arm.
fn canonical_tag(kind: &str) -> String {
    kind.trim()
        .chars()
        .map(|c| match c {
            '-' | '.' | ' ' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

fn tool_call_id(raw: &RawEvent) -> Option<ToolCallId> {
    raw.first_text(TOOL_CALL_ID_FIELDS).map(ToolCallId::from)
}

/// End-of-call and result tags both may carry the outcome. Without one the
/// call stays open until a later result event arrives.
fn tool_call_outcome(raw: &RawEvent) -> Option<TurnEvent> {
    let id = tool_call_id(raw)?;

    if let Some(error) = raw.first_message(TOOL_ERROR_FIELDS) {
        return Some(TurnEvent::ToolCallFailed { id, error });
    }

    let result = raw.first_text(TOOL_RESULT_FIELDS)?;
    if raw.flag(TOOL_ERROR_FLAGS) {
        Some(TurnEvent::ToolCallFailed { id, error: result })
    } else {
        Some(TurnEvent::ToolCallResult { id, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawEvent {
        serde_json::from_value(value).unwrap()
    }

    #[rstest]
    #[case(json!({"type": "THINKING_TEXT_MESSAGE_CONTENT", "delta": "step 1"}))]
    #[case(json!({"type": "REASONING_DELTA", "content": "step 1"}))]
    #[case(json!({"type": "thinking_content", "text": "step 1"}))]
    #[case(json!({"type": "REASONING_MESSAGE_CONTENT", "delta": "", "reasoning": "step 1"}))]
    fn reasoning_aliases(#[case] value: serde_json::Value) {
        assert_eq!(
            normalize(&raw(value)),
            Some(TurnEvent::ReasoningDelta {
                delta: "step 1".into()
            })
        );
    }

    #[rstest]
    #[case("THINKING_START")]
    #[case("THINKING_END")]
    #[case("THINKING_TEXT_MESSAGE_START")]
    fn reasoning_markers_without_payload_are_dropped(#[case] tag: &str) {
        assert_eq!(normalize(&RawEvent::new(tag)), None);
    }

    #[rstest]
    #[case(json!({"type": "TEXT_MESSAGE_CONTENT", "messageId": "m", "delta": "Hel"}))]
    #[case(json!({"type": "TEXT_MESSAGE_CHUNK", "content": "Hel"}))]
    #[case(json!({"type": "text-message-content", "text": "Hel"}))]
    fn text_aliases(#[case] value: serde_json::Value) {
        assert_eq!(
            normalize(&raw(value)),
            Some(TurnEvent::TextDelta { delta: "Hel".into() })
        );
    }

    #[test]
    fn run_lifecycle() {
        assert_eq!(
            normalize(&raw(json!({"type": "RUN_STARTED", "threadId": "t", "runId": "r"}))),
            Some(TurnEvent::started())
        );
        assert_eq!(
            normalize(&raw(json!({"type": "RUN_FINISHED"}))),
            Some(TurnEvent::TurnFinished)
        );
        assert_eq!(
            normalize(&raw(json!({"type": "RUN_ERROR", "message": "rate limited"}))),
            Some(TurnEvent::TurnFailed {
                message: "rate limited".into()
            })
        );
        assert_eq!(
            normalize(&raw(json!({"type": "RUN_ERROR"}))),
            Some(TurnEvent::TurnFailed {
                message: "Unknown error".into()
            })
        );
    }

    #[rstest]
    #[case(json!({"type": "TOOL_CALL_START", "toolCallId": "t1", "toolCallName": "calculate", "parentMessageId": "m"}))]
    #[case(json!({"type": "TOOL_CALL_START", "tool_call_id": "t1", "tool_call_name": "calculate"}))]
    #[case(json!({"type": "TOOL_CALL_START", "id": "t1", "name": "calculate"}))]
    fn tool_start_aliases(#[case] value: serde_json::Value) {
        assert_eq!(
            normalize(&raw(value)),
            Some(TurnEvent::ToolCallStarted {
                id: "t1".into(),
                name: "calculate".into()
            })
        );
    }

    #[test]
    fn tool_start_without_id_is_dropped() {
        assert_eq!(
            normalize(&raw(json!({"type": "TOOL_CALL_START", "toolCallName": "calculate"}))),
            None
        );
    }

    #[test]
    fn tool_args_delta() {
        assert_eq!(
            normalize(&raw(
                json!({"type": "TOOL_CALL_ARGS", "toolCallId": "t1", "delta": "{\"expression\":"})
            )),
            Some(TurnEvent::ToolCallArgsDelta {
                id: "t1".into(),
                delta: "{\"expression\":".into()
            })
        );
    }

    #[rstest]
    #[case(json!({"type": "TOOL_CALL_END", "toolCallId": "t1", "result": "4"}))]
    #[case(json!({"type": "TOOL_CALL_RESULT", "toolCallId": "t1", "messageId": "m", "content": "4"}))]
    #[case(json!({"type": "TOOL_CALL_RESULT", "tool_call_id": "t1", "output": "4"}))]
    #[case(json!({"type": "TOOL_CALL_RESULT", "toolCallId": "t1", "content": "4", "error": false}))]
    #[case(json!({"type": "TOOL_CALL_RESULT", "toolCallId": "t1", "content": "4", "error": null}))]
    #[case(json!({"type": "TOOL_CALL_END", "toolCallId": "t1", "result": "4", "error": 0}))]
    fn tool_result_aliases(#[case] value: serde_json::Value) {
        assert_eq!(
            normalize(&raw(value)),
            Some(TurnEvent::ToolCallResult {
                id: "t1".into(),
                result: "4".into()
            })
        );
    }

    #[test]
    fn tool_end_without_result_emits_nothing() {
        assert_eq!(
            normalize(&raw(json!({"type": "TOOL_CALL_END", "toolCallId": "t1"}))),
            None
        );
    }

    #[test]
    fn tool_errors() {
        assert_eq!(
            normalize(&raw(
                json!({"type": "TOOL_CALL_END", "toolCallId": "t1", "error": "timeout"})
            )),
            Some(TurnEvent::ToolCallFailed {
                id: "t1".into(),
                error: "timeout".into()
            })
        );
        assert_eq!(
            normalize(&raw(
                json!({"type": "TOOL_CALL_RESULT", "toolCallId": "t1", "content": "denied", "isError": true})
            )),
            Some(TurnEvent::ToolCallFailed {
                id: "t1".into(),
                error: "denied".into()
            })
        );
        assert_eq!(
            normalize(&raw(
                json!({"type": "TOOL_CALL_END", "toolCallId": "t1", "error": {"code": 7}})
            )),
            Some(TurnEvent::ToolCallFailed {
                id: "t1".into(),
                error: r#"{"code":7}"#.into()
            })
        );
    }

    #[test]
    fn steps() {
        assert_eq!(
            normalize(&raw(json!({"type": "STEP_STARTED", "stepName": "plan"}))),
            Some(TurnEvent::StepStarted {
                name: "plan".into()
            })
        );
        assert_eq!(
            normalize(&raw(json!({"type": "STEP_FINISHED", "step_name": "plan"}))),
            Some(TurnEvent::StepFinished {
                name: "plan".into()
            })
        );
        assert_eq!(normalize(&raw(json!({"type": "STEP_STARTED"}))), None);
    }

    #[rstest]
    #[case("TEXT_MESSAGE_START")]
    #[case("TEXT_MESSAGE_END")]
    #[case("STATE_SNAPSHOT")]
    #[case("MESSAGES_SNAPSHOT")]
    #[case("CUSTOM")]
    #[case("SOMETHING_FROM_THE_FUTURE")]
    fn unrecognized_tags_are_dropped(#[case] tag: &str) {
        assert_eq!(
            normalize(&RawEvent::new(tag).with_field("delta", "x")),
            None
        );
    }
}
