use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One wire event: a string tag plus whatever fields the server chose to
/// send. Field names and presence vary by tag and by server, so nothing
/// beyond the tag is typed here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RawEvent {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// First alias holding a non-empty string.
    pub fn first_str(&self, aliases: &[&str]) -> Option<&str> {
        aliases.iter().find_map(|alias| match self.fields.get(*alias) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        })
    }

    /// First alias holding a non-empty value, rendered as text. Strings are
    /// taken verbatim; other values (objects, numbers) become compact JSON.
    pub fn first_text(&self, aliases: &[&str]) -> Option<String> {
        aliases
            .iter()
            .find_map(|alias| self.fields.get(*alias).and_then(value_as_text))
    }

    /// Like [`RawEvent::first_text`], but only strings and objects count.
    /// Booleans and numbers are flags or codes, not messages.
    pub fn first_message(&self, aliases: &[&str]) -> Option<String> {
        aliases
            .iter()
            .find_map(|alias| match self.fields.get(*alias) {
                Some(value @ (Value::String(_) | Value::Object(_))) => value_as_text(value),
                _ => None,
            })
    }

    pub fn flag(&self, aliases: &[&str]) -> bool {
        aliases
            .iter()
            .any(|alias| matches!(self.fields.get(*alias), Some(Value::Bool(true))))
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_tag_and_keeps_remaining_fields() {
        let raw = RawEvent::from_json(
            r#"{"type":"TEXT_MESSAGE_CONTENT","messageId":"m1","delta":"Hel"}"#,
        )
        .unwrap();

        assert_eq!(raw.kind, "TEXT_MESSAGE_CONTENT");
        assert_eq!(raw.field("messageId"), Some(&json!("m1")));
        assert_eq!(raw.first_str(&["delta"]), Some("Hel"));
    }

    #[test]
    fn missing_tag_is_a_decode_error() {
        assert!(RawEvent::from_json(r#"{"delta":"x"}"#).is_err());
        assert!(RawEvent::from_json("[1,2,3]").is_err());
    }

    #[test]
    fn first_str_skips_empty_and_non_string_aliases() {
        let raw = RawEvent::new("X")
            .with_field("delta", "")
            .with_field("content", 42)
            .with_field("text", "found");
        assert_eq!(raw.first_str(&["delta", "content", "text"]), Some("found"));
    }

    #[test]
    fn first_text_renders_structured_values_as_json() {
        let raw = RawEvent::new("TOOL_CALL_RESULT")
            .with_field("result", Value::Null)
            .with_field("content", json!({"temp": 21}));
        assert_eq!(
            raw.first_text(&["result", "content"]),
            Some(r#"{"temp":21}"#.to_string())
        );
    }

    #[test]
    fn first_message_skips_flags_and_codes() {
        let raw = RawEvent::new("TOOL_CALL_END")
            .with_field("error", false)
            .with_field("detail", 0)
            .with_field("message", "disk full");
        assert_eq!(
            raw.first_message(&["error", "detail", "message"]),
            Some("disk full".to_string())
        );
        assert_eq!(raw.first_message(&["error", "detail"]), None);
    }
}
