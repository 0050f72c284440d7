use std::fmt;

use serde_json::{Map, Value};

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";
const ASSISTANT_ID_TYPE: &str = "assistant_message_id";

/// Identifier of an assistant message, either a local placeholder or the id
/// persisted by the backend.
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Creates an id from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Creates a locally unique placeholder used until the backend assigns an id.
    pub fn temporary() -> Self {
        Self(format!("tmp-{}", uuid::Uuid::new_v4()))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// One decoded unit of the response stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// Text fragment to append to the assistant message.
    ContentDelta(String),
    /// Backend-assigned id for the assistant message.
    AssistantIdAssigned(MessageId),
    /// `[DONE]` sentinel.
    Done,
    /// Frame whose payload could not be decoded. It is discarded.
    Malformed,
}

/// Recognized fields of one frame. A field with an unexpected JSON type is
/// treated as absent; it does not invalidate the rest of the frame.
struct WireFrame {
    kind: Option<String>,
    message_id: Option<MessageId>,
    content: Option<String>,
}

impl WireFrame {
    fn from_object(mut object: Map<String, Value>) -> Self {
        let message_id = match object.remove("message_id") {
            Some(Value::Number(n)) => Some(MessageId(n.to_string())),
            Some(Value::String(s)) => Some(MessageId(s)),
            _ => None,
        };
        Self {
            kind: take_string(&mut object, "type"),
            message_id,
            content: take_string(&mut object, "content"),
        }
    }
}

fn take_string(object: &mut Map<String, Value>, key: &str) -> Option<String> {
    match object.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// Translates one complete stream line into typed events.
///
/// Lines without the `data: ` prefix are framing noise and yield nothing. An
/// identifier carried by a frame is reported before that frame's content.
pub fn decode_line(line: &str) -> Vec<StreamEvent> {
    let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
        return Vec::new();
    };
    let payload = rest.trim();
    if payload == DONE_SENTINEL {
        return vec![StreamEvent::Done];
    }
    let frame = match serde_json::from_str::<Map<String, Value>>(payload) {
        Ok(object) => WireFrame::from_object(object),
        Err(_) => return vec![StreamEvent::Malformed],
    };

    let mut events = Vec::with_capacity(2);
    if frame.kind.as_deref() == Some(ASSISTANT_ID_TYPE)
        && let Some(id) = frame.message_id
    {
        events.push(StreamEvent::AssistantIdAssigned(id));
    }
    if let Some(content) = frame.content.filter(|c| !c.is_empty()) {
        events.push(StreamEvent::ContentDelta(content));
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_numeric_assistant_id() {
        let events = decode_line(r#"data: {"type":"assistant_message_id","message_id":42}"#);
        assert_eq!(
            events,
            vec![StreamEvent::AssistantIdAssigned(MessageId::new("42"))]
        );
    }

    #[test]
    fn decodes_string_assistant_id() {
        let events = decode_line(r#"data: {"type":"assistant_message_id","message_id":"m-7"}"#);
        assert_eq!(
            events,
            vec![StreamEvent::AssistantIdAssigned(MessageId::new("m-7"))]
        );
    }

    #[test]
    fn content_is_kept_verbatim() {
        let events = decode_line(r#"data: {"content":"  mundo "}"#);
        assert_eq!(events, vec![StreamEvent::ContentDelta("  mundo ".into())]);
    }

    #[test]
    fn sentinel_is_never_parsed() {
        assert_eq!(decode_line("data: [DONE]"), vec![StreamEvent::Done]);
        assert_eq!(decode_line("data:  [DONE]  "), vec![StreamEvent::Done]);
    }

    #[test]
    fn malformed_payloads_are_flagged() {
        assert_eq!(decode_line("data: not-json"), vec![StreamEvent::Malformed]);
        assert_eq!(decode_line(r#"data: {"content":"tru"#), vec![StreamEvent::Malformed]);
        assert_eq!(decode_line("data: 17"), vec![StreamEvent::Malformed]);
    }

    #[test]
    fn non_data_lines_are_ignored() {
        assert!(decode_line("").is_empty());
        assert!(decode_line(": keep-alive").is_empty());
        assert!(decode_line("event: message").is_empty());
        assert!(decode_line(r#"data:{"content":"x"}"#).is_empty());
    }

    #[test]
    fn id_type_without_id_and_unknown_objects_yield_nothing() {
        assert!(decode_line(r#"data: {"type":"assistant_message_id"}"#).is_empty());
        assert!(decode_line(r#"data: {"type":"status","stage":"searching"}"#).is_empty());
        assert!(decode_line(r#"data: {"content":""}"#).is_empty());
    }

    #[test]
    fn id_is_reported_before_content_of_the_same_frame() {
        let events = decode_line(
            r#"data: {"type":"assistant_message_id","message_id":9,"content":"Hola"}"#,
        );
        assert_eq!(
            events,
            vec![
                StreamEvent::AssistantIdAssigned(MessageId::new("9")),
                StreamEvent::ContentDelta("Hola".into()),
            ]
        );
    }

    #[test]
    fn mistyped_field_does_not_drop_the_rest_of_the_frame() {
        let events = decode_line(
            r#"data: {"type":"assistant_message_id","message_id":9,"content":5}"#,
        );
        assert_eq!(
            events,
            vec![StreamEvent::AssistantIdAssigned(MessageId::new("9"))]
        );

        let events = decode_line(
            r#"data: {"type":"assistant_message_id","message_id":true,"content":"Hola"}"#,
        );
        assert_eq!(events, vec![StreamEvent::ContentDelta("Hola".into())]);

        assert!(decode_line(r#"data: {"content":null}"#).is_empty());
    }

    #[test]
    fn arrays_and_scalars_are_not_frames() {
        assert_eq!(
            decode_line(r#"data: ["assistant_message_id", 1, "x"]"#),
            vec![StreamEvent::Malformed]
        );
        assert_eq!(decode_line(r#"data: "hola""#), vec![StreamEvent::Malformed]);
    }

    #[test]
    fn temporary_ids_are_unique() {
        let a = MessageId::temporary();
        let b = MessageId::temporary();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("tmp-"));
    }
}
