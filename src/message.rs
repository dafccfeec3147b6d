//! Conversation messages and their wire representation.
//!
//! The remote store lists messages as `{ role, content, metadata }` and accepts
//! appends as `{ type, content, metadata }`. [`decode`] and [`encode`] are the
//! only places that translate between the two.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form metadata carried alongside a message.
pub type Metadata = serde_json::Map<String, Value>;

/// Tool call id used when the store gives a tool message without one.
pub const PLACEHOLDER_TOOL_CALL_ID: &str = "123";

/// Metadata key the encoder uses to carry a tool message's call id.
pub const TOOL_CALL_ID_KEY: &str = "tool_call_id";

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Human,
    Ai,
    System,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Human => "human",
            Role::Ai => "ai",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }

    /// Map a wire role string onto a role.
    ///
    /// Anything unrecognised (or missing) is treated as a human message. This
    /// is a deliberate lossy fallback, not an error.
    pub fn from_wire(role: Option<&str>) -> Self {
        match role {
            Some("human") => Role::Human,
            Some("ai") => Role::Ai,
            Some("system") => Role::System,
            Some("tool") => Role::Tool,
            _ => Role::Human,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role plus whatever data only that role carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Human,
    Ai,
    System,
    Tool { tool_call_id: String },
}

impl MessageKind {
    pub fn role(&self) -> Role {
        match self {
            MessageKind::Human => Role::Human,
            MessageKind::Ai => Role::Ai,
            MessageKind::System => Role::System,
            MessageKind::Tool { .. } => Role::Tool,
        }
    }
}

/// Message body: plain text or an arbitrary structured payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Structured(Value),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

impl MessageContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::Structured(_) => None,
        }
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

impl From<Value> for MessageContent {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => MessageContent::Text(text),
            other => MessageContent::Structured(other),
        }
    }
}

impl std::fmt::Display for MessageContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageContent::Text(text) => write!(f, "{}", text),
            MessageContent::Structured(value) => write!(f, "{}", value),
        }
    }
}

/// A single conversation message. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    kind: MessageKind,
    content: MessageContent,
    metadata: Metadata,
}

impl Message {
    pub fn new(kind: MessageKind, content: impl Into<MessageContent>, metadata: Metadata) -> Self {
        Self {
            kind,
            content: content.into(),
            metadata,
        }
    }

    pub fn human(content: impl Into<MessageContent>) -> Self {
        Self::new(MessageKind::Human, content, Metadata::new())
    }

    pub fn ai(content: impl Into<MessageContent>) -> Self {
        Self::new(MessageKind::Ai, content, Metadata::new())
    }

    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::new(MessageKind::System, content, Metadata::new())
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<MessageContent>) -> Self {
        Self::new(
            MessageKind::Tool {
                tool_call_id: tool_call_id.into(),
            },
            content,
            Metadata::new(),
        )
    }

    /// Same message with `metadata` attached in place of the current metadata.
    pub fn with_metadata(self, metadata: Metadata) -> Self {
        Self { metadata, ..self }
    }

    pub fn role(&self) -> Role {
        self.kind.role()
    }

    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    pub fn content(&self) -> &MessageContent {
        &self.content
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        match &self.kind {
            MessageKind::Tool { tool_call_id } => Some(tool_call_id),
            _ => None,
        }
    }
}

/// A message as listed by the remote store.
///
/// `role` is authoritative. `type` is only consulted when `role` is absent, so
/// a store echoing back the append format still decodes, and one that keeps
/// both keys is not rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub content: MessageContent,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

/// A message as sent to the remote store on append.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingMessage {
    #[serde(rename = "type")]
    pub kind: Role,
    pub content: MessageContent,
    pub metadata: Metadata,
}

impl From<OutgoingMessage> for WireMessage {
    fn from(outgoing: OutgoingMessage) -> Self {
        Self {
            role: Some(outgoing.kind.as_str().to_string()),
            kind: None,
            content: outgoing.content,
            metadata: Some(outgoing.metadata),
            tool_call_id: None,
        }
    }
}

/// Turn a listed wire message into a [`Message`].
pub fn decode(wire: WireMessage) -> Message {
    let WireMessage {
        role,
        kind,
        content,
        metadata,
        tool_call_id,
    } = wire;
    let role = role.or(kind);
    let mut metadata = metadata.unwrap_or_default();

    let kind = match Role::from_wire(role.as_deref()) {
        Role::Human => {
            match role.as_deref() {
                Some("human") => {}
                Some(unknown) => {
                    tracing::warn!(role = unknown, "unknown message role, decoding as human");
                }
                None => tracing::debug!("message without a role, decoding as human"),
            }
            MessageKind::Human
        }
        Role::Ai => MessageKind::Ai,
        Role::System => MessageKind::System,
        Role::Tool => {
            let embedded = match metadata.get(TOOL_CALL_ID_KEY) {
                Some(Value::String(id)) => Some(id.clone()),
                _ => None,
            };
            if embedded.is_some() {
                metadata.remove(TOOL_CALL_ID_KEY);
            }
            let tool_call_id = tool_call_id.or(embedded).unwrap_or_else(|| {
                tracing::warn!("tool message without a call id, using placeholder");
                PLACEHOLDER_TOOL_CALL_ID.to_string()
            });
            MessageKind::Tool { tool_call_id }
        }
    };

    Message {
        kind,
        content,
        metadata,
    }
}

/// Turn a [`Message`] into its append format.
///
/// Tool messages carry their call id in `metadata.tool_call_id`.
pub fn encode(message: &Message) -> OutgoingMessage {
    let mut metadata = message.metadata.clone();
    if let MessageKind::Tool { tool_call_id } = &message.kind {
        metadata.insert(
            TOOL_CALL_ID_KEY.to_string(),
            Value::String(tool_call_id.clone()),
        );
    }

    OutgoingMessage {
        kind: message.role(),
        content: message.content.clone(),
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire(value: Value) -> WireMessage {
        serde_json::from_value(value).expect("wire message should deserialize")
    }

    fn metadata(value: Value) -> Metadata {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn round_trips_every_role() {
        let messages = vec![
            Message::human("hi").with_metadata(metadata(json!({"lang": "en"}))),
            Message::ai("hello"),
            Message::system("be brief"),
            Message::tool("call_7", json!({"temperature": 21})),
        ];

        for message in messages {
            let decoded = decode(encode(&message).into());
            assert_eq!(decoded, message);
        }
    }

    #[test]
    fn unknown_role_decodes_as_human() {
        let message = decode(wire(json!({"role": "carrier-pigeon", "content": "coo"})));
        assert_eq!(message.role(), Role::Human);
        assert_eq!(message.content().as_text(), Some("coo"));
    }

    #[test]
    fn role_wins_over_type_when_both_are_present() {
        let message = decode(wire(json!({
            "role": "ai",
            "type": "human",
            "content": "hello",
            "metadata": {}
        })));
        assert_eq!(message.role(), Role::Ai);
    }

    #[test]
    fn type_is_used_when_role_is_absent() {
        let message = decode(wire(json!({"type": "system", "content": "rules"})));
        assert_eq!(message.role(), Role::System);
    }

    #[test]
    fn missing_role_and_metadata_are_tolerated() {
        let message = decode(wire(json!({"content": "orphan", "metadata": null})));
        assert_eq!(message.role(), Role::Human);
        assert!(message.metadata().is_empty());
    }

    #[test]
    fn tool_call_id_prefers_wire_field() {
        let message = decode(wire(json!({
            "role": "tool",
            "content": "42",
            "tool_call_id": "call_a",
            "metadata": {"tool_call_id": "call_b", "source": "calc"}
        })));
        assert_eq!(message.tool_call_id(), Some("call_a"));
        assert_eq!(message.metadata().get("source"), Some(&json!("calc")));
        assert!(!message.metadata().contains_key(TOOL_CALL_ID_KEY));
    }

    #[test]
    fn tool_call_id_falls_back_to_placeholder() {
        let message = decode(wire(json!({"role": "tool", "content": "42"})));
        assert_eq!(message.tool_call_id(), Some(PLACEHOLDER_TOOL_CALL_ID));
    }

    #[test]
    fn encode_uses_type_field() {
        let encoded = serde_json::to_value(encode(&Message::ai("hello"))).unwrap();
        assert_eq!(
            encoded,
            json!({"type": "ai", "content": "hello", "metadata": {}})
        );
    }

    #[test]
    fn structured_content_survives() {
        let message = decode(wire(json!({
            "role": "ai",
            "content": [{"type": "text", "text": "hi"}]
        })));
        assert_eq!(
            message.content(),
            &MessageContent::Structured(json!([{"type": "text", "text": "hi"}]))
        );
    }
}
