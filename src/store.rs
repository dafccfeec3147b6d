//! Remote message store: trait seam and request context.

pub mod http;

pub use http::HttpMessageStore;

use crate::error::StoreError;
use crate::message::Message;

use serde_json::Value;

/// Opaque caller context forwarded with every remote call.
///
/// Its meaning belongs entirely to the remote store; this crate only
/// serializes it into the `X-context` header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationContext(Option<Value>);

impl ConversationContext {
    pub fn new(value: Value) -> Self {
        Self(Some(value))
    }

    pub fn empty() -> Self {
        Self(None)
    }

    pub fn value(&self) -> Option<&Value> {
        self.0.as_ref()
    }

    /// Header encoding: `{}` when there is no context, compact JSON otherwise.
    pub fn header_value(&self) -> String {
        match &self.0 {
            None | Some(Value::Null) => "{}".to_string(),
            Some(value) => value.to_string(),
        }
    }
}

impl From<Value> for ConversationContext {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

/// Request/response access to a remote message store.
///
/// Implementations are stateless with respect to message history: they never
/// touch a local cache, so a failed append leaves no trace on this side.
pub trait MessageStore: Send + Sync + 'static {
    /// List every message in a channel, in the order the store reports them.
    fn fetch_all(
        &self,
        channel_id: &str,
        context: &ConversationContext,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, StoreError>> + Send;

    /// Append messages to a channel, in order.
    fn append(
        &self,
        channel_id: &str,
        context: &ConversationContext,
        messages: &[Message],
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}
