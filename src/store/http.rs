//! HTTP client for the remote message store.

use super::{ConversationContext, MessageStore};
use crate::config::ConnectionConfig;
use crate::error::{Result, StoreError};
use crate::message::{Message, OutgoingMessage, WireMessage, decode, encode};

use anyhow::Context as _;
use reqwest::header::ACCEPT;
use serde::Deserialize;

use std::time::Duration;

/// Header carrying the serialized conversation context.
pub const CONTEXT_HEADER: &str = "X-context";

#[derive(Debug, Default, Deserialize)]
struct ListResponse {
    #[serde(default)]
    messages: Option<Vec<WireMessage>>,
}

/// Talks to a remote store over `GET`/`POST {base}/messages?channelId=...`.
///
/// Every call is a fresh request: idle connections are not kept, and nothing
/// about the channel is remembered between calls.
#[derive(Debug, Clone)]
pub struct HttpMessageStore {
    http_client: reqwest::Client,
    messages_url: String,
    token: String,
}

impl HttpMessageStore {
    pub fn new(connection: &ConnectionConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().pool_max_idle_per_host(0);
        if let Some(timeout_secs) = connection.timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout_secs));
        }
        let http_client = builder
            .build()
            .with_context(|| "failed to build HTTP client")?;

        Ok(Self {
            http_client,
            messages_url: connection.messages_url(),
            token: connection.token.clone(),
        })
    }

    pub fn messages_url(&self) -> &str {
        &self.messages_url
    }
}

impl MessageStore for HttpMessageStore {
    async fn fetch_all(
        &self,
        channel_id: &str,
        context: &ConversationContext,
    ) -> std::result::Result<Vec<Message>, StoreError> {
        tracing::debug!(channel_id, "fetching channel history");

        let response = self
            .http_client
            .get(&self.messages_url)
            .query(&[("channelId", channel_id)])
            .header(ACCEPT, "application/json")
            .bearer_auth(&self.token)
            .header(CONTEXT_HEADER, context.header_value())
            .send()
            .await?;
        let response = ensure_success(response, channel_id, "fetch")?;

        let body = response.text().await?;
        let messages = parse_list_body(&body)?;

        tracing::debug!(channel_id, count = messages.len(), "fetched channel history");
        Ok(messages)
    }

    async fn append(
        &self,
        channel_id: &str,
        context: &ConversationContext,
        messages: &[Message],
    ) -> std::result::Result<(), StoreError> {
        let body: Vec<OutgoingMessage> = messages.iter().map(encode).collect();

        tracing::debug!(channel_id, count = body.len(), "appending messages");

        let response = self
            .http_client
            .post(&self.messages_url)
            .query(&[("channelId", channel_id)])
            .bearer_auth(&self.token)
            .header(CONTEXT_HEADER, context.header_value())
            .json(&body)
            .send()
            .await?;
        ensure_success(response, channel_id, "append")?;

        Ok(())
    }
}

fn ensure_success(
    response: reqwest::Response,
    channel_id: &str,
    operation: &str,
) -> std::result::Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    tracing::warn!(
        channel_id,
        operation,
        status = status.as_u16(),
        "remote store rejected request"
    );

    Err(StoreError::Status {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
    })
}

/// Decode a list response, treating a missing or null `messages` as empty.
fn parse_list_body(body: &str) -> std::result::Result<Vec<Message>, StoreError> {
    let list: Option<ListResponse> =
        serde_json::from_str(body).map_err(|error| StoreError::Decode(error.to_string()))?;

    Ok(list
        .and_then(|list| list.messages)
        .unwrap_or_default()
        .into_iter()
        .map(decode)
        .collect())
}
