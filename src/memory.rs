//! Conversation memory: the chat-history surface an agent talks to.
//!
//! Reads always refetch the channel from the remote store and then apply the
//! configured window. Writes go to the store first and are only recorded
//! locally once the store has accepted them.

use crate::ChannelId;
use crate::config::{ClearPolicy, Config, MemoryConfig};
use crate::conversation::HistoryCache;
use crate::error::{HistoryError, Result};
use crate::message::{Message, MessageContent, encode};
use crate::store::{ConversationContext, HttpMessageStore, MessageStore};
use crate::window::WindowPolicy;

use serde_json::Value;
use tokio::sync::Mutex;

use std::future::Future;

/// Capability set a host agent framework expects from a chat history.
pub trait ChatMessageHistory: Send + Sync {
    /// Current history as the consumer should see it.
    fn get_messages(&self) -> impl Future<Output = Result<Vec<Message>>> + Send;

    fn add_messages(&self, messages: Vec<Message>) -> impl Future<Output = Result<()>> + Send;

    fn clear(&self) -> impl Future<Output = Result<()>> + Send;

    fn add_message(&self, message: Message) -> impl Future<Output = Result<()>> + Send {
        self.add_messages(vec![message])
    }

    fn add_user_message(&self, text: String) -> impl Future<Output = Result<()>> + Send {
        self.add_messages(vec![Message::human(text)])
    }

    fn add_ai_message(&self, text: String) -> impl Future<Output = Result<()>> + Send {
        self.add_messages(vec![Message::ai(text)])
    }
}

/// Remote-backed history for a single channel.
///
/// The cache lock is only taken around local bookkeeping, never across a
/// store call, so a slow store does not block [`cached_messages`] or
/// [`clear`]. Appends on one instance are serialized by a separate write lock.
/// A refresh that overlapped a recorded append is returned to its caller but
/// not cached.
///
/// [`cached_messages`]: Self::cached_messages
/// [`clear`]: Self::clear
pub struct ConversationMemory<S = HttpMessageStore> {
    store: S,
    cache: Mutex<HistoryCache>,
    write_lock: Mutex<()>,
    channel_id: ChannelId,
    context: ConversationContext,
    window: WindowPolicy,
    clear_policy: ClearPolicy,
    memory_key: String,
}

impl ConversationMemory<HttpMessageStore> {
    /// Build a memory talking HTTP to the configured store.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = HttpMessageStore::new(&config.connection)?;
        Ok(Self::new(store, &config.memory))
    }
}

impl<S: MessageStore> ConversationMemory<S> {
    pub fn new(store: S, config: &MemoryConfig) -> Self {
        Self {
            store,
            cache: Mutex::new(HistoryCache::new()),
            write_lock: Mutex::new(()),
            channel_id: ChannelId::from(config.channel_id.as_str()),
            context: config.context.clone(),
            window: config.window(),
            clear_policy: config.clear,
            memory_key: config.memory_key.clone(),
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn window(&self) -> WindowPolicy {
        self.window
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Refetch the channel and return the windowed history.
    ///
    /// A failed fetch is returned as an error; the previously cached history
    /// is kept but not served in its place.
    pub async fn get_messages(&self) -> Result<Vec<Message>> {
        let seen = self.cache.lock().await.generation(&self.channel_id);
        let fetched = self
            .store
            .fetch_all(&self.channel_id, &self.context)
            .await?;
        let history = self.window.apply(&fetched).to_vec();

        self.cache
            .lock()
            .await
            .replace_if_unchanged(&self.channel_id, fetched, seen);
        Ok(history)
    }

    /// Last-known windowed history, without contacting the store.
    ///
    /// `None` until the first successful [`get_messages`](Self::get_messages).
    pub async fn cached_messages(&self) -> Option<Vec<Message>> {
        let cache = self.cache.lock().await;
        cache
            .get(&self.channel_id)
            .map(|history| self.window.apply(history).to_vec())
    }

    /// Append messages to the store, then to the local history.
    ///
    /// The channel must have been loaded at least once. If the store rejects
    /// the write, the local history is left unchanged.
    pub async fn add_messages(&self, messages: Vec<Message>) -> Result<()> {
        let _write = self.write_lock.lock().await;
        if !self.cache.lock().await.is_loaded(&self.channel_id) {
            return Err(HistoryError::UninitializedChannel {
                channel_id: self.channel_id.to_string(),
            }
            .into());
        }
        if messages.is_empty() {
            return Ok(());
        }

        self.store
            .append(&self.channel_id, &self.context, &messages)
            .await?;

        let count = messages.len();
        self.cache
            .lock()
            .await
            .record_append(&self.channel_id, messages)?;
        tracing::debug!(channel_id = %self.channel_id, count, "recorded appended messages");
        Ok(())
    }

    pub async fn add_message(&self, message: Message) -> Result<()> {
        self.add_messages(vec![message]).await
    }

    pub async fn add_user_message(&self, text: impl Into<MessageContent>) -> Result<()> {
        self.add_messages(vec![Message::human(text)]).await
    }

    pub async fn add_ai_message(&self, text: impl Into<MessageContent>) -> Result<()> {
        self.add_messages(vec![Message::ai(text)]).await
    }

    /// Record one exchange: the user's input followed by the assistant's output,
    /// in a single append.
    pub async fn save_turn(
        &self,
        input: impl Into<MessageContent>,
        output: impl Into<MessageContent>,
    ) -> Result<()> {
        self.add_messages(vec![Message::human(input), Message::ai(output)])
            .await
    }

    /// Fresh windowed history keyed by the configured memory key, in the
    /// append wire format.
    pub async fn load_variables(&self) -> Result<serde_json::Map<String, Value>> {
        let messages = self.get_messages().await?;
        let encoded = messages
            .iter()
            .map(|message| serde_json::to_value(encode(message)))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(anyhow::Error::from)?;

        let mut variables = serde_json::Map::new();
        variables.insert(self.memory_key.clone(), Value::Array(encoded));
        Ok(variables)
    }

    /// Apply the configured clear policy. The remote store is never cleared.
    pub async fn clear(&self) -> Result<()> {
        self.cache
            .lock()
            .await
            .clear(&self.channel_id, self.clear_policy);
        Ok(())
    }
}

impl<S: MessageStore> ChatMessageHistory for ConversationMemory<S> {
    fn get_messages(&self) -> impl Future<Output = Result<Vec<Message>>> + Send {
        ConversationMemory::get_messages(self)
    }

    fn add_messages(&self, messages: Vec<Message>) -> impl Future<Output = Result<()>> + Send {
        ConversationMemory::add_messages(self, messages)
    }

    fn clear(&self) -> impl Future<Output = Result<()>> + Send {
        ConversationMemory::clear(self)
    }
}
