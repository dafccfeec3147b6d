//! Per-channel cache of the last-known remote history.

use crate::ChannelId;
use crate::config::ClearPolicy;
use crate::error::{HistoryError, StoreError};
use crate::message::Message;
use crate::store::{ConversationContext, MessageStore};

use std::collections::HashMap;

/// In-process view of one or more channels' message sequences.
///
/// A channel's entry is created by the first successful [`load`](Self::load)
/// and replaced wholesale by every later one. Between loads, appends grow the
/// entry in place, so its size is bounded by the remote channel plus whatever
/// was appended since the last refresh.
///
/// Every replace and append bumps the channel's generation. A caller that
/// fetches without holding the cache passes the generation it saw to
/// [`replace_if_unchanged`](Self::replace_if_unchanged), so a fetch that
/// raced with a newer local change is dropped instead of overwriting it.
#[derive(Debug, Default)]
pub struct HistoryCache {
    channels: HashMap<ChannelId, ChannelHistory>,
}

#[derive(Debug, Default)]
struct ChannelHistory {
    messages: Vec<Message>,
    generation: u64,
}

impl HistoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a channel from the store and replace the cached sequence with it.
    ///
    /// Holds `&mut self` across the fetch; for a shared cache use
    /// [`generation`](Self::generation) and
    /// [`replace_if_unchanged`](Self::replace_if_unchanged) instead.
    /// On failure the existing entry (if any) is left as it was.
    pub async fn load<S: MessageStore>(
        &mut self,
        store: &S,
        channel_id: &str,
        context: &ConversationContext,
    ) -> Result<&[Message], StoreError> {
        let messages = store.fetch_all(channel_id, context).await?;
        Ok(self.replace(channel_id, messages))
    }

    /// Replace a channel's cached sequence.
    pub fn replace(&mut self, channel_id: &str, messages: Vec<Message>) -> &[Message] {
        let entry = self.channels.entry(ChannelId::from(channel_id)).or_default();
        entry.messages = messages;
        entry.generation += 1;
        &entry.messages
    }

    /// Replace a channel's cached sequence only if nothing changed it since
    /// `seen` was read. Returns whether the replace happened.
    pub fn replace_if_unchanged(
        &mut self,
        channel_id: &str,
        messages: Vec<Message>,
        seen: u64,
    ) -> bool {
        if self.generation(channel_id) != seen {
            tracing::debug!(channel_id, "dropping refresh that raced with a newer update");
            return false;
        }
        self.replace(channel_id, messages);
        true
    }

    /// Change counter for a channel; 0 until it is first loaded.
    pub fn generation(&self, channel_id: &str) -> u64 {
        self.channels
            .get(channel_id)
            .map_or(0, |entry| entry.generation)
    }

    /// Record messages the store has accepted, in the order given.
    pub fn record_append(
        &mut self,
        channel_id: &str,
        messages: Vec<Message>,
    ) -> Result<(), HistoryError> {
        let entry = self.channels.get_mut(channel_id).ok_or_else(|| {
            HistoryError::UninitializedChannel {
                channel_id: channel_id.to_string(),
            }
        })?;
        entry.messages.extend(messages);
        entry.generation += 1;
        Ok(())
    }

    /// Apply a clear request to a channel.
    ///
    /// `Disabled` does nothing. `LocalOnly` empties the cached entry but keeps
    /// it initialized; the remote store is never touched.
    pub fn clear(&mut self, channel_id: &str, policy: ClearPolicy) {
        match policy {
            ClearPolicy::Disabled => {
                tracing::debug!(channel_id, "clear requested, clearing is disabled");
            }
            ClearPolicy::LocalOnly => {
                if let Some(entry) = self.channels.get_mut(channel_id) {
                    entry.messages.clear();
                }
            }
        }
    }

    pub fn get(&self, channel_id: &str) -> Option<&[Message]> {
        self.channels
            .get(channel_id)
            .map(|entry| entry.messages.as_slice())
    }

    pub fn is_loaded(&self, channel_id: &str) -> bool {
        self.channels.contains_key(channel_id)
    }
}
