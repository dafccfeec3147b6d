//! chatmem: conversation history for agents, kept in a remote HTTP message store.
//!
//! The remote store is the source of truth. [`ConversationMemory`] refetches a
//! channel on every read, writes appends through to the store, and mirrors
//! accepted appends into a local [`HistoryCache`].

pub mod config;
pub mod conversation;
pub mod error;
pub mod memory;
pub mod message;
pub mod store;
pub mod window;

pub use conversation::HistoryCache;
pub use error::{Error, Result};
pub use memory::{ChatMessageHistory, ConversationMemory};
pub use message::{Message, MessageContent, MessageKind, Role};
pub use store::{ConversationContext, HttpMessageStore, MessageStore};
pub use window::WindowPolicy;

use std::sync::Arc;

/// Channel identifier type.
pub type ChannelId = Arc<str>;
