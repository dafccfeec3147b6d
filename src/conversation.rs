//! Conversation history cache.

pub mod history;

pub use history::HistoryCache;
