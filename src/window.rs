//! Trailing-window view over a message history.

use crate::message::Message;

use std::num::NonZeroUsize;

/// How much of a channel's history a consumer sees.
///
/// The policy only shapes what is returned. It never drops messages from the
/// cache or the remote store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowPolicy {
    k: Option<NonZeroUsize>,
}

impl WindowPolicy {
    /// Expose the full history.
    pub fn unbounded() -> Self {
        Self { k: None }
    }

    /// Expose at most the last `k` messages.
    pub fn last(k: NonZeroUsize) -> Self {
        Self { k: Some(k) }
    }

    pub fn size(&self) -> Option<NonZeroUsize> {
        self.k
    }

    /// The trailing `k` messages of `history`, or all of it when unbounded or
    /// shorter than `k`.
    pub fn apply<'a>(&self, history: &'a [Message]) -> &'a [Message] {
        match self.k {
            Some(k) if k.get() < history.len() => &history[history.len() - k.get()..],
            _ => history,
        }
    }
}
