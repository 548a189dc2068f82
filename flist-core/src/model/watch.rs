//! `src/model/watch.rs`
//!
//! State a background watcher may touch. Everything else in a pane is
//! confined to the UI thread: a watcher only raises the pending-event flag
//! and updates [`WatchMeta`] under its mutex.

use std::sync::atomic::{AtomicU8, Ordering};

use compact_str::CompactString;

/// What the owning thread should do at its next iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum PendingEvent {
    #[default]
    None = 0,
    Redraw = 1,
    Reload = 2,
}

impl PendingEvent {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Redraw,
            _ => Self::Reload,
        }
    }
}

/// Lock-free pending-event cell. Requests only ever raise the level, so a
/// reload requested before or after a redraw wins.
#[derive(Debug, Default)]
pub struct PendingFlag(AtomicU8);

impl PendingFlag {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU8::new(PendingEvent::None as u8))
    }

    pub fn request(&self, event: PendingEvent) {
        self.0.fetch_max(event as u8, Ordering::AcqRel);
    }

    #[must_use]
    pub fn peek(&self) -> PendingEvent {
        PendingEvent::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Drains the flag.
    pub fn take(&self) -> PendingEvent {
        PendingEvent::from_u8(self.0.swap(PendingEvent::None as u8, Ordering::AcqRel))
    }
}

/// Watcher-writable subset of pane metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchMeta {
    /// Opaque handle of the watch registered for the pane's directory.
    pub watch_token: Option<u64>,
    /// File under the cursor when the pane was last shown.
    pub last_seen_file: Option<CompactString>,
    /// Scroll position when the pane was last shown.
    pub last_seen_top: usize,
}
