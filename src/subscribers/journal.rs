//! # Journal: in-memory append-only event log
//!
//! Keeps every event it receives, in delivery order. Useful for post-run
//! inspection and for asserting on the venue's behavior in tests.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Append-only in-memory event log.
#[derive(Default)]
pub struct Journal {
    entries: Mutex<Vec<Event>>,
}

impl Journal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every recorded event, ordered by `seq`.
    pub async fn events(&self) -> Vec<Event> {
        let mut events = self.entries.lock().await.clone();
        events.sort_by_key(|e| e.seq);
        events
    }

    /// Returns the recorded events of one kind, ordered by `seq`.
    pub async fn of_kind(&self, kind: EventKind) -> Vec<Event> {
        self.events()
            .await
            .into_iter()
            .filter(|e| e.kind == kind)
            .collect()
    }

    /// Number of recorded events.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Returns true if nothing was recorded.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl Subscribe for Journal {
    async fn on_event(&self, event: &Event) {
        self.entries.lock().await.push(event.clone());
    }

    fn name(&self) -> &'static str {
        "journal"
    }

    fn queue_capacity(&self) -> usize {
        8192
    }
}
