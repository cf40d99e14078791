// ── Remote listener registry ──
//
// Tracks every registered reply endpoint and broadcasts each outgoing
// event to all of them. A failed delivery marks the endpoint; removal
// is deferred until the broadcast pass completes. Registration,
// broadcast and external deregistration all hold the same lock.

use std::sync::{Mutex, MutexGuard};

use tracing::debug;
use uuid::Uuid;

use veil_ipc::{Event, ListenerSink};

/// Process-wide set of listener endpoints. No ordering guarantee, no
/// deduplication.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<Vec<ListenerSink>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, sink: ListenerSink) {
        self.lock().push(sink);
    }

    /// Remove an endpoint explicitly. No-op if absent; an endpoint is
    /// removed at most once and never re-added automatically.
    pub fn unregister(&self, id: Uuid) {
        self.lock().retain(|sink| sink.id() != id);
    }

    /// Deliver `event` to every registered endpoint, pruning the ones
    /// whose remote side is gone.
    pub fn broadcast(&self, event: &Event) {
        let mut listeners = self.lock();

        let mut dead = Vec::new();
        for sink in listeners.iter() {
            if let Err(e) = sink.deliver(event) {
                debug!(listener = %sink.id(), error = %e, "pruning dead listener");
                dead.push(sink.id());
            }
        }

        if !dead.is_empty() {
            listeners.retain(|sink| !dead.contains(&sink.id()));
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ListenerSink>> {
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
