// ── Event dispatcher ──
//
// Routes each inbound event to the one handler registered for its
// variant. Unregistered variants are a valid, expected case — a given
// client context may not care about every event type.

use dashmap::DashMap;

use veil_ipc::{Event, EventKind};

type Handler = Box<dyn Fn(&Event) + Send + Sync>;

/// One per client context. Each event variant has at most one handler;
/// re-registering a variant replaces the prior handler.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: DashMap<EventKind, Handler>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `kind`, replacing any existing binding.
    ///
    /// Handlers must not register or unregister from within their own
    /// invocation.
    pub fn register_handler(
        &self,
        kind: EventKind,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) {
        self.handlers.insert(kind, Box::new(handler));
    }

    /// Invoke the handler for this event's variant; silently drop the
    /// event if none is registered.
    pub fn dispatch(&self, event: &Event) {
        if let Some(handler) = self.handlers.get(&event.kind()) {
            handler(event);
        }
    }

    /// Clear every handler; subsequent dispatches become no-ops.
    pub fn teardown(&self) {
        self.handlers.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dispatches_to_the_registered_variant_only() {
        let dispatcher = EventDispatcher::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        dispatcher.register_handler(EventKind::AuthToken, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.dispatch(&Event::AuthToken(Some("token".into())));
        dispatcher.dispatch(&Event::ListenerReady); // no handler: dropped

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn re_registration_replaces_the_handler() {
        let dispatcher = EventDispatcher::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&first);
        dispatcher.register_handler(EventKind::ListenerReady, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&second);
        dispatcher.register_handler(EventKind::ListenerReady, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.dispatch(&Event::ListenerReady);

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn teardown_makes_dispatch_a_no_op() {
        let dispatcher = EventDispatcher::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        dispatcher.register_handler(EventKind::ListenerReady, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.teardown();
        dispatcher.dispatch(&Event::ListenerReady);

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
