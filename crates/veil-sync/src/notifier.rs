// ── Observable value cell ──
//
// Multi-subscriber fan-out with late-subscriber replay. The cell
// serializes its own registration bookkeeping but performs no locking
// around callback invocation — callers that notify from multiple
// contexts must serialize those calls themselves (the caches do this
// with their own state mutex).

use std::sync::{Arc, Mutex};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

/// Identifies one subscription on one [`EventNotifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Registry<T> {
    current: T,
    /// Insertion order governs delivery order.
    subscribers: Vec<(SubscriptionId, Callback<T>)>,
    next_id: u64,
}

/// An observable value holder.
///
/// Every subscriber observes the value current at subscribe time
/// (replay), then every subsequent distinct value in emission order.
pub struct EventNotifier<T> {
    registry: Mutex<Registry<T>>,
}

impl<T: Clone> EventNotifier<T> {
    pub fn new(initial: T) -> Self {
        Self {
            registry: Mutex::new(Registry {
                current: initial,
                subscribers: Vec::new(),
                next_id: 0,
            }),
        }
    }

    /// Register a callback and immediately replay the current value to it.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionId {
        let callback: Callback<T> = Arc::new(callback);

        let (id, replay) = {
            let mut registry = self.lock();
            let id = SubscriptionId(registry.next_id);
            registry.next_id += 1;
            registry.subscribers.push((id, Arc::clone(&callback)));
            (id, registry.current.clone())
        };

        callback(&replay);
        id
    }

    /// Remove a subscription. No-op if the id is unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().subscribers.retain(|(sub_id, _)| *sub_id != id);
    }

    /// Drop every subscription. Idempotent; used at teardown.
    pub fn unsubscribe_all(&self) {
        self.lock().subscribers.clear();
    }

    /// Store `value` and invoke every callback with it, in
    /// subscription order.
    pub fn notify(&self, value: T) {
        let callbacks = {
            let mut registry = self.lock();
            registry.current = value.clone();
            registry
                .subscribers
                .iter()
                .map(|(_, cb)| Arc::clone(cb))
                .collect::<Vec<_>>()
        };

        for callback in callbacks {
            callback(&value);
        }
    }

    /// Clone of the most recently stored value.
    pub fn latest(&self) -> T {
        self.lock().current.clone()
    }

    pub fn has_subscribers(&self) -> bool {
        !self.lock().subscribers.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry<T>> {
        // A poisoned registry only happens if a callback panicked;
        // the subscription list itself is still coherent.
        self.registry
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<T: Clone + PartialEq> EventNotifier<T> {
    /// As [`notify`](Self::notify), but only when `value` differs from
    /// the stored value. Repeated identical notifications produce no
    /// callback invocations.
    pub fn notify_if_changed(&self, value: T) {
        if self.lock().current == value {
            return;
        }
        self.notify(value);
    }
}
