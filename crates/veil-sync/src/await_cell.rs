// ── Await-cell for an intermittently present value ──
//
// Holds a single shared, possibly-absent resource (the daemon handle).
// Callers that need it wait for it to become present rather than fail;
// any number of simultaneous waiters all resume when it attaches.

use std::sync::Arc;

use tokio::sync::watch;

/// A shared slot whose readers can await attachment.
///
/// Cheaply cloneable; constructed once at startup and passed explicitly
/// to every component that needs the resource.
pub struct AwaitCell<T> {
    tx: Arc<watch::Sender<Option<T>>>,
}

impl<T> Clone for AwaitCell<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for AwaitCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> AwaitCell<T> {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Attach a value, resuming every pending waiter.
    pub fn set(&self, value: T) {
        let _ = self.tx.send(Some(value));
    }

    /// Detach the value; subsequent waits suspend until re-attachment.
    pub fn clear(&self) {
        let _ = self.tx.send(None);
    }

    /// The value, if currently attached.
    pub fn get(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    /// Suspend until a value is attached. No timeout — the caller's
    /// contract is "resume when the resource exists".
    pub async fn wait(&self) -> T {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(value) = rx.borrow_and_update().as_ref() {
                return value.clone();
            }
            if rx.changed().await.is_err() {
                // The cell was dropped empty; nothing will ever attach.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Observe attach/detach transitions.
    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.tx.subscribe()
    }
}
