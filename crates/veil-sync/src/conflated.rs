// ── Single-slot conflated channel ──
//
// A send overwrites any not-yet-consumed value: the consumer only ever
// observes the most recently sent item. Built on a mutex-guarded slot
// plus `Notify` rather than `tokio::sync::watch`, because a watch
// channel cannot represent an empty slot and forces `Clone` on the
// payload.

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio::sync::Notify;

/// The receiver is gone or the channel was closed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("conflated channel is closed")]
pub struct SendError;

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    notify: Notify,
}

struct Slot<T> {
    value: Option<T>,
    closed: bool,
    receiver_alive: bool,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Create a conflated single-slot channel.
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot {
            value: None,
            closed: false,
            receiver_alive: true,
        }),
        notify: Notify::new(),
    });

    (
        Sender {
            shared: Arc::clone(&shared),
        },
        Receiver { shared },
    )
}

pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Sender<T> {
    /// Place `value` in the slot, overwriting any pending item.
    /// Never blocks.
    pub fn send(&self, value: T) -> Result<(), SendError> {
        {
            let mut slot = self.shared.lock();
            if slot.closed || !slot.receiver_alive {
                return Err(SendError);
            }
            slot.value = Some(value);
        }
        self.shared.notify.notify_one();
        Ok(())
    }

    /// Stop the channel: a pending or future `recv` observes `None`.
    /// Idempotent.
    pub fn close(&self) {
        self.shared.lock().closed = true;
        self.shared.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        let slot = self.shared.lock();
        slot.closed || !slot.receiver_alive
    }
}

pub struct Receiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Receiver<T> {
    /// Wait for the most recently sent value. Returns `None` once the
    /// channel is closed and the slot drained.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            {
                let mut slot = self.shared.lock();
                if let Some(value) = slot.value.take() {
                    return Some(value);
                }
                if slot.closed {
                    return None;
                }
            }
            // `notify_one` stores a permit when no one is waiting, so a
            // send racing this gap is not lost.
            self.shared.notify.notified().await;
        }
    }

    /// Take the pending value without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.shared.lock().value.take()
    }

    /// Whether the slot currently holds an unconsumed value.
    pub fn is_empty(&self) -> bool {
        self.shared.lock().value.is_none()
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        self.shared.lock().receiver_alive = false;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_the_latest_value_only() {
        let (tx, mut rx) = channel();

        tx.send(1).unwrap();
        tx.send(2).unwrap();
        tx.send(3).unwrap();

        assert_eq!(rx.recv().await, Some(3));
        assert!(rx.is_empty());
    }

    #[tokio::test]
    async fn recv_waits_for_a_send() {
        let (tx, mut rx) = channel();

        let waiter = tokio::spawn(async move { rx.recv().await });
        tokio::task::yield_now().await;
        tx.send(42).unwrap();

        assert_eq!(waiter.await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn close_wakes_a_pending_recv_with_none() {
        let (tx, mut rx) = channel::<u8>();

        let waiter = tokio::spawn(async move { rx.recv().await });
        tokio::task::yield_now().await;
        tx.close();

        assert_eq!(waiter.await.unwrap(), None);
    }

    #[tokio::test]
    async fn send_after_close_errors() {
        let (tx, _rx) = channel();
        tx.close();
        assert_eq!(tx.send(1), Err(SendError));
    }

    #[tokio::test]
    async fn send_after_receiver_drop_errors() {
        let (tx, rx) = channel();
        drop(rx);
        assert_eq!(tx.send(1), Err(SendError));
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn is_empty_tracks_the_slot() {
        let (tx, mut rx) = channel();
        assert!(rx.is_empty());

        tx.send(9).unwrap();
        assert!(!rx.is_empty());

        assert_eq!(rx.try_recv(), Some(9));
        assert!(rx.is_empty());
        assert_eq!(rx.try_recv(), None);
    }
}
