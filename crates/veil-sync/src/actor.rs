// ── Single-consumer command actors ──
//
// Each actor owns a queue and applies an async handler to incoming
// commands strictly one at a time, so the state the handler touches
// needs no further synchronization against other commands. Two queue
// disciplines: unbounded FIFO (every command runs, in arrival order)
// and conflated (only the most recently enqueued, unconsumed command
// runs).

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::conflated;

/// Enqueueing after close. A normal shutdown race, not a fault.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("actor is closed")]
pub struct Closed;

// ── FIFO actor ──────────────────────────────────────────────────────

/// Unbounded FIFO command actor.
///
/// `enqueue` never blocks and always succeeds while the actor is open.
/// After [`close`](Self::close) the command currently being applied
/// completes; commands still queued are never executed.
pub struct CommandActor<C> {
    tx: mpsc::UnboundedSender<C>,
    closed: AtomicBool,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Send + 'static> CommandActor<C> {
    /// Spawn the consumer task around `handler`.
    pub fn spawn<F, Fut>(mut handler: F) -> Self
    where
        F: FnMut(C) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<C>();
        let cancel = CancellationToken::new();

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = task_cancel.cancelled() => break,
                    command = rx.recv() => {
                        let Some(command) = command else { break };
                        handler(command).await;
                    }
                }
            }
        });

        Self {
            tx,
            closed: AtomicBool::new(false),
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn enqueue(&self, command: C) -> Result<(), Closed> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Closed);
        }
        self.tx.send(command).map_err(|_| Closed)
    }

    /// Stop accepting commands and let the consumer wind down.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.cancel.cancel();
    }

    /// Close and wait for the consumer task to finish.
    pub async fn shutdown(&self) {
        self.close();
        let task = self
            .task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

// ── Conflated actor ─────────────────────────────────────────────────

/// Single-slot command actor: a new enqueue overwrites any pending,
/// not-yet-consumed command. Intermediate commands are never applied
/// and never reported as applied.
pub struct ConflatedActor<C> {
    tx: conflated::Sender<C>,
    closed: AtomicBool,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Send + 'static> ConflatedActor<C> {
    pub fn spawn<F, Fut>(mut handler: F) -> Self
    where
        F: FnMut(C) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (tx, mut rx) = conflated::channel::<C>();
        let cancel = CancellationToken::new();

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = task_cancel.cancelled() => break,
                    command = rx.recv() => {
                        let Some(command) = command else { break };
                        handler(command).await;
                    }
                }
            }
        });

        Self {
            tx,
            closed: AtomicBool::new(false),
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn enqueue(&self, command: C) -> Result<(), Closed> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Closed);
        }
        self.tx.send(command).map_err(|_| Closed)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.tx.close();
        self.cancel.cancel();
    }

    pub async fn shutdown(&self) {
        self.close();
        let task = self
            .task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn fifo_commands_apply_in_arrival_order() {
        let applied = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&applied);
        let actor = CommandActor::spawn(move |n: u32| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push(n);
            }
        });

        for n in 0..100 {
            actor.enqueue(n).unwrap();
        }
        actor.shutdown().await;

        let seen = applied.lock().unwrap().clone();
        // Whatever prefix ran before close, it ran in arrival order.
        assert_eq!(seen, (0..seen.len() as u32).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn fifo_matches_sequential_application() {
        let state = Arc::new(AtomicUsize::new(1));

        let shared = Arc::clone(&state);
        let actor = CommandActor::spawn(move |n: usize| {
            let shared = Arc::clone(&shared);
            async move {
                // Order-sensitive fold: x -> x * 7 + n
                let current = shared.load(Ordering::SeqCst);
                shared.store(current * 7 + n, Ordering::SeqCst);
            }
        });

        let commands = [3, 1, 4, 1, 5, 9, 2, 6];
        for n in commands {
            actor.enqueue(n).unwrap();
        }

        // Let the consumer drain before closing.
        tokio::task::yield_now().await;
        while state.load(Ordering::SeqCst) == 1 {
            tokio::task::yield_now().await;
        }
        let expected = commands.iter().fold(1, |x, n| x * 7 + n);
        while state.load(Ordering::SeqCst) != expected {
            tokio::task::yield_now().await;
        }

        actor.shutdown().await;
        assert_eq!(state.load(Ordering::SeqCst), expected);
    }

    #[tokio::test]
    async fn enqueue_after_close_signals_closed() {
        let actor = CommandActor::spawn(|(): ()| async {});
        actor.shutdown().await;
        assert_eq!(actor.enqueue(()), Err(Closed));
    }

    #[tokio::test]
    async fn conflated_applies_only_the_last_pending_command() {
        let gate = Arc::new(Notify::new());
        let applied = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&applied);
        let gate_in_handler = Arc::clone(&gate);
        let actor = ConflatedActor::spawn(move |n: u32| {
            let sink = Arc::clone(&sink);
            let gate = Arc::clone(&gate_in_handler);
            async move {
                sink.lock().unwrap().push(n);
                // Hold the consumer so follow-up enqueues pile into the slot.
                gate.notified().await;
            }
        });

        actor.enqueue(1).unwrap();
        // Wait until the consumer has taken command 1.
        while applied.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }

        actor.enqueue(2).unwrap();
        actor.enqueue(3).unwrap();
        actor.enqueue(4).unwrap();
        gate.notify_one(); // release 1; consumer takes the slot next
        while applied.lock().unwrap().len() < 2 {
            tokio::task::yield_now().await;
        }
        gate.notify_one();

        assert_eq!(*applied.lock().unwrap(), vec![1, 4]);
        actor.shutdown().await;
    }

    #[tokio::test]
    async fn conflated_enqueue_after_close_signals_closed() {
        let actor = ConflatedActor::spawn(|(): ()| async {});
        actor.shutdown().await;
        assert_eq!(actor.enqueue(()), Err(Closed));
    }
}
