// ── Backoff fetcher ──
//
// A long-running poll-until-stable loop: requests arrive through a
// conflated slot, each fetch cycle either accepts, retries after a
// backoff delay, or aborts. The inter-attempt delay is itself
// interruptible — a newer request supersedes the pending wait, resets
// the backoff and refetches immediately. Cancellation is cooperative:
// an in-flight cycle always completes.

use std::future::Future;
use std::sync::Mutex;

use tokio::task::JoinHandle;

use crate::actor::Closed;
use crate::backoff::ExponentialBackoff;
use crate::conflated;

/// Verdict of one fetch cycle.
pub enum FetchControl<V> {
    /// The result is acceptable; deliver `V` unless a newer request is
    /// already waiting (coalescing — intermediate results are dropped).
    Accept(V),

    /// Not acceptable yet; wait out the backoff delay and refetch.
    Retry,

    /// Terminal for this request (e.g. the account is invalid); do not
    /// retry, do not deliver.
    Abort,
}

/// Handle to a running fetch loop.
pub struct Fetcher<R> {
    tx: conflated::Sender<R>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<R: Clone + Send + 'static> Fetcher<R> {
    /// Spawn the fetch loop.
    ///
    /// `cycle(request, attempt)` performs one blocking fetch and judges
    /// the result. `deliver` runs for accepted, non-superseded results.
    /// `observed` is consulted once per retry cycle; when it reports
    /// `false` the loop falls idle (no further polling) until the next
    /// request re-arms it.
    pub fn spawn<V, C, Fut, D, O>(
        backoff: ExponentialBackoff,
        observed: O,
        mut cycle: C,
        mut deliver: D,
    ) -> Self
    where
        V: Send + 'static,
        C: FnMut(R, u32) -> Fut + Send + 'static,
        Fut: Future<Output = FetchControl<V>> + Send,
        D: FnMut(&R, V) + Send + 'static,
        O: Fn() -> bool + Send + 'static,
    {
        let (tx, mut rx) = conflated::channel::<R>();

        let task = tokio::spawn(async move {
            let mut backoff = backoff;

            'requests: loop {
                let Some(mut request) = rx.recv().await else {
                    break;
                };

                loop {
                    let attempt = backoff.iteration();
                    match cycle(request.clone(), attempt).await {
                        FetchControl::Abort => {
                            backoff.reset();
                            break;
                        }
                        FetchControl::Accept(value) if rx.is_empty() => {
                            deliver(&request, value);
                            backoff.reset();
                            break;
                        }
                        // Acceptable but superseded, or a plain retry:
                        // either way the pending wait decides what runs
                        // next.
                        FetchControl::Accept(_) | FetchControl::Retry => {
                            match wait_for_retry(&mut backoff, &mut rx).await {
                                RetryWait::Superseded(newer) => request = newer,
                                RetryWait::Elapsed => {
                                    if !observed() {
                                        tracing::debug!(
                                            "fetch result unobserved, loop going idle"
                                        );
                                        break;
                                    }
                                }
                                RetryWait::ChannelClosed => break 'requests,
                            }
                        }
                    }
                }
            }
        });

        Self {
            tx,
            task: Mutex::new(Some(task)),
        }
    }

    /// Submit a fetch request, superseding any still-pending one.
    pub fn request(&self, request: R) -> Result<(), Closed> {
        self.tx.send(request).map_err(|_| Closed)
    }

    /// Stop the loop. The in-flight cycle, if any, completes.
    pub fn close(&self) {
        self.tx.close();
    }

    /// Close and wait for the loop task to finish.
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

enum RetryWait<R> {
    /// The backoff delay ran out; refetch the same request.
    Elapsed,
    /// A newer request arrived mid-delay; it cancels the wait and the
    /// accumulated backoff.
    Superseded(R),
    ChannelClosed,
}

async fn wait_for_retry<R>(
    backoff: &mut ExponentialBackoff,
    rx: &mut conflated::Receiver<R>,
) -> RetryWait<R> {
    let delay = backoff.next_delay();

    tokio::select! {
        biased;
        newer = rx.recv() => match newer {
            Some(request) => {
                backoff.reset();
                RetryWait::Superseded(request)
            }
            None => RetryWait::ChannelClosed,
        },
        () = tokio::time::sleep(delay) => RetryWait::Elapsed,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backoff::BackoffConfig;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn fast_backoff() -> ExponentialBackoff {
        ExponentialBackoff::new(BackoffConfig {
            scale: Duration::from_millis(50),
            cap: Duration::from_millis(1_800_000),
            steps: Some(17),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn accepts_and_delivers_on_the_first_attempt() {
        let delivered = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&delivered);
        let fetcher = Fetcher::spawn(
            fast_backoff(),
            || true,
            |request: &'static str, _attempt| async move { FetchControl::Accept(request.len()) },
            move |request, value| sink.lock().unwrap().push((*request, value)),
        );

        fetcher.request("hello").unwrap();
        while delivered.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }

        assert_eq!(*delivered.lock().unwrap(), vec![("hello", 5)]);
        fetcher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn retries_with_backoff_until_accepted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let delivered = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let sink = Arc::clone(&delivered);
        let fetcher = Fetcher::spawn(
            fast_backoff(),
            || true,
            move |(): (), attempt| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        FetchControl::Retry
                    } else {
                        FetchControl::Accept(attempt)
                    }
                }
            },
            move |_request, _value| {
                sink.fetch_add(1, Ordering::SeqCst);
            },
        );

        fetcher.request(()).unwrap();
        // Sleep-poll so the paused clock can advance through the
        // backoff delays.
        while delivered.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // Attempts 0, 1, 2 retried; attempt 3 accepted.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        fetcher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn a_newer_request_resets_the_attempt_counter() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let accepted = Arc::new(AtomicUsize::new(0));

        let log = Arc::clone(&seen);
        let sink = Arc::clone(&accepted);
        let fetcher = Fetcher::spawn(
            fast_backoff(),
            || true,
            move |request: &'static str, attempt| {
                log.lock().unwrap().push((request, attempt));
                async move {
                    if request == "first" {
                        FetchControl::Retry
                    } else {
                        FetchControl::Accept(())
                    }
                }
            },
            move |_request, ()| {
                sink.fetch_add(1, Ordering::SeqCst);
            },
        );

        fetcher.request("first").unwrap();
        while seen.lock().unwrap().len() < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        fetcher.request("second").unwrap();
        while accepted.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let log = seen.lock().unwrap().clone();
        let second = log
            .iter()
            .find(|(request, _)| *request == "second")
            .copied()
            .unwrap();
        assert_eq!(second, ("second", 0), "supersession must reset backoff");

        let first_attempts: Vec<u32> = log
            .iter()
            .filter(|(request, _)| *request == "first")
            .map(|(_, attempt)| *attempt)
            .collect();
        assert!(first_attempts.windows(2).all(|w| w[1] == w[0] + 1));

        fetcher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_results_are_not_delivered() {
        let gate = Arc::new(Notify::new());
        let delivered = Arc::new(Mutex::new(Vec::new()));

        let gate_in_cycle = Arc::clone(&gate);
        let sink = Arc::clone(&delivered);
        let fetcher = Fetcher::spawn(
            fast_backoff(),
            || true,
            move |request: u32, _attempt| {
                let gate = Arc::clone(&gate_in_cycle);
                async move {
                    if request == 1 {
                        // Hold the first cycle open so a newer request
                        // can land in the slot meanwhile.
                        gate.notified().await;
                    }
                    FetchControl::Accept(request)
                }
            },
            move |_request, value| sink.lock().unwrap().push(value),
        );

        fetcher.request(1).unwrap();
        tokio::task::yield_now().await;
        fetcher.request(2).unwrap();
        gate.notify_one();

        while delivered.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }

        // Request 1's result was stale on arrival; only 2 is delivered.
        assert_eq!(*delivered.lock().unwrap(), vec![2]);
        fetcher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn goes_idle_when_unobserved_and_rearms_on_request() {
        let observed = Arc::new(AtomicBool::new(false));
        let calls = Arc::new(AtomicUsize::new(0));

        let probe = Arc::clone(&observed);
        let counter = Arc::clone(&calls);
        let fetcher = Fetcher::spawn(
            fast_backoff(),
            move || probe.load(Ordering::SeqCst),
            move |(): (), _attempt| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { FetchControl::<()>::Retry }
            },
            |_request, ()| {},
        );

        fetcher.request(()).unwrap();
        // One attempt, one elapsed delay, probe says unobserved: idle.
        while calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A fresh request re-arms the loop even after it went idle.
        fetcher.request(()).unwrap();
        while calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        fetcher.shutdown().await;
    }
}
