//! Mutual exclusion for robot actuation.
//!
//! Every operation that moves the arm goes through one [`ConcurrencyGate`].
//! The gate is created once at startup, cloned into request handlers, and
//! lives until the process exits.
//!
//! # Execution model
//!
//! Waiting for the gate is an async suspension point, so a queued policy
//! request never occupies a runtime worker. Once acquired, the thunk runs on
//! tokio's blocking pool and the gate guard moves into that blocking task.
//! The gate is therefore released only when the thunk has actually
//! returned or unwound, even if the request that started it was dropped.

use std::any::Any;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Failures of the gated execution itself, not of the thunk.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("exclusive task panicked: {0}")]
    TaskPanicked(String),
    #[error("exclusive task was cancelled")]
    Cancelled,
}

struct GateInner {
    lock: Arc<Mutex<()>>,
    acquisitions: AtomicU64,
    waiting: AtomicUsize,
    holders: AtomicUsize,
}

/// Process-wide exclusive gate.
///
/// Waiters are served in FIFO order by tokio's fair mutex.
#[derive(Clone)]
pub struct ConcurrencyGate {
    inner: Arc<GateInner>,
}

/// Holds the gate for the lifetime of one blocking task.
struct Hold {
    inner: Arc<GateInner>,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for Hold {
    fn drop(&mut self) {
        // Runs before `_guard` is dropped, so `holders` never exceeds one.
        self.inner.holders.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Tracks one request waiting for the gate.
struct Waiting<'a>(&'a GateInner);

impl<'a> Waiting<'a> {
    fn enter(inner: &'a GateInner) -> Self {
        inner.waiting.fetch_add(1, Ordering::AcqRel);
        Self(inner)
    }
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        self.0.waiting.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ConcurrencyGate {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GateInner {
                lock: Arc::new(Mutex::new(())),
                acquisitions: AtomicU64::new(0),
                waiting: AtomicUsize::new(0),
                holders: AtomicUsize::new(0),
            }),
        }
    }

    /// Runs `thunk` on the blocking pool while holding the gate.
    ///
    /// Waits for any in-progress exclusive run to finish first. The gate is
    /// released on every exit path of the thunk, including a panic.
    pub async fn run_exclusive<F, T>(&self, thunk: F) -> Result<T, GateError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let wait_started = Instant::now();
        let guard = {
            let _waiting = Waiting::enter(&self.inner);
            Arc::clone(&self.inner.lock).lock_owned().await
        };
        self.inner.holders.fetch_add(1, Ordering::AcqRel);
        let acquisition = self.inner.acquisitions.fetch_add(1, Ordering::AcqRel) + 1;

        tracing::debug!(
            acquisition,
            waited_ms = wait_started.elapsed().as_millis() as u64,
            "Concurrency gate acquired"
        );

        let hold = Hold {
            inner: Arc::clone(&self.inner),
            _guard: guard,
        };
        let result = tokio::task::spawn_blocking(move || {
            let _hold = hold;
            thunk()
        })
        .await;

        tracing::debug!(acquisition, "Concurrency gate released");

        result.map_err(|e| {
            if e.is_panic() {
                GateError::TaskPanicked(panic_message(e.into_panic()))
            } else {
                GateError::Cancelled
            }
        })
    }

    /// Total number of times the gate has been acquired.
    pub fn acquisitions(&self) -> u64 {
        self.inner.acquisitions.load(Ordering::Acquire)
    }

    /// Number of requests currently waiting for the gate.
    pub fn waiting(&self) -> usize {
        self.inner.waiting.load(Ordering::Acquire)
    }

    /// Returns true while an exclusive task holds the gate.
    pub fn is_held(&self) -> bool {
        self.inner.holders.load(Ordering::Acquire) > 0
    }
}

impl Default for ConcurrencyGate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConcurrencyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrencyGate")
            .field("held", &self.is_held())
            .field("waiting", &self.waiting())
            .field("acquisitions", &self.acquisitions())
            .finish()
    }
}

/// Extracts the message from a panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    /// Tracks how many thunks are inside the gate at once.
    #[derive(Default)]
    struct Occupancy {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Occupancy {
        fn enter(&self) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }

        fn exit(&self) {
            self.current.fetch_sub(1, Ordering::SeqCst);
        }
    }

    async fn run_concurrently(gate: &ConcurrencyGate, sleeps_ms: &[u64]) -> usize {
        let occupancy = Arc::new(Occupancy::default());
        let tasks: Vec<_> = sleeps_ms
            .iter()
            .map(|&ms| {
                let gate = gate.clone();
                let occupancy = Arc::clone(&occupancy);
                tokio::spawn(async move {
                    gate.run_exclusive(move || {
                        occupancy.enter();
                        std::thread::sleep(Duration::from_millis(ms));
                        occupancy.exit();
                    })
                    .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }
        occupancy.peak.load(Ordering::SeqCst)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_exclusive_runs_never_overlap() {
        let gate = ConcurrencyGate::new();
        let peak = run_concurrently(&gate, &[30, 10, 20, 5, 15]).await;

        assert_eq!(peak, 1);
        assert_eq!(gate.acquisitions(), 5);
        assert!(!gate.is_held());
        assert_eq!(gate.waiting(), 0);
    }

    #[tokio::test]
    async fn test_panic_releases_gate() {
        let gate = ConcurrencyGate::new();

        let err = gate
            .run_exclusive(|| -> u32 { panic!("gripper jammed") })
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::TaskPanicked(ref m) if m == "gripper jammed"));
        assert!(!gate.is_held());

        let value = tokio::time::timeout(Duration::from_secs(5), gate.run_exclusive(|| 7))
            .await
            .expect("gate deadlocked after panic")
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_gate_held_until_thunk_returns_after_caller_dropped() {
        let gate = ConcurrencyGate::new();
        let (started_tx, started_rx) = std::sync::mpsc::channel();

        let first = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.run_exclusive(move || {
                    started_tx.send(()).unwrap();
                    std::thread::sleep(Duration::from_millis(150));
                })
                .await
            })
        };

        tokio::task::spawn_blocking(move || started_rx.recv().unwrap())
            .await
            .unwrap();
        first.abort();
        let _ = first.await;

        assert!(gate.is_held());
        let started = Instant::now();
        gate.run_exclusive(|| ()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_runtime_stays_responsive_while_held() {
        let gate = ConcurrencyGate::new();
        let long_run = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.run_exclusive(|| std::thread::sleep(Duration::from_millis(300)))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        let quick = tokio::time::timeout(Duration::from_millis(100), async { 1 + 1 }).await;
        assert_eq!(quick.unwrap(), 2);
        assert!(gate.is_held());

        long_run.await.unwrap().unwrap();
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn prop_peak_occupancy_is_one(sleeps in prop::collection::vec(0u64..6, 1..8)) {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(3)
                .enable_all()
                .build()
                .unwrap();
            let gate = ConcurrencyGate::new();
            let peak = runtime.block_on(run_concurrently(&gate, &sleeps));

            prop_assert_eq!(peak, 1);
            prop_assert_eq!(gate.acquisitions(), sleeps.len() as u64);
        }
    }
}
