//! Generic worker lifecycle for long-lived publisher services.
//!
//! A [`Service`] implements `work()`: bind a socket, run a loop until
//! stopped, unbind. [`start`] activates exactly one task per service
//! instance on the runtime; the returned [`WorkerHandle`] requests
//! cooperative stop and observes the lifecycle outcome.
//!
//! Lifecycle reporting is a strict state machine: `work()` must call
//! [`WorkerSignals::started`] exactly once after its bind attempt (false
//! means the service never enters its loop) and, when it did start,
//! [`WorkerSignals::finished`] exactly once at loop exit. Violating that
//! order is a programming error and panics.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Observable lifecycle state of a worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerStatus {
    /// `work()` has not reported its bind outcome yet.
    Created,
    /// Bind succeeded; the service loop is running.
    Started,
    /// Bind failed; the loop was never entered. Terminal.
    NotStarted,
    /// The loop exited; `clean` reports whether unbind succeeded. Terminal.
    Finished { clean: bool },
}

enum LifecycleState {
    Created,
    Running,
    Done,
}

/// Handed to `work()`: the cooperative stop flag plus the exactly-once
/// lifecycle reporting guard.
pub struct WorkerSignals {
    stop: Arc<AtomicBool>,
    status_tx: watch::Sender<WorkerStatus>,
    state: LifecycleState,
}

impl WorkerSignals {
    /// Whether an external stop has been requested. `work()` must observe
    /// this at each loop checkpoint.
    pub fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Report the bind outcome. Returns `ok` so the idiomatic call is
    /// `if !signals.started(self.bind(..).await) { return; }`.
    ///
    /// # Panics
    ///
    /// Panics if called more than once, or after [`WorkerSignals::finished`].
    pub fn started(&mut self, ok: bool) -> bool {
        match self.state {
            LifecycleState::Created => {}
            _ => panic!("started() reported twice on one worker"),
        }
        self.state = if ok {
            LifecycleState::Running
        } else {
            LifecycleState::Done
        };
        let _ = self.status_tx.send(if ok {
            WorkerStatus::Started
        } else {
            WorkerStatus::NotStarted
        });
        ok
    }

    /// Report the unbind outcome at loop exit.
    ///
    /// # Panics
    ///
    /// Panics if the worker never started, or if called more than once.
    pub fn finished(&mut self, ok: bool) {
        match self.state {
            LifecycleState::Running => {}
            LifecycleState::Created => panic!("finished() reported before started()"),
            LifecycleState::Done => panic!("finished() reported twice on one worker"),
        }
        self.state = LifecycleState::Done;
        let _ = self.status_tx.send(WorkerStatus::Finished { clean: ok });
    }
}

/// A long-lived unit of work with a bind/run/stop lifecycle.
pub trait Service: Send + 'static {
    /// The service body: bind, report `started`, loop until stopped,
    /// unbind, report `finished`.
    fn work(&mut self, signals: &mut WorkerSignals) -> impl Future<Output = ()> + Send;
}

/// Activate a service: exactly one task runs its `work()` for the
/// service's whole lifetime.
pub fn start<S: Service>(mut service: S) -> WorkerHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let (status_tx, status_rx) = watch::channel(WorkerStatus::Created);

    let mut signals = WorkerSignals {
        stop: Arc::clone(&stop),
        status_tx,
        state: LifecycleState::Created,
    };
    let join = tokio::spawn(async move {
        service.work(&mut signals).await;
    });

    WorkerHandle {
        stop,
        status_rx,
        join,
    }
}

/// Owner-side handle to a running worker.
pub struct WorkerHandle {
    stop: Arc<AtomicBool>,
    status_rx: watch::Receiver<WorkerStatus>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Request a cooperative stop. The loop observes it at its next
    /// checkpoint; this never interrupts an in-flight publish.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Current lifecycle state.
    pub fn status(&self) -> WorkerStatus {
        *self.status_rx.borrow()
    }

    /// Wait for the bind outcome: true once the service entered its loop,
    /// false if it never started. A bind failure is surfaced here (and in
    /// the logs), never as a panic or error.
    pub async fn wait_started(&mut self) -> bool {
        loop {
            match *self.status_rx.borrow() {
                WorkerStatus::Started | WorkerStatus::Finished { .. } => return true,
                WorkerStatus::NotStarted => return false,
                WorkerStatus::Created => {}
            }
            if self.status_rx.changed().await.is_err() {
                return false;
            }
        }
    }

    /// Wait for `work()` to return. Yields `Some(clean)` when the service
    /// ran and reported `finished`, `None` when it never started.
    pub async fn join(self) -> Option<bool> {
        let _ = self.join.await;
        match *self.status_rx.borrow() {
            WorkerStatus::Finished { clean } => Some(clean),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Test double that binds successfully and loops until stopped.
    struct Looper {
        unbind_ok: bool,
    }

    impl Service for Looper {
        fn work(&mut self, signals: &mut WorkerSignals) -> impl Future<Output = ()> + Send {
            let unbind_ok = self.unbind_ok;
            async move {
                if !signals.started(true) {
                    return;
                }
                while !signals.stopped() {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                signals.finished(unbind_ok);
            }
        }
    }

    /// Test double whose bind fails.
    struct BindFailure;

    impl Service for BindFailure {
        fn work(&mut self, signals: &mut WorkerSignals) -> impl Future<Output = ()> + Send {
            async move {
                if !signals.started(false) {
                    return;
                }
                unreachable!("loop must not run after started(false)");
            }
        }
    }

    #[tokio::test]
    async fn start_run_stop_reports_lifecycle() {
        let mut handle = start(Looper { unbind_ok: true });
        assert!(handle.wait_started().await);
        assert_eq!(handle.status(), WorkerStatus::Started);

        handle.stop();
        assert_eq!(handle.join().await, Some(true));
    }

    #[tokio::test]
    async fn unclean_unbind_is_reported() {
        let mut handle = start(Looper { unbind_ok: false });
        assert!(handle.wait_started().await);
        handle.stop();
        assert_eq!(handle.join().await, Some(false));
    }

    #[tokio::test]
    async fn bind_failure_never_enters_loop() {
        let mut handle = start(BindFailure);
        assert!(!handle.wait_started().await);
        assert_eq!(handle.status(), WorkerStatus::NotStarted);
        assert_eq!(handle.join().await, None);
    }

    #[test]
    #[should_panic(expected = "started() reported twice")]
    fn double_started_panics() {
        let (status_tx, _rx) = watch::channel(WorkerStatus::Created);
        let mut signals = WorkerSignals {
            stop: Arc::new(AtomicBool::new(false)),
            status_tx,
            state: LifecycleState::Created,
        };
        signals.started(true);
        signals.started(true);
    }

    #[test]
    #[should_panic(expected = "finished() reported twice")]
    fn double_finished_panics() {
        let (status_tx, _rx) = watch::channel(WorkerStatus::Created);
        let mut signals = WorkerSignals {
            stop: Arc::new(AtomicBool::new(false)),
            status_tx,
            state: LifecycleState::Created,
        };
        signals.started(true);
        signals.finished(true);
        signals.finished(true);
    }

    #[test]
    #[should_panic(expected = "finished() reported before started()")]
    fn finished_before_started_panics() {
        let (status_tx, _rx) = watch::channel(WorkerStatus::Created);
        let mut signals = WorkerSignals {
            stop: Arc::new(AtomicBool::new(false)),
            status_tx,
            state: LifecycleState::Created,
        };
        signals.finished(true);
    }
}
