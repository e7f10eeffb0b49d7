//! Timer wait interruptible by context shutdown.

use std::time::Duration;

use tokio::sync::broadcast;

use crate::context::Context;

/// Outcome of a [`Poller::wait`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wait {
    /// The full interval elapsed.
    TimedOut,
    /// The owning context began shutdown before the interval elapsed.
    Terminated,
}

/// Waits out timer intervals on behalf of a service loop, reporting
/// termination as soon as the owning [`Context`] begins shutdown.
pub struct Poller {
    context: Context,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Poller {
    pub fn new(context: &Context) -> Self {
        Self {
            context: context.clone(),
            shutdown_rx: context.subscribe(),
        }
    }

    /// Whether the owning context has begun shutdown.
    pub fn terminated(&self) -> bool {
        self.context.is_stopping()
    }

    /// Sleep for `interval`, returning early if shutdown is signalled.
    pub async fn wait(&mut self, interval: Duration) -> Wait {
        if self.terminated() {
            return Wait::Terminated;
        }
        tokio::select! {
            // A recv error means the sender is gone, which only happens
            // when the context itself is being torn down.
            _ = self.shutdown_rx.recv() => Wait::Terminated,
            _ = tokio::time::sleep(interval) => Wait::TimedOut,
        }
    }
}
