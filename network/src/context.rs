//! Process-wide messaging context with cooperative shutdown.
//!
//! Every poller and socket loop subscribes to the context's shutdown
//! channel and exits when it fires, either from an OS signal or a
//! programmatic [`Context::stop`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::signal;
use tokio::sync::broadcast;

/// Shared handle owning the shutdown state of the messaging layer.
///
/// Cheap to clone; all clones refer to the same context. Sockets are
/// constructed against a context and observe its shutdown cooperatively,
/// so no socket operation outlives the context's stop.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    shutdown_tx: broadcast::Sender<()>,
    stopping: AtomicBool,
}

impl Context {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            inner: Arc::new(Inner {
                shutdown_tx,
                stopping: AtomicBool::new(false),
            }),
        }
    }

    /// Begin shutdown: all pollers and socket loops are notified.
    /// Idempotent.
    pub fn stop(&self) {
        self.inner.stopping.store(true, Ordering::SeqCst);
        let _ = self.inner.shutdown_tx.send(());
    }

    /// Whether shutdown has begun.
    pub fn is_stopping(&self) -> bool {
        self.inner.stopping.load(Ordering::SeqCst)
    }

    /// Get a receiver that fires once on shutdown.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.inner.shutdown_tx.subscribe()
    }

    /// Wait for SIGTERM or SIGINT, then stop the context.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => { tracing::info!("received SIGINT, shutting down"); }
            _ = terminate => { tracing::info!("received SIGTERM, shutting down"); }
        }

        self.stop();
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_notifies_subscribers() {
        let context = Context::new();
        let mut rx = context.subscribe();
        assert!(!context.is_stopping());

        context.stop();
        assert!(context.is_stopping());
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let context = Context::new();
        context.stop();
        context.stop();
        assert!(context.is_stopping());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let context = Context::new();
        let clone = context.clone();
        context.stop();
        assert!(clone.is_stopping());
    }
}
