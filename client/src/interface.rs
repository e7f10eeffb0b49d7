//! Composition root for the client side.

use stela_network::Context;

use crate::backend::BackendCluster;
use crate::subscriber::SubscriberClient;

/// Client-side view of a remote full node.
///
/// Owns the messaging context (whose lifetime is the interface's own),
/// the backend control channel, and the notification subscriber. The
/// owning thread drives delivery by calling
/// [`FullnodeInterface::update`] repeatedly.
pub struct FullnodeInterface {
    context: Context,
    backend: BackendCluster,
    subscriber: SubscriberClient,
}

impl FullnodeInterface {
    /// `connection` is the remote node's control endpoint.
    pub fn new(connection: &str) -> Self {
        let context = Context::new();
        Self {
            backend: BackendCluster::new(&context, connection),
            subscriber: SubscriberClient::new(&context),
            context,
        }
    }

    /// Subscribe to block notifications from `endpoint`. Returns false
    /// if the connection fails.
    pub async fn subscribe_blocks(
        &mut self,
        endpoint: &str,
        notify: impl FnMut(u32, Vec<u8>) + Send + 'static,
    ) -> bool {
        self.subscriber.subscribe_blocks(endpoint, notify).await
    }

    /// Subscribe to transaction notifications from `endpoint`. Returns
    /// false if the connection fails.
    pub async fn subscribe_transactions(
        &mut self,
        endpoint: &str,
        notify: impl FnMut(Vec<u8>) + Send + 'static,
    ) -> bool {
        self.subscriber.subscribe_transactions(endpoint, notify).await
    }

    /// Pump pending notifications into the registered callbacks.
    /// Non-blocking.
    pub fn update(&mut self) {
        self.subscriber.update();
    }

    /// Send an authenticated shutdown request to the remote node.
    pub async fn stop(&self, secret: &str) -> bool {
        self.backend.stop(secret).await
    }

    /// The messaging context owned by this interface.
    pub fn context(&self) -> &Context {
        &self.context
    }
}

impl Drop for FullnodeInterface {
    fn drop(&mut self) {
        // The context's lifetime is tied to the interface: tearing the
        // interface down terminates every socket loop it spawned.
        self.context.stop();
    }
}
