//! Block notification publisher service.
//!
//! Re-publishes confirmed blocks from the node's processing pipeline to
//! remote subscribers. The pipeline hands `{height, block bytes}` pairs
//! over a bounded queue; the block bytes are opaque to this layer.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use stela_messages::BlockNotification;
use stela_network::{Authenticator, Context, PubSocket};

use crate::config::ServerSettings;
use crate::worker::{Service, WorkerSignals};

const DOMAIN: &str = "block";

/// How often the loop re-checks the external stop flag while idle.
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(250);

/// Concrete worker service publishing the block notification channel.
pub struct BlockService {
    context: Context,
    authenticator: Arc<Authenticator>,
    settings: ServerSettings,
    secure: bool,
    feed: mpsc::Receiver<BlockNotification>,
}

impl BlockService {
    pub fn new(
        context: &Context,
        authenticator: Arc<Authenticator>,
        settings: &ServerSettings,
        secure: bool,
        feed: mpsc::Receiver<BlockNotification>,
    ) -> Self {
        Self {
            context: context.clone(),
            authenticator,
            settings: settings.clone(),
            secure,
            feed,
        }
    }

    fn security(&self) -> &'static str {
        if self.secure {
            "secure"
        } else {
            "public"
        }
    }

    fn endpoint(&self) -> &str {
        if self.secure {
            &self.settings.secure_block_endpoint
        } else {
            &self.settings.public_block_endpoint
        }
    }

    async fn bind(&self, publisher: &mut PubSocket) -> bool {
        if self.secure && !self.authenticator.apply(publisher, DOMAIN, true) {
            tracing::error!("failed to apply authenticator to secure block service");
            return false;
        }

        let endpoint = self.endpoint();
        if let Err(e) = publisher.bind(endpoint).await {
            tracing::error!(
                security = self.security(),
                endpoint,
                error = %e,
                "failed to bind block service"
            );
            return false;
        }

        tracing::info!(security = self.security(), endpoint, "bound block service");
        true
    }

    async fn unbind(&self, publisher: &mut PubSocket) -> bool {
        if !publisher.stop().await {
            tracing::error!(security = self.security(), "failed to disconnect block worker");
            return false;
        }
        true
    }

    async fn publish(&self, notification: &BlockNotification, publisher: &PubSocket) {
        if let Err(e) = publisher.send(&notification.encode()).await {
            if !e.is_stopped() {
                tracing::warn!(
                    security = self.security(),
                    error = %e,
                    "failed to publish block notification"
                );
            }
            return;
        }

        if self.settings.log_requests {
            tracing::debug!(
                security = self.security(),
                height = notification.height,
                "published block notification"
            );
        }
    }
}

impl Service for BlockService {
    fn work(&mut self, signals: &mut WorkerSignals) -> impl Future<Output = ()> + Send {
        async move {
            let mut publisher = PubSocket::new(&self.context);

            if !signals.started(self.bind(&mut publisher).await) {
                return;
            }

            let mut shutdown_rx = self.context.subscribe();

            loop {
                if self.context.is_stopping() || signals.stopped() {
                    break;
                }
                let notification = tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(STOP_CHECK_INTERVAL) => continue,
                    item = self.feed.recv() => match item {
                        Some(notification) => notification,
                        // The pipeline dropped its sender; nothing further
                        // will ever arrive.
                        None => break,
                    },
                };
                self.publish(&notification, &publisher).await;
            }

            signals.finished(self.unbind(&mut publisher).await);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker;
    use stela_network::SubSocket;

    fn test_settings(endpoint: &str) -> ServerSettings {
        ServerSettings {
            public_block_endpoint: endpoint.to_string(),
            ..ServerSettings::default()
        }
    }

    /// Reserve an ephemeral port so the service can bind a known endpoint.
    async fn reserve_endpoint() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().to_string()
    }

    async fn recv_frame(socket: &mut SubSocket) -> Vec<u8> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(frame) = socket.try_recv() {
                    return frame;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("notification never arrived")
    }

    #[tokio::test]
    async fn republishes_fed_blocks_in_order() {
        let context = Context::new();
        let authenticator = Arc::new(Authenticator::new(Default::default()));
        let endpoint = reserve_endpoint().await;
        let (feed_tx, feed_rx) = mpsc::channel(16);

        let service = BlockService::new(
            &context,
            authenticator,
            &test_settings(&endpoint),
            false,
            feed_rx,
        );
        let mut handle = worker::start(service);
        assert!(handle.wait_started().await);

        let mut subscriber = SubSocket::connect(&context, &endpoint, None).await.unwrap();
        // Let the subscriber finish registering before feeding blocks.
        tokio::time::sleep(Duration::from_millis(50)).await;

        for height in 10u32..13 {
            feed_tx
                .send(BlockNotification {
                    height,
                    block: vec![height as u8; 8],
                })
                .await
                .unwrap();
        }

        for height in 10u32..13 {
            let frame = recv_frame(&mut subscriber).await;
            let decoded = BlockNotification::decode(&frame).unwrap();
            assert_eq!(decoded.height, height);
            assert_eq!(decoded.block, vec![height as u8; 8]);
        }

        context.stop();
        assert_eq!(handle.join().await, Some(true));
    }

    #[tokio::test]
    async fn closed_feed_finishes_cleanly() {
        let context = Context::new();
        let authenticator = Arc::new(Authenticator::new(Default::default()));
        let endpoint = reserve_endpoint().await;
        let (feed_tx, feed_rx) = mpsc::channel::<BlockNotification>(1);

        let service = BlockService::new(
            &context,
            authenticator,
            &test_settings(&endpoint),
            false,
            feed_rx,
        );
        let mut handle = worker::start(service);
        assert!(handle.wait_started().await);

        drop(feed_tx);
        assert_eq!(handle.join().await, Some(true));
    }

    #[tokio::test]
    async fn secure_without_credential_never_starts() {
        let context = Context::new();
        let authenticator = Arc::new(Authenticator::new(Default::default()));
        let (_feed_tx, feed_rx) = mpsc::channel(1);

        let service = BlockService::new(
            &context,
            authenticator,
            &ServerSettings::default(),
            true,
            feed_rx,
        );
        let mut handle = worker::start(service);
        assert!(!handle.wait_started().await);
    }
}
