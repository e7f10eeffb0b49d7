//! Transaction notification publisher service.
//!
//! Same worker shape as the block service, but frames carry the opaque
//! transaction payload alone, with no header.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use stela_network::{Authenticator, Context, PubSocket};

use crate::config::ServerSettings;
use crate::worker::{Service, WorkerSignals};

const DOMAIN: &str = "transaction";

const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(250);

/// Concrete worker service publishing the transaction notification channel.
pub struct TransactionService {
    context: Context,
    authenticator: Arc<Authenticator>,
    settings: ServerSettings,
    secure: bool,
    feed: mpsc::Receiver<Vec<u8>>,
}

impl TransactionService {
    pub fn new(
        context: &Context,
        authenticator: Arc<Authenticator>,
        settings: &ServerSettings,
        secure: bool,
        feed: mpsc::Receiver<Vec<u8>>,
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
            &self.settings.secure_transaction_endpoint
        } else {
            &self.settings.public_transaction_endpoint
        }
    }

    async fn bind(&self, publisher: &mut PubSocket) -> bool {
        if self.secure && !self.authenticator.apply(publisher, DOMAIN, true) {
            tracing::error!("failed to apply authenticator to secure transaction service");
            return false;
        }

        let endpoint = self.endpoint();
        if let Err(e) = publisher.bind(endpoint).await {
            tracing::error!(
                security = self.security(),
                endpoint,
                error = %e,
                "failed to bind transaction service"
            );
            return false;
        }

        tracing::info!(
            security = self.security(),
            endpoint,
            "bound transaction service"
        );
        true
    }

    async fn unbind(&self, publisher: &mut PubSocket) -> bool {
        if !publisher.stop().await {
            tracing::error!(
                security = self.security(),
                "failed to disconnect transaction worker"
            );
            return false;
        }
        true
    }

    async fn publish(&self, transaction: &[u8], publisher: &PubSocket) {
        if let Err(e) = publisher.send(transaction).await {
            if !e.is_stopped() {
                tracing::warn!(
                    security = self.security(),
                    error = %e,
                    "failed to publish transaction notification"
                );
            }
            return;
        }

        if self.settings.log_requests {
            tracing::debug!(
                security = self.security(),
                bytes = transaction.len(),
                "published transaction notification"
            );
        }
    }
}

impl Service for TransactionService {
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
                let transaction = tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(STOP_CHECK_INTERVAL) => continue,
                    item = self.feed.recv() => match item {
                        Some(transaction) => transaction,
                        None => break,
                    },
                };
                self.publish(&transaction, &publisher).await;
            }

            signals.finished(self.unbind(&mut publisher).await);
        }
    }
}
