//! Heartbeat publisher service.
//!
//! Broadcasts an incrementing u32 counter on a fixed period so remote
//! clients can observe node liveness. One instance serves either the
//! public or the secure endpoint; the secure variant has the
//! `"heartbeat"` domain policy applied to its socket before bind.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use stela_messages::encode_heartbeat;
use stela_network::{Authenticator, Context, Poller, PubSocket, Wait};

use crate::config::ServerSettings;
use crate::worker::{Service, WorkerSignals};

const DOMAIN: &str = "heartbeat";

/// Convert a configured interval in seconds to milliseconds, saturating
/// at the u32 ceiling (~24.8 days). The settings field is u16, so the
/// clamp is defensive and unreachable from config.
pub fn to_milliseconds(seconds: u32) -> u32 {
    seconds.saturating_mul(1000)
}

/// Concrete worker service publishing the heartbeat channel.
pub struct HeartbeatService {
    context: Context,
    authenticator: Arc<Authenticator>,
    settings: ServerSettings,
    period: Duration,
    secure: bool,
}

impl HeartbeatService {
    pub fn new(
        context: &Context,
        authenticator: Arc<Authenticator>,
        settings: &ServerSettings,
        secure: bool,
    ) -> Self {
        let period = Duration::from_millis(u64::from(to_milliseconds(u32::from(
            settings.heartbeat_interval_seconds,
        ))));
        Self {
            context: context.clone(),
            authenticator,
            settings: settings.clone(),
            period,
            secure,
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
            &self.settings.secure_heartbeat_endpoint
        } else {
            &self.settings.public_heartbeat_endpoint
        }
    }

    async fn bind(&self, publisher: &mut PubSocket) -> bool {
        if self.secure && !self.authenticator.apply(publisher, DOMAIN, true) {
            tracing::error!("failed to apply authenticator to secure heartbeat service");
            return false;
        }

        let endpoint = self.endpoint();
        if let Err(e) = publisher.bind(endpoint).await {
            tracing::error!(
                security = self.security(),
                endpoint,
                error = %e,
                "failed to bind heartbeat service"
            );
            return false;
        }

        tracing::info!(security = self.security(), endpoint, "bound heartbeat service");
        true
    }

    async fn unbind(&self, publisher: &mut PubSocket) -> bool {
        if !publisher.stop().await {
            tracing::error!(
                security = self.security(),
                "failed to disconnect heartbeat worker"
            );
            return false;
        }
        // Don't log stop success.
        true
    }

    /// Publish one counter frame, best-effort. Transport errors other
    /// than shutdown are warnings; the next period is the implicit retry.
    async fn publish(&self, count: u32, publisher: &PubSocket) {
        if let Err(e) = publisher.send(&encode_heartbeat(count)).await {
            if !e.is_stopped() {
                tracing::warn!(
                    security = self.security(),
                    error = %e,
                    "failed to publish heartbeat"
                );
            }
            return;
        }

        if self.settings.log_requests {
            tracing::debug!(security = self.security(), count, "published heartbeat");
        }
    }
}

impl Service for HeartbeatService {
    // The publisher does not block if there are no subscribers or when a
    // subscriber queue is at its high-water mark.
    fn work(&mut self, signals: &mut WorkerSignals) -> impl Future<Output = ()> + Send {
        async move {
            let mut publisher = PubSocket::new(&self.context);

            if !signals.started(self.bind(&mut publisher).await) {
                return;
            }

            let mut poller = Poller::new(&self.context);

            // Pick a random counter start; wraps around at overflow.
            let mut count: u32 = rand::random();

            loop {
                if poller.terminated() || signals.stopped() {
                    break;
                }
                if poller.wait(self.period).await == Wait::Terminated {
                    break;
                }
                if signals.stopped() {
                    break;
                }
                self.publish(count, &publisher).await;
                count = count.wrapping_add(1);
            }

            signals.finished(self.unbind(&mut publisher).await);
        }
    }
}
