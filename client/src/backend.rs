//! Control channel to the remote node's backend.
//!
//! The backend cluster's query surface lives elsewhere; this side only
//! carries the authenticated stop request, on a channel distinct from
//! the notification and heartbeat channels.

use tokio::net::TcpStream;

use stela_messages::ControlRequest;
use stela_network::socket::write_framed;
use stela_network::Context;

/// Client half of the backend control channel.
pub struct BackendCluster {
    context: Context,
    connection: String,
}

impl BackendCluster {
    /// `connection` is the remote node's control endpoint.
    pub fn new(context: &Context, connection: &str) -> Self {
        Self {
            context: context.clone(),
            connection: connection.to_string(),
        }
    }

    /// Send an authenticated shutdown request carrying the shared secret.
    /// Fire-and-forget: returns false if the request could not be
    /// delivered, logged but never escalated.
    pub async fn stop(&self, secret: &str) -> bool {
        if self.context.is_stopping() {
            return false;
        }

        let request = ControlRequest::Stop {
            secret: secret.to_string(),
        };
        let frame = match request.encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode stop request");
                return false;
            }
        };

        let mut stream = match TcpStream::connect(&self.connection).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(
                    endpoint = %self.connection,
                    error = %e,
                    "failed to reach control endpoint"
                );
                return false;
            }
        };

        if let Err(e) = write_framed(&mut stream, &frame).await {
            tracing::warn!(
                endpoint = %self.connection,
                error = %e,
                "failed to deliver stop request"
            );
            return false;
        }
        true
    }
}
