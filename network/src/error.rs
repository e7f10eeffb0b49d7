use thiserror::Error;

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: String,
        source: std::io::Error,
    },

    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    #[error("socket is not bound")]
    NotBound,

    #[error("messaging context is stopping")]
    Stopped,

    #[error("authentication handshake rejected")]
    HandshakeRejected,
}

impl SocketError {
    /// Whether this error is the expected shutdown signal rather than a
    /// genuine transport failure. Loops use this to decide between a clean
    /// exit and a warning.
    pub fn is_stopped(&self) -> bool {
        matches!(self, SocketError::Stopped)
    }
}
