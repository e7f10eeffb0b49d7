//! Per-domain access policy for publisher sockets.
//!
//! Each secured channel is named by a domain (`"heartbeat"`, `"block"`,
//! `"transaction"`). The [`Authenticator`] holds the configured credential
//! for each domain and applies a [`DomainPolicy`] to a publisher socket
//! before it is bound; subscribers must then present the credential as
//! their first frame. Key provisioning and rotation are outside this
//! layer; the table is immutable once constructed, so concurrent `apply`
//! calls from multiple service binds are safe.

use std::collections::HashMap;
use std::sync::Arc;

use crate::socket::PubSocket;

/// Access policy attached to one publisher socket: subscribers on this
/// socket must present the domain credential before registration.
#[derive(Clone)]
pub struct DomainPolicy {
    domain: String,
    key: Arc<[u8]>,
}

impl DomainPolicy {
    fn new(domain: &str, key: &[u8]) -> Self {
        Self {
            domain: domain.to_string(),
            key: key.into(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub(crate) fn authorizes(&self, presented: &[u8]) -> bool {
        *self.key == *presented
    }
}

/// Applies per-domain access policy to publisher sockets.
pub struct Authenticator {
    keys: HashMap<String, Vec<u8>>,
}

impl Authenticator {
    /// Build from the configured domain → credential table.
    pub fn new(keys: HashMap<String, String>) -> Self {
        Self {
            keys: keys
                .into_iter()
                .map(|(domain, key)| (domain, key.into_bytes()))
                .collect(),
        }
    }

    /// Apply the `domain` policy to `socket` before bind.
    ///
    /// Returns false when `require_encryption` is set and no credential is
    /// configured for the domain; the caller must treat that as a hard
    /// precondition failure and not proceed to bind. Without
    /// `require_encryption`, a missing credential leaves the socket public.
    pub fn apply(&self, socket: &mut PubSocket, domain: &str, require_encryption: bool) -> bool {
        match self.keys.get(domain) {
            Some(key) => {
                socket.set_policy(DomainPolicy::new(domain, key));
                true
            }
            None if require_encryption => {
                tracing::error!(domain, "no credential configured for secure domain");
                false
            }
            None => true,
        }
    }

    /// The configured credential for a domain, if any. Clients connecting
    /// to a secured channel present this during the handshake.
    pub fn credential(&self, domain: &str) -> Option<&[u8]> {
        self.keys.get(domain).map(Vec::as_slice)
    }
}
