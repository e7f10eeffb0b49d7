//! Messaging layer for the stela node and client.
//!
//! Provides the process-wide [`Context`] (cooperative shutdown), a framed
//! publish/subscribe socket pair over TCP, the [`Poller`] used by timer-driven
//! service loops, and the [`Authenticator`] that applies per-domain access
//! policy to publisher sockets before bind.

pub mod auth;
pub mod context;
pub mod error;
pub mod poller;
pub mod socket;

pub use auth::{Authenticator, DomainPolicy};
pub use context::Context;
pub use error::SocketError;
pub use poller::{Poller, Wait};
pub use socket::{PubSocket, SubSocket};
