//! Server-side messaging services for the stela node.
//!
//! Concrete worker services publish on the node's one-way notification
//! channels: a periodic heartbeat plus block and transaction
//! notifications, each with a public and an authenticated secure
//! variant. The [`worker`] module supplies the shared bind/run/stop
//! lifecycle they all follow.

pub mod block_service;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod logging;
pub mod transaction_service;
pub mod worker;

pub use block_service::BlockService;
pub use config::ServerSettings;
pub use error::SettingsError;
pub use heartbeat::HeartbeatService;
pub use transaction_service::TransactionService;
pub use worker::{Service, WorkerHandle, WorkerStatus};
