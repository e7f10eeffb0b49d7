//! Client side of the stela messaging fabric.
//!
//! A [`FullnodeInterface`] owns the messaging context, the backend
//! control channel, and a [`SubscriberClient`] that receives block and
//! transaction notifications and pumps them into registered callbacks
//! via [`FullnodeInterface::update`].

pub mod backend;
pub mod interface;
pub mod subscriber;

pub use backend::BackendCluster;
pub use interface::FullnodeInterface;
pub use subscriber::{BlockCallback, SubscriberClient, TransactionCallback};
