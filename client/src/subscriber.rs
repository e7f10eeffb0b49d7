//! Notification subscriptions and the callback pump.

use stela_messages::BlockNotification;
use stela_network::{Context, SubSocket};

/// Callback invoked once per decoded block notification: height, then
/// the opaque block bytes.
pub type BlockCallback = Box<dyn FnMut(u32, Vec<u8>) + Send>;

/// Callback invoked once per transaction notification payload.
pub type TransactionCallback = Box<dyn FnMut(Vec<u8>) + Send>;

/// Owns the two subscriber sockets (blocks, transactions) and their
/// registered callbacks. No background thread reads the sockets: the
/// owner drives delivery by calling [`SubscriberClient::update`], which
/// drains whatever frames are pending and returns immediately.
pub struct SubscriberClient {
    context: Context,
    socket_block: Option<SubSocket>,
    socket_tx: Option<SubSocket>,
    notify_block: Option<BlockCallback>,
    notify_tx: Option<TransactionCallback>,
}

impl SubscriberClient {
    pub fn new(context: &Context) -> Self {
        Self {
            context: context.clone(),
            socket_block: None,
            socket_tx: None,
            notify_block: None,
            notify_tx: None,
        }
    }

    /// Connect the block subscription and register its callback.
    ///
    /// Any previous block subscription is torn down first, so a callback
    /// slot never has two live receivers. Returns false if the
    /// connection fails; nothing is delivered until [`update`] is called.
    ///
    /// [`update`]: SubscriberClient::update
    pub async fn subscribe_blocks(
        &mut self,
        endpoint: &str,
        notify: impl FnMut(u32, Vec<u8>) + Send + 'static,
    ) -> bool {
        self.socket_block = None;
        match SubSocket::connect(&self.context, endpoint, None).await {
            Ok(socket) => {
                self.socket_block = Some(socket);
                self.notify_block = Some(Box::new(notify));
                true
            }
            Err(e) => {
                tracing::error!(endpoint, error = %e, "failed to subscribe to block notifications");
                false
            }
        }
    }

    /// Connect the transaction subscription and register its callback.
    /// Same replace semantics and failure reporting as
    /// [`SubscriberClient::subscribe_blocks`].
    pub async fn subscribe_transactions(
        &mut self,
        endpoint: &str,
        notify: impl FnMut(Vec<u8>) + Send + 'static,
    ) -> bool {
        self.socket_tx = None;
        match SubSocket::connect(&self.context, endpoint, None).await {
            Ok(socket) => {
                self.socket_tx = Some(socket);
                self.notify_tx = Some(Box::new(notify));
                true
            }
            Err(e) => {
                tracing::error!(
                    endpoint,
                    error = %e,
                    "failed to subscribe to transaction notifications"
                );
                false
            }
        }
    }

    /// Single-threaded, non-blocking pump: drain exactly the frames
    /// currently pending on each channel, invoking the matching callback
    /// once per frame in arrival order. Returns without suspending
    /// whether or not data was ready. No ordering is guaranteed across
    /// the two channels.
    pub fn update(&mut self) {
        self.recv_block();
        self.recv_tx();
    }

    fn recv_block(&mut self) {
        let (Some(socket), Some(notify)) = (self.socket_block.as_mut(), self.notify_block.as_mut())
        else {
            return;
        };
        while let Some(frame) = socket.try_recv() {
            match BlockNotification::decode(&frame) {
                Ok(notification) => notify(notification.height, notification.block),
                Err(e) => {
                    tracing::warn!(error = %e, "dropping malformed block notification");
                }
            }
        }
    }

    fn recv_tx(&mut self) {
        let (Some(socket), Some(notify)) = (self.socket_tx.as_mut(), self.notify_tx.as_mut())
        else {
            return;
        };
        while let Some(frame) = socket.try_recv() {
            notify(frame);
        }
    }
}
