//! Framed publish/subscribe sockets over TCP.
//!
//! Frames are 4-byte big-endian length prefix + payload. A [`PubSocket`]
//! fans each frame out to every connected subscriber through a bounded
//! per-subscriber queue: `try_send` semantics mean a slow or absent
//! subscriber drops frames instead of blocking the publishing loop.
//! A [`SubSocket`] connects to a publisher and buffers received frames
//! for a zero-timeout [`SubSocket::try_recv`] pump.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::auth::DomainPolicy;
use crate::context::Context;
use crate::error::SocketError;

/// Maximum frame body size accepted on read.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024; // 16 MiB

/// High-water mark per subscriber: frames beyond this are dropped for
/// that subscriber until its writer catches up.
const SUBSCRIBER_QUEUE_DEPTH: usize = 64;

/// How long a secured publisher waits for a subscriber's credential frame.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Write one length-prefixed frame (4-byte big-endian length + payload).
pub async fn write_framed<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> std::io::Result<()> {
    let len_bytes = (payload.len() as u32).to_be_bytes();
    writer.write_all(&len_bytes).await?;
    writer.write_all(payload).await?;
    writer.flush().await
}

/// Read one length-prefixed frame, rejecting bodies over `max` bytes.
pub async fn read_framed<R: AsyncRead + Unpin>(
    reader: &mut R,
    max: usize,
) -> std::io::Result<Vec<u8>> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > max {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds the {max} byte limit"),
        ));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

type SubscriberQueues = Arc<Mutex<Vec<mpsc::Sender<Vec<u8>>>>>;

/// A bound publisher socket.
///
/// Exclusively owned by its service; the listener and all subscriber
/// queues are released on [`PubSocket::stop`] or drop.
pub struct PubSocket {
    context: Context,
    policy: Option<DomainPolicy>,
    bound: Option<Bound>,
}

struct Bound {
    local_addr: SocketAddr,
    subscribers: SubscriberQueues,
    accept_task: JoinHandle<()>,
}

impl Drop for Bound {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

impl PubSocket {
    /// Create an unbound publisher against the given context.
    pub fn new(context: &Context) -> Self {
        Self {
            context: context.clone(),
            policy: None,
            bound: None,
        }
    }

    /// Attach a domain policy. Must happen before bind; applying a second
    /// policy to the same socket is unsupported.
    pub(crate) fn set_policy(&mut self, policy: DomainPolicy) {
        debug_assert!(self.bound.is_none(), "policy applied after bind");
        debug_assert!(self.policy.is_none(), "policy applied twice");
        self.policy = Some(policy);
    }

    /// Bind to `endpoint` and start accepting subscribers.
    pub async fn bind(&mut self, endpoint: &str) -> Result<(), SocketError> {
        let listener = TcpListener::bind(endpoint)
            .await
            .map_err(|source| SocketError::Bind {
                endpoint: endpoint.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| SocketError::Bind {
            endpoint: endpoint.to_string(),
            source,
        })?;

        let subscribers: SubscriberQueues = Arc::new(Mutex::new(Vec::new()));
        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&subscribers),
            self.policy.clone(),
            self.context.clone(),
        ));

        self.bound = Some(Bound {
            local_addr,
            subscribers,
            accept_task,
        });
        Ok(())
    }

    /// Fan one frame out to all connected subscribers, best-effort.
    ///
    /// Never blocks: a full subscriber queue drops the frame for that
    /// subscriber, a closed one is unregistered. Returns
    /// [`SocketError::Stopped`] once the context is shutting down so the
    /// caller can tell shutdown apart from a transport failure.
    pub async fn send(&self, payload: &[u8]) -> Result<(), SocketError> {
        if self.context.is_stopping() {
            return Err(SocketError::Stopped);
        }
        let bound = self.bound.as_ref().ok_or(SocketError::NotBound)?;

        let mut queues = bound.subscribers.lock().await;
        queues.retain(|queue| match queue.try_send(payload.to_vec()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Closed(_)) => false,
        });
        Ok(())
    }

    /// Unbind: stop accepting, drop all subscriber queues, release the
    /// listener. Returns false if the socket was never bound (or already
    /// stopped).
    pub async fn stop(&mut self) -> bool {
        match self.bound.take() {
            Some(bound) => {
                bound.subscribers.lock().await.clear();
                drop(bound); // aborts the accept task
                true
            }
            None => false,
        }
    }

    /// Local address the socket is bound to.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.bound.as_ref().map(|b| b.local_addr)
    }

    /// Number of currently registered subscribers.
    pub async fn subscriber_count(&self) -> usize {
        match &self.bound {
            Some(bound) => bound.subscribers.lock().await.len(),
            None => 0,
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    subscribers: SubscriberQueues,
    policy: Option<DomainPolicy>,
    context: Context,
) {
    let mut shutdown_rx = context.subscribe();
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(register_subscriber(
                        stream,
                        peer,
                        policy.clone(),
                        Arc::clone(&subscribers),
                    ));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed on publisher socket");
                }
            }
        }
    }
}

/// Authenticate (when a policy is attached) and register one subscriber,
/// then drain its outbound queue to the wire until it closes or the
/// write fails.
async fn register_subscriber(
    stream: TcpStream,
    peer: SocketAddr,
    policy: Option<DomainPolicy>,
    subscribers: SubscriberQueues,
) {
    let (mut reader, mut writer) = stream.into_split();

    if let Some(policy) = &policy {
        if !handshake(&mut reader, peer, policy).await {
            return;
        }
    }

    let (queue_tx, mut queue_rx) = mpsc::channel::<Vec<u8>>(SUBSCRIBER_QUEUE_DEPTH);
    subscribers.lock().await.push(queue_tx);
    tracing::debug!(peer = %peer, "subscriber registered");

    while let Some(frame) = queue_rx.recv().await {
        if let Err(e) = write_framed(&mut writer, &frame).await {
            tracing::debug!(peer = %peer, error = %e, "subscriber write failed, dropping");
            break;
        }
    }
}

/// Require the subscriber's first frame to carry the domain credential.
async fn handshake(reader: &mut OwnedReadHalf, peer: SocketAddr, policy: &DomainPolicy) -> bool {
    match tokio::time::timeout(HANDSHAKE_TIMEOUT, read_framed(reader, MAX_FRAME_SIZE)).await {
        Ok(Ok(credential)) if policy.authorizes(&credential) => {
            tracing::debug!(peer = %peer, domain = %policy.domain(), "subscriber authenticated");
            true
        }
        Ok(Ok(_)) => {
            tracing::warn!(
                peer = %peer,
                domain = %policy.domain(),
                "subscriber rejected: bad credential"
            );
            false
        }
        Ok(Err(e)) => {
            tracing::warn!(peer = %peer, error = %e, "subscriber handshake read failed");
            false
        }
        Err(_) => {
            tracing::warn!(peer = %peer, "subscriber handshake timed out");
            false
        }
    }
}

/// A connected subscriber socket.
///
/// Received frames are buffered by a background read loop; the owner
/// drains them with the non-blocking [`SubSocket::try_recv`]. Dropping
/// the socket aborts the read loop and closes the connection.
pub struct SubSocket {
    frames: mpsc::Receiver<Vec<u8>>,
    read_task: JoinHandle<()>,
}

impl SubSocket {
    /// Connect to a publisher, presenting `credential` first when the
    /// publisher side is secured.
    pub async fn connect(
        context: &Context,
        endpoint: &str,
        credential: Option<&[u8]>,
    ) -> Result<Self, SocketError> {
        let stream = TcpStream::connect(endpoint)
            .await
            .map_err(|source| SocketError::Connect {
                endpoint: endpoint.to_string(),
                source,
            })?;
        let (reader, mut writer) = stream.into_split();

        if let Some(credential) = credential {
            write_framed(&mut writer, credential)
                .await
                .map_err(|source| SocketError::Connect {
                    endpoint: endpoint.to_string(),
                    source,
                })?;
        }

        let (frame_tx, frame_rx) = mpsc::channel(SUBSCRIBER_QUEUE_DEPTH);
        let read_task = tokio::spawn(read_loop(
            reader,
            writer,
            frame_tx,
            context.subscribe(),
            endpoint.to_string(),
        ));

        Ok(Self {
            frames: frame_rx,
            read_task,
        })
    }

    /// Zero-timeout check: the next pending frame, or `None`.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.frames.try_recv().ok()
    }
}

impl Drop for SubSocket {
    fn drop(&mut self) {
        self.read_task.abort();
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    frame_tx: mpsc::Sender<Vec<u8>>,
    mut shutdown_rx: tokio::sync::broadcast::Receiver<()>,
    endpoint: String,
) {
    // Holding the write half keeps the connection fully open for the
    // lifetime of the read loop.
    let _writer = writer;
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            frame = read_framed(&mut reader, MAX_FRAME_SIZE) => match frame {
                Ok(frame) => {
                    if frame_tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    if e.kind() != std::io::ErrorKind::UnexpectedEof {
                        tracing::warn!(endpoint = %endpoint, error = %e, "subscriber read failed");
                    }
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn wait_for_subscribers(socket: &PubSocket, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while socket.subscriber_count().await < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscriber never registered");
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
        .expect("frame never arrived")
    }

    #[tokio::test]
    async fn publish_reaches_subscriber_in_order() {
        let context = Context::new();
        let mut publisher = PubSocket::new(&context);
        publisher.bind("127.0.0.1:0").await.unwrap();
        let endpoint = publisher.local_addr().unwrap().to_string();

        let mut subscriber = SubSocket::connect(&context, &endpoint, None).await.unwrap();
        wait_for_subscribers(&publisher, 1).await;

        publisher.send(b"one").await.unwrap();
        publisher.send(b"two").await.unwrap();
        publisher.send(b"three").await.unwrap();

        assert_eq!(recv_frame(&mut subscriber).await, b"one");
        assert_eq!(recv_frame(&mut subscriber).await, b"two");
        assert_eq!(recv_frame(&mut subscriber).await, b"three");
    }

    #[tokio::test]
    async fn send_without_subscribers_is_dropped_not_blocked() {
        let context = Context::new();
        let mut publisher = PubSocket::new(&context);
        publisher.bind("127.0.0.1:0").await.unwrap();
        publisher.send(b"nobody listening").await.unwrap();
    }

    #[tokio::test]
    async fn send_unbound_is_an_error() {
        let context = Context::new();
        let publisher = PubSocket::new(&context);
        assert!(matches!(
            publisher.send(b"x").await,
            Err(SocketError::NotBound)
        ));
    }

    #[tokio::test]
    async fn send_after_context_stop_reports_stopped() {
        let context = Context::new();
        let mut publisher = PubSocket::new(&context);
        publisher.bind("127.0.0.1:0").await.unwrap();

        context.stop();
        let err = publisher.send(b"x").await.unwrap_err();
        assert!(err.is_stopped());
    }

    #[tokio::test]
    async fn stop_releases_the_socket_once() {
        let context = Context::new();
        let mut publisher = PubSocket::new(&context);
        publisher.bind("127.0.0.1:0").await.unwrap();

        assert!(publisher.stop().await);
        assert!(!publisher.stop().await);
        assert!(matches!(
            publisher.send(b"x").await,
            Err(SocketError::NotBound)
        ));
    }

    #[tokio::test]
    async fn bind_on_occupied_port_fails() {
        let context = Context::new();
        let mut first = PubSocket::new(&context);
        first.bind("127.0.0.1:0").await.unwrap();
        let endpoint = first.local_addr().unwrap().to_string();

        let mut second = PubSocket::new(&context);
        assert!(matches!(
            second.bind(&endpoint).await,
            Err(SocketError::Bind { .. })
        ));
    }

    #[tokio::test]
    async fn framing_roundtrip() {
        let (client, server) = tokio::io::duplex(256);
        let (mut read_half, _keep) = tokio::io::split(server);
        let (_keep2, mut write_half) = tokio::io::split(client);

        write_framed(&mut write_half, b"payload").await.unwrap();
        let frame = read_framed(&mut read_half, MAX_FRAME_SIZE).await.unwrap();
        assert_eq!(frame, b"payload");
    }

    #[tokio::test]
    async fn oversized_frame_rejected() {
        let (client, server) = tokio::io::duplex(256);
        let (mut read_half, _keep) = tokio::io::split(server);
        let (_keep2, mut write_half) = tokio::io::split(client);

        write_framed(&mut write_half, b"too big").await.unwrap();
        let err = read_framed(&mut read_half, 3).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
