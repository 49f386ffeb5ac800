//! Connection to a chat server

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, trace, warn, Instrument};
use uuid::Uuid;

use linechat_protocol::{CodecError, LineCodec, Message};

use super::error::{ConnectError, ConnectionError, SendError};
use super::handler::{ChannelListener, ConnectionEvent, Listener};

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport is being set up; never observed on a returned connection
    Connecting,
    Open,
    /// Terminal
    Closed,
}

/// Handle to one chat connection.
///
/// Cheap to clone; all clones refer to the same socket. The receive task
/// holds its own handle, so the connection stays alive until it is closed
/// or the peer goes away.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    id: Uuid,
    peer_addr: Option<SocketAddr>,
    /// Closed doubles as the shutdown signal for the receive task
    state: watch::Sender<ConnectionState>,
    /// Set once `on_disconnect` has returned
    disconnected: watch::Sender<bool>,
    /// `None` once the write half has been shut down
    writer: Mutex<Option<FramedWrite<BoxedWriter, LineCodec>>>,
    listener: Arc<dyn Listener>,
}

impl Connection {
    /// Connect to `host:port` and start the receive task.
    ///
    /// There is no timeout or retry. On failure no connection exists and
    /// the listener is never called.
    pub async fn open(
        host: &str,
        port: u16,
        listener: Arc<dyn Listener>,
    ) -> Result<Self, ConnectError> {
        let addr = format!("{}:{}", host, port);
        debug!("Connecting to {}", addr);

        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|source| ConnectError {
                addr: addr.clone(),
                source,
            })?;

        let peer_addr = stream.peer_addr().ok();
        info!("Connected to {}", addr);

        let (reader, writer) = stream.into_split();
        Ok(Self::spawn(reader, writer, peer_addr, listener))
    }

    /// [`open`](Self::open) with a [`ChannelListener`], returning the event stream
    pub async fn open_with_events(
        host: &str,
        port: u16,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ConnectionEvent>), ConnectError> {
        let (listener, events) = ChannelListener::new();
        let connection = Self::open(host, port, Arc::new(listener)).await?;
        Ok((connection, events))
    }

    /// Run a connection over an already established transport.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_parts<R, W>(reader: R, writer: W, listener: Arc<dyn Listener>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::spawn(reader, writer, None, listener)
    }

    fn spawn<R, W>(
        reader: R,
        writer: W,
        peer_addr: Option<SocketAddr>,
        listener: Arc<dyn Listener>,
    ) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (state, state_rx) = watch::channel(ConnectionState::Connecting);
        let (disconnected, _) = watch::channel(false);
        let writer: BoxedWriter = Box::new(writer);

        let connection = Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                peer_addr,
                state,
                disconnected,
                writer: Mutex::new(Some(FramedWrite::new(writer, LineCodec::new()))),
                listener,
            }),
        };

        connection.inner.state.send_replace(ConnectionState::Open);

        let span = tracing::info_span!(
            "connection",
            id = %connection.id(),
            peer = ?peer_addr,
        );
        let reader = FramedRead::new(reader, LineCodec::new());
        tokio::spawn(connection.clone().receive_loop(reader, state_rx).instrument(span));

        connection
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Remote address, when connected over TCP
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.peer_addr
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Send one chat line. `raw` must not contain a newline.
    ///
    /// Concurrent callers are serialized; each line reaches the wire whole.
    pub async fn send_string(&self, raw: &str) -> Result<(), SendError> {
        if raw.contains('\n') {
            return Err(SendError::EmbeddedNewline);
        }
        self.send_message(Message::text(raw)).await
    }

    /// Send a named binary payload as an image line.
    ///
    /// The encoded line is subject to the same limit as incoming lines
    /// ([`MAX_LINE_LENGTH`](linechat_protocol::MAX_LINE_LENGTH)). Base64
    /// inflates the payload by a third, so payloads above roughly 12 MiB
    /// fail with [`SendError::LineTooLong`] before anything is written.
    pub async fn send_image(&self, name: &str, payload: &[u8]) -> Result<(), SendError> {
        if name.contains('\n') {
            return Err(SendError::EmbeddedNewline);
        }
        self.send_message(Message::image(name, payload)).await
    }

    async fn send_message(&self, message: Message) -> Result<(), SendError> {
        if !self.is_open() {
            return Err(SendError::Closed);
        }

        let mut state_rx = self.inner.state.subscribe();
        let mut guard = self.inner.writer.lock().await;

        // State may have changed while waiting for the lock
        let writer = match guard.as_mut() {
            Some(writer) if self.is_open() => writer,
            _ => return Err(SendError::Closed),
        };

        // A write blocked on a stalled peer is abandoned once the connection closes
        let outcome = tokio::select! {
            biased;

            _ = wait_closed(&mut state_rx) => None,
            result = writer.send(message) => Some(result),
        };

        match outcome {
            None => {
                debug!(id = %self.id(), "Connection closed during send, dropping write half");
                guard.take();
                Err(SendError::Closed)
            }
            Some(Ok(())) => {
                if !self.is_open() {
                    guard.take();
                }
                Ok(())
            }
            Some(Err(CodecError::LineTooLong { max })) => Err(SendError::LineTooLong { max }),
            Some(Err(CodecError::Io(e))) => {
                error!(id = %self.id(), "Failed to send line: {}", e);
                guard.take();
                drop(guard);
                self.transition_closed();
                Err(SendError::Io(e))
            }
        }
    }

    /// Close the connection.
    ///
    /// Idempotent. The receive task stops and delivers `on_disconnect`
    /// once, no matter how many times this is called. A send blocked on
    /// the peer is cancelled with [`SendError::Closed`].
    pub async fn close(&self) {
        if self.transition_closed() {
            info!(id = %self.id(), "Closing connection");
        }

        // Also releases a write half left behind when the peer closed first
        let writer = self.inner.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.close().await {
                debug!(id = %self.id(), "Error shutting down write half: {}", e);
            }
        }
    }

    /// Wait until `on_disconnect` has been delivered
    pub async fn closed(&self) {
        let mut rx = self.inner.disconnected.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Move to Closed; returns false if already there
    fn transition_closed(&self) -> bool {
        self.inner.state.send_if_modified(|state| {
            if *state == ConnectionState::Closed {
                false
            } else {
                *state = ConnectionState::Closed;
                true
            }
        })
    }

    /// Sole caller of the listener
    async fn receive_loop<R>(
        self,
        mut reader: FramedRead<R, LineCodec>,
        mut state_rx: watch::Receiver<ConnectionState>,
    ) where
        R: AsyncRead + Unpin,
    {
        let listener = Arc::clone(&self.inner.listener);
        listener.on_ready(&self);

        loop {
            tokio::select! {
                biased;

                _ = wait_closed(&mut state_rx) => {
                    debug!("Connection closed locally, stopping receive loop");
                    break;
                }

                frame = reader.next() => match frame {
                    Some(Ok(Ok(message))) => {
                        trace!(image = message.is_image(), "Received line");
                        listener.on_receive(&self, message);
                    }
                    Some(Ok(Err(e))) => {
                        warn!("Discarding undecodable line: {}", e);
                        listener.on_exception(&self, ConnectionError::Decode(e));
                    }
                    Some(Err(e)) => {
                        error!("Failed to receive line: {}", e);
                        listener.on_exception(&self, e.into());
                        break;
                    }
                    None => {
                        info!("Server closed connection");
                        listener.on_exception(&self, ConnectionError::Eof);
                        break;
                    }
                }
            }
        }

        self.transition_closed();

        // A sender holding the lock sees Closed and drops the write half itself
        if let Ok(mut writer) = self.inner.writer.try_lock() {
            writer.take();
        }

        listener.on_disconnect(&self);
        self.inner.disconnected.send_replace(true);
    }
}

async fn wait_closed(rx: &mut watch::Receiver<ConnectionState>) {
    while *rx.borrow_and_update() != ConnectionState::Closed {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Connection {}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("peer_addr", &self.inner.peer_addr)
            .field("state", &self.state())
            .finish()
    }
}
