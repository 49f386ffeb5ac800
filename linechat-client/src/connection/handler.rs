//! Listener trait and adapters

use linechat_protocol::Message;
use tokio::sync::mpsc;

use super::client::Connection;
use super::error::ConnectionError;

/// Receives lifecycle and message events for one [`Connection`].
///
/// All hooks are called from the connection's receive task in this order:
/// `on_ready` once, then any mix of `on_receive` and `on_exception`, then
/// `on_disconnect` exactly once. Nothing is delivered after `on_disconnect`.
///
/// Hooks run on the receive task. A hook that blocks stalls delivery for
/// its connection, so anything slow should be handed off elsewhere.
pub trait Listener: Send + Sync {
    /// Connection is open and the receive task has started
    fn on_ready(&self, connection: &Connection);

    /// A line was decoded
    fn on_receive(&self, connection: &Connection, message: Message);

    /// A line failed to decode, or the socket failed
    fn on_exception(&self, connection: &Connection, error: ConnectionError);

    /// Terminal event
    fn on_disconnect(&self, connection: &Connection);
}

/// Listener hooks as a value
#[derive(Debug)]
pub enum ConnectionEvent {
    Ready,
    Received(Message),
    Exception(ConnectionError),
    Disconnected,
}

impl ConnectionEvent {
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

/// Forwards every hook into an unbounded channel.
///
/// Sending never blocks, so the receive task is never stalled by a slow
/// consumer. Events are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<ConnectionEvent>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: ConnectionEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Event receiver dropped, discarding event");
        }
    }
}

impl Listener for ChannelListener {
    fn on_ready(&self, _connection: &Connection) {
        self.forward(ConnectionEvent::Ready);
    }

    fn on_receive(&self, _connection: &Connection, message: Message) {
        self.forward(ConnectionEvent::Received(message));
    }

    fn on_exception(&self, _connection: &Connection, error: ConnectionError) {
        self.forward(ConnectionEvent::Exception(error));
    }

    fn on_disconnect(&self, _connection: &Connection) {
        self.forward(ConnectionEvent::Disconnected);
    }
}

/// Simple callback-based listener
pub struct CallbackListener<F>
where
    F: Fn(&Connection, ConnectionEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackListener<F>
where
    F: Fn(&Connection, ConnectionEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> Listener for CallbackListener<F>
where
    F: Fn(&Connection, ConnectionEvent) + Send + Sync,
{
    fn on_ready(&self, connection: &Connection) {
        (self.callback)(connection, ConnectionEvent::Ready);
    }

    fn on_receive(&self, connection: &Connection, message: Message) {
        (self.callback)(connection, ConnectionEvent::Received(message));
    }

    fn on_exception(&self, connection: &Connection, error: ConnectionError) {
        (self.callback)(connection, ConnectionEvent::Exception(error));
    }

    fn on_disconnect(&self, connection: &Connection) {
        (self.callback)(connection, ConnectionEvent::Disconnected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    fn assert_listener<T: Listener + 'static>() {}

    #[test]
    fn test_listeners_are_send_sync() {
        assert_listener::<ChannelListener>();
        assert_listener::<CallbackListener<fn(&Connection, ConnectionEvent)>>();
    }

    #[test]
    fn test_is_disconnect() {
        assert!(ConnectionEvent::Disconnected.is_disconnect());
        assert!(!ConnectionEvent::Ready.is_disconnect());
    }

    #[tokio::test]
    async fn test_channel_listener_forwards_in_order() {
        let (listener, mut rx) = ChannelListener::new();
        let (client, mut peer) = tokio::io::duplex(1024);
        let (reader, writer) = tokio::io::split(client);

        let _conn = Connection::from_parts(reader, writer, Arc::new(listener));
        peer.write_all(b"one\ntwo\n").await.unwrap();
        drop(peer);

        let mut events = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            let done = event.is_disconnect();
            events.push(event);
            if done {
                break;
            }
        }

        assert_eq!(events.len(), 5);
        assert!(matches!(events[0], ConnectionEvent::Ready));
        assert!(matches!(&events[1], ConnectionEvent::Received(m) if *m == Message::text("one")));
        assert!(matches!(&events[2], ConnectionEvent::Received(m) if *m == Message::text("two")));
        assert!(matches!(events[3], ConnectionEvent::Exception(ConnectionError::Eof)));
        assert!(matches!(events[4], ConnectionEvent::Disconnected));
    }

    #[tokio::test]
    async fn test_channel_listener_tolerates_dropped_receiver() {
        let (listener, rx) = ChannelListener::new();
        drop(rx);

        let (client, peer) = tokio::io::duplex(64);
        let (reader, writer) = tokio::io::split(client);
        let conn = Connection::from_parts(reader, writer, Arc::new(listener));
        drop(peer);

        // Receive task must still run to completion
        tokio::time::timeout(Duration::from_secs(5), conn.closed())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_callback_listener_receives_events() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        let listener = CallbackListener::new(move |_conn: &Connection, _event: ConnectionEvent| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        let (client, mut peer) = tokio::io::duplex(64);
        let (reader, writer) = tokio::io::split(client);
        let conn = Connection::from_parts(reader, writer, Arc::new(listener));

        peer.write_all(b"hello\n").await.unwrap();
        drop(peer);

        tokio::time::timeout(Duration::from_secs(5), conn.closed())
            .await
            .unwrap();

        // ready, receive, eof exception, disconnect
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }
}
