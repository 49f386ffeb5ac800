//! Client connection core
//!
//! Owns one TCP socket, a background receive task that decodes protocol
//! lines, and a serialized send path. Events reach the application through
//! a [`Listener`], invoked in arrival order from the receive task.

mod client;
mod error;
mod handler;

pub use client::{Connection, ConnectionState};
pub use error::{ConnectError, ConnectionError, SendError};
pub use handler::{CallbackListener, ChannelListener, ConnectionEvent, Listener};
