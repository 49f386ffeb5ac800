//! linechat client library
//!
//! The [`connection`] module is the reusable core. [`chat`], [`cli`] and
//! [`config`] make up the terminal front end used by the `linechat` binary.

pub mod chat;
pub mod cli;
pub mod config;
pub mod connection;

pub use connection::{
    ChannelListener, ConnectError, Connection, ConnectionError, ConnectionEvent, ConnectionState,
    Listener, SendError,
};
pub use linechat_protocol::Message;
