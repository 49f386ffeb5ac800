//! linechat-protocol: Wire definitions for the linechat line protocol
//!
//! Every protocol unit is a single newline-terminated UTF-8 line. A line
//! starting with `IMAGE:` carries a named base64 payload; anything else is
//! an opaque chat line owned by the application.

pub mod codec;
pub mod messages;

// Re-export main types at crate root
pub use codec::{decode, encode_image, encode_text, CodecError, LineCodec, MAX_LINE_LENGTH};
pub use messages::{DecodeError, Message, IMAGE_PREFIX};
