//! Decoded protocol units and per-line decode failures

/// Literal prefix marking an image line
pub const IMAGE_PREFIX: &str = "IMAGE:";

/// One decoded protocol line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Opaque chat line, e.g. `"Guest: hello"`
    Text { raw: String },

    /// Named binary blob carried as `IMAGE:<name>:<base64>`
    Image { name: String, payload: Vec<u8> },
}

impl Message {
    /// Build a text message
    pub fn text(raw: impl Into<String>) -> Self {
        Self::Text { raw: raw.into() }
    }

    /// Build an image message
    pub fn image(name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self::Image {
            name: name.into(),
            payload: payload.into(),
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }
}

/// A received line that does not parse as a valid message.
///
/// Always local to one line: the connection keeps reading after it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// `IMAGE:` not followed by `<name>:<payload>`
    #[error("image line has no name/payload separator")]
    MissingSeparator,

    #[error("image payload is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("line is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}
