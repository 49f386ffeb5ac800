//! Line codec for the chat protocol
//!
//! [`decode`], [`encode_text`] and [`encode_image`] are pure translations
//! between wire lines and [`Message`] values. [`LineCodec`] adds newline
//! framing on top of them for use with `tokio_util::codec`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::messages::{DecodeError, Message, IMAGE_PREFIX};

/// Maximum line length in bytes, excluding the newline (16 MB)
pub const MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;

/// Decode one wire line (without its terminator).
///
/// Lines starting with `IMAGE:` are split at the first colon after the
/// prefix into name and base64 payload. A name containing a colon is not
/// repaired: the excess ends up in the payload and base64 decoding fails.
pub fn decode(line: &str) -> Result<Message, DecodeError> {
    let Some(rest) = line.strip_prefix(IMAGE_PREFIX) else {
        return Ok(Message::Text {
            raw: line.to_string(),
        });
    };

    let (name, payload_text) = rest.split_once(':').ok_or(DecodeError::MissingSeparator)?;
    let payload = STANDARD.decode(payload_text)?;

    Ok(Message::Image {
        name: name.to_string(),
        payload,
    })
}

/// Encode a chat line. The raw text is the wire line.
///
/// The caller must not pass text containing `\n`.
pub fn encode_text(raw: &str) -> String {
    raw.to_string()
}

/// Encode an image line as `IMAGE:<name>:<base64>`
pub fn encode_image(name: &str, payload: &[u8]) -> String {
    format!("{}{}:{}", IMAGE_PREFIX, name, STANDARD.encode(payload))
}

fn encode_message(message: &Message) -> String {
    match message {
        Message::Text { raw } => encode_text(raw),
        Message::Image { name, payload } => encode_image(name, payload),
    }
}

fn decode_bytes(line: &[u8]) -> Result<Message, DecodeError> {
    let line = std::str::from_utf8(line)?;
    decode(line)
}

fn strip_carriage_return(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Stream-level codec error. Unlike [`DecodeError`] these end the stream.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line exceeds maximum length of {max} bytes")]
    LineTooLong { max: usize },
}

/// Newline framing codec.
///
/// Each decoded item is the per-line result, so a malformed line surfaces
/// as `Ok(Some(Err(DecodeError)))` and the stream keeps going. Only I/O
/// failures and over-length lines are stream errors.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_length: usize,
    /// Bytes already scanned for a newline in the buffered partial line
    next_index: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = Result<Message, DecodeError>;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // A newline at index `max_length` still terminates a valid line
        let read_to = src.len().min(self.max_length.saturating_add(1));

        let newline = src[self.next_index..read_to]
            .iter()
            .position(|b| *b == b'\n');

        match newline {
            Some(offset) => {
                let newline_index = self.next_index + offset;
                self.next_index = 0;
                let frame = src.split_to(newline_index + 1);
                let line = strip_carriage_return(&frame[..newline_index]);
                Ok(Some(decode_bytes(line)))
            }
            None if src.len() > self.max_length => Err(CodecError::LineTooLong {
                max: self.max_length,
            }),
            None => {
                self.next_index = read_to;
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }

        self.next_index = 0;
        if src.is_empty() {
            return Ok(None);
        }

        // Unterminated final line
        let frame = src.split_to(src.len());
        Ok(Some(decode_bytes(strip_carriage_return(&frame))))
    }
}

impl Encoder<Message> for LineCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = encode_message(&item);

        if line.len() > self.max_length {
            return Err(CodecError::LineTooLong {
                max: self.max_length,
            });
        }

        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio_util::codec::FramedRead;

    #[test]
    fn test_image_roundtrip() {
        let payloads: Vec<Vec<u8>> = vec![
            Vec::new(),
            vec![0xff],
            vec![0x89, b'P', b'N'],
            (0..=255u8).collect(),
        ];

        for payload in payloads {
            let line = encode_image("cat.png", &payload);
            assert_eq!(decode(&line).unwrap(), Message::image("cat.png", payload));
        }
    }

    #[test]
    fn test_text_roundtrip() {
        for raw in ["Guest: hi", "", "IMAGE", "image:lowercase:abc", " IMAGE:leading space"] {
            assert_eq!(decode(&encode_text(raw)).unwrap(), Message::text(raw));
        }
    }

    #[test]
    fn test_encode_image_format() {
        assert_eq!(encode_image("cat.png", &[1, 2, 3]), "IMAGE:cat.png:AQID");
    }

    #[test]
    fn test_decode_image_without_separator() {
        assert_eq!(
            decode("IMAGE:onlyonepart"),
            Err(DecodeError::MissingSeparator)
        );
        assert_eq!(decode("IMAGE:"), Err(DecodeError::MissingSeparator));
    }

    #[test]
    fn test_decode_invalid_base64() {
        let result = decode("IMAGE:name:not-valid-base64!!");
        assert!(matches!(result, Err(DecodeError::InvalidBase64(_))));
    }

    #[test]
    fn test_decode_unpadded_base64_rejected() {
        // Standard engine requires canonical padding
        assert!(matches!(decode("IMAGE:a:AQ"), Err(DecodeError::InvalidBase64(_))));
    }

    #[test]
    fn test_colon_in_name_fails_instead_of_misparsing() {
        let line = encode_image("weird:name.png", &[1, 2, 3]);
        assert!(matches!(decode(&line), Err(DecodeError::InvalidBase64(_))));
    }

    #[test]
    fn test_empty_name_and_payload() {
        assert_eq!(decode("IMAGE::").unwrap(), Message::image("", Vec::new()));
    }

    #[test]
    fn test_line_codec_splits_lines() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"Guest: hi\nIMAGE:cat.png:AQID\nrest"[..]);

        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first, Ok(Message::text("Guest: hi")));

        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(second, Ok(Message::image("cat.png", vec![1, 2, 3])));

        // Partial line stays buffered
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(&buf[..], b"rest");

        buf.extend_from_slice(b" of it\n");
        let third = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(third, Ok(Message::text("rest of it")));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_line_codec_strips_crlf() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"Guest: hi\r\n"[..]);
        let item = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(item, Ok(Message::text("Guest: hi")));
    }

    #[test]
    fn test_line_codec_bad_line_is_not_fatal() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"IMAGE:broken\n\xff\xfe\nok\n"[..]);

        let bad = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(bad, Err(DecodeError::MissingSeparator));

        let not_utf8 = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(not_utf8, Err(DecodeError::InvalidUtf8(_))));

        let good = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(good, Ok(Message::text("ok")));
    }

    #[test]
    fn test_line_codec_too_long() {
        let mut codec = LineCodec::with_max_length(4);
        let mut buf = BytesMut::from(&b"abcde"[..]);
        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(CodecError::LineTooLong { max: 4 })));
    }

    #[test]
    fn test_line_codec_exact_max_length_accepted() {
        let mut codec = LineCodec::with_max_length(4);
        let mut buf = BytesMut::from(&b"abcd\n"[..]);
        let item = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(item, Ok(Message::text("abcd")));
    }

    #[test]
    fn test_line_codec_eof_flushes_partial_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"last words"[..]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        let item = codec.decode_eof(&mut buf).unwrap().unwrap();
        assert_eq!(item, Ok(Message::text("last words")));
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_line_codec_encode_appends_newline() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();

        codec.encode(Message::text("Guest: hi"), &mut buf).unwrap();
        codec
            .encode(Message::image("cat.png", vec![1, 2, 3]), &mut buf)
            .unwrap();

        assert_eq!(&buf[..], b"Guest: hi\nIMAGE:cat.png:AQID\n");
    }

    #[test]
    fn test_line_codec_encode_too_long() {
        let mut codec = LineCodec::with_max_length(3);
        let mut buf = BytesMut::new();
        let result = codec.encode(Message::text("toolong"), &mut buf);
        assert!(matches!(result, Err(CodecError::LineTooLong { max: 3 })));
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_framed_read_over_stream() {
        let wire: &[u8] = b"Guest: hi\nIMAGE:x\nIMAGE:cat.png:AQID\n";
        let mut framed = FramedRead::new(wire, LineCodec::new());

        let mut items = Vec::new();
        while let Some(item) = framed.next().await {
            items.push(item.unwrap());
        }

        assert_eq!(items.len(), 3);
        assert_eq!(items[0], Ok(Message::text("Guest: hi")));
        assert_eq!(items[1], Err(DecodeError::MissingSeparator));
        assert_eq!(items[2], Ok(Message::image("cat.png", vec![1, 2, 3])));
    }
}
