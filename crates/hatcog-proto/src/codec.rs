//! Line-based codec for tokio.
//!
//! Upstream IRC servers are not guaranteed to be UTF-8 clean, so lines are
//! framed as bytes and decoded afterwards: valid UTF-8 is kept as is,
//! anything else is read as ISO-8859-1.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error;

/// Longest line kept by [`LineCodec`], in bytes.
///
/// Generous compared to the RFC's 512 so that servers sending message tags
/// are not cut off.
pub const MAX_LINE_LEN: usize = 8191;

/// Newline-delimited codec for upstream IRC traffic.
///
/// Decoding yields each line without its terminator. A line longer than the
/// limit is discarded up to its newline instead of failing the stream.
/// Encoding appends `\r\n`.
pub struct LineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    /// Maximum line length
    max_len: usize,
    /// Skipping the rest of an overlong line
    discarding: bool,
}

impl LineCodec {
    /// Create a codec with the default line limit.
    pub fn new() -> Self {
        Self::with_max_len(MAX_LINE_LEN)
    }

    /// Create a codec with a custom line limit.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
            discarding: false,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode bytes as UTF-8 when valid, otherwise as Latin-1.
///
/// ISO-8859-1 maps every byte to the code point of the same value, so the
/// fallback never fails.
pub fn to_unicode(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.to_owned(),
        Err(_) => data.iter().map(|&b| char::from(b)).collect(),
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = error::ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<String>> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                if src.len() > self.max_len {
                    // Drop what we have and skip to the next newline.
                    src.clear();
                    self.discarding = true;
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if self.discarding {
                self.discarding = false;
                continue;
            }
            if line.len() > self.max_len {
                continue;
            }

            let mut bytes = &line[..line.len() - 1];
            if let Some(stripped) = bytes.strip_suffix(b"\r") {
                bytes = stripped;
            }
            return Ok(Some(to_unicode(bytes)));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> error::Result<Option<String>> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None if src.is_empty() || self.discarding => {
                src.clear();
                Ok(None)
            }
            None => {
                let rest = src.split_to(src.len());
                self.next_index = 0;
                Ok(Some(to_unicode(&rest)))
            }
        }
    }
}

impl<T: AsRef<str>> Encoder<T> for LineCodec {
    type Error = error::ProtocolError;

    fn encode(&mut self, msg: T, dst: &mut BytesMut) -> error::Result<()> {
        let msg = msg.as_ref();
        dst.reserve(msg.len() + 2);
        dst.put_slice(msg.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
