//! Line codec for command output streams.
//!
//! Unlike [`tokio_util::codec::LinesCodec`], invalid UTF-8 never fails the
//! stream: bytes are decoded lossily so a binary blob in the output cannot
//! stop the reader. Each item keeps its trailing `\n` so concatenating the
//! items reproduces the output. Lines longer than [`MAX_LINE_BYTES`] are
//! emitted in chunks of that size instead of buffering without bound.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::AppError;

/// Longest line emitted as a single item: 64 KiB.
pub const MAX_LINE_BYTES: usize = 65_536;

/// Lossy, newline-preserving line decoder.
#[derive(Debug, Default)]
pub struct OutputLineCodec {
    /// Bytes already scanned for a newline in the buffered prefix.
    scanned: usize,
}

impl OutputLineCodec {
    /// Create a codec with an empty scan position.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn take(&mut self, src: &mut BytesMut, len: usize) -> String {
        self.scanned = 0;
        let chunk = src.split_to(len);
        String::from_utf8_lossy(&chunk).into_owned()
    }
}

impl Decoder for OutputLineCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let search_end = src.len().min(MAX_LINE_BYTES);
        let start = self.scanned.min(search_end);
        if let Some(offset) = src[start..search_end].iter().position(|b| *b == b'\n') {
            let len = start + offset + 1;
            return Ok(Some(self.take(src, len)));
        }

        if src.len() >= MAX_LINE_BYTES {
            return Ok(Some(self.take(src, MAX_LINE_BYTES)));
        }

        self.scanned = src.len();
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None if src.is_empty() => Ok(None),
            None => {
                let len = src.len();
                Ok(Some(self.take(src, len)))
            }
        }
    }
}
