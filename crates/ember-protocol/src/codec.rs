//! Length-delimited frame codec for TCP streams.
//!
//! Wire format: 2-byte little-endian length prefix + opaque payload.
//! No terminator; the prefix is the only delimiter.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{ProtocolError, LENGTH_PREFIX_SIZE, MAX_PAYLOAD_SIZE};

/// Encode one payload as a wire frame.
pub fn encode(payload: &[u8]) -> Result<Bytes, ProtocolError> {
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    FrameCodec.encode(Bytes::copy_from_slice(payload), &mut buf)?;
    Ok(buf.freeze())
}

/// Decode the complete frames at the start of `buffer`.
///
/// The returned iterator is lazy. Once it is exhausted, [`Frames::leftover`]
/// holds the bytes that do not form a complete frame yet; prepend them to the
/// next chunk read from the stream before decoding again.
pub fn decode(buffer: &[u8]) -> Frames<'_> {
    Frames {
        buffer,
        cursor: 0,
        done: false,
    }
}

/// Read the length prefix at the start of `buf`, if it is all there.
fn peek_length(buf: &[u8]) -> Option<usize> {
    match buf {
        [lo, hi, ..] => Some(u16::from_le_bytes([*lo, *hi]) as usize),
        _ => None,
    }
}

/// Iterator over the complete frames of one raw buffer.
///
/// A zero-length frame is yielded as an empty payload and ends the pass; the
/// bytes after its prefix become the leftover.
#[derive(Debug)]
pub struct Frames<'a> {
    buffer: &'a [u8],
    cursor: usize,
    done: bool,
}

impl<'a> Frames<'a> {
    /// Unconsumed bytes: a partial prefix, a prefix plus partial payload, or
    /// whatever followed a zero-length frame.
    pub fn leftover(&self) -> &'a [u8] {
        self.buffer.get(self.cursor..).unwrap_or_default()
    }
}

impl<'a> Iterator for Frames<'a> {
    type Item = Result<&'a [u8], ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let rest = self.leftover();
        let Some(length) = peek_length(rest) else {
            self.done = true;
            return None;
        };

        // Not enough payload yet: leave prefix + partial payload in place
        if rest.len() - LENGTH_PREFIX_SIZE < length {
            self.done = true;
            return None;
        }

        let start = self.cursor + LENGTH_PREFIX_SIZE;
        let end = start + length;
        let Some(payload) = self.buffer.get(start..end) else {
            self.done = true;
            return Some(Err(ProtocolError::FrameCorruption {
                offset: self.cursor,
                length,
                available: self.buffer.len(),
            }));
        };

        self.cursor = end;
        if length == 0 {
            self.done = true;
        }
        Some(Ok(payload))
    }
}

/// Codec for framing raw payloads over a byte stream.
///
/// Under `FramedRead` the read buffer is the carried-over leftover: bytes of
/// an incomplete frame stay in it until the rest arrives.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Need at least the length prefix
        let Some(length) = peek_length(src) else {
            return Ok(None);
        };

        // Check if we have the full frame
        let total = LENGTH_PREFIX_SIZE + length;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_SIZE);
        if src.len() < length {
            return Err(ProtocolError::FrameCorruption {
                offset: LENGTH_PREFIX_SIZE,
                length,
                available: src.len(),
            });
        }

        Ok(Some(src.split_to(length).freeze()))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        if !buf.is_empty() {
            tracing::debug!(
                pending = buf.len(),
                "codec: discarding partial frame at end of stream"
            );
            buf.clear();
        }
        Ok(None)
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let length = u16::try_from(item.len()).map_err(|_| ProtocolError::PayloadTooLarge {
            size: item.len(),
            max: MAX_PAYLOAD_SIZE,
        })?;

        dst.reserve(LENGTH_PREFIX_SIZE + item.len());
        dst.put_u16_le(length);
        dst.extend_from_slice(&item);

        Ok(())
    }
}
