//! CRLF line framing as a `tokio_util` codec.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::TransportError;

/// Default upper bound for one line, terminator excluded.
///
/// Plain IRC caps lines at 512 bytes, but message tags push real traffic
/// well past that.
pub const DEFAULT_MAX_LINE_LEN: usize = 8192;

/// Splits a byte stream into UTF-8 lines and terminates outbound lines
/// with `\r\n`.
///
/// A line is complete once its `\n` arrives; a preceding `\r` is
/// stripped. Bytes without a terminator stay buffered until more data
/// arrives, so a line split across any number of reads (even between
/// the `\r` and the `\n`) decodes exactly as if it arrived whole. Empty
/// lines are skipped.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_len: usize,
    /// How far into the buffer we have already scanned for `\n`.
    next_index: usize,
}

impl LineCodec {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            next_index: 0,
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LEN)
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = TransportError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, TransportError> {
        loop {
            let start = self.next_index.min(buf.len());
            let Some(offset) = buf[start..].iter().position(|b| *b == b'\n') else {
                // `\r` may still be waiting for its `\n`, hence the +1.
                if buf.len() > self.max_len + 1 {
                    return Err(TransportError::LineTooLong { max: self.max_len });
                }
                self.next_index = buf.len();
                return Ok(None);
            };

            let newline = start + offset;
            self.next_index = 0;

            let mut line = buf.split_to(newline + 1);
            line.truncate(newline);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }

            if line.len() > self.max_len {
                return Err(TransportError::LineTooLong { max: self.max_len });
            }
            if line.is_empty() {
                continue;
            }

            let line = String::from_utf8(line.to_vec()).map_err(|_| TransportError::InvalidUtf8)?;
            return Ok(Some(line));
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, TransportError> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if !buf.is_empty() {
            tracing::debug!(bytes = buf.len(), "discarding unterminated fragment at eof");
            buf.clear();
            self.next_index = 0;
        }
        Ok(None)
    }
}

impl<'a> Encoder<&'a str> for LineCodec {
    type Error = TransportError;

    fn encode(&mut self, line: &'a str, dst: &mut BytesMut) -> Result<(), TransportError> {
        if line.len() > self.max_len {
            return Err(TransportError::LineTooLong { max: self.max_len });
        }
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feeds `chunks` one at a time, decoding after each, and collects
    /// every line produced.
    fn decode_chunks(codec: &mut LineCodec, chunks: &[&[u8]]) -> Vec<String> {
        let mut buf = BytesMut::new();
        let mut lines = Vec::new();
        for chunk in chunks {
            buf.extend_from_slice(chunk);
            while let Some(line) = codec.decode(&mut buf).expect("decode should succeed") {
                lines.push(line);
            }
        }
        lines
    }

    #[test]
    fn test_decode_whole_line() {
        let mut codec = LineCodec::default();
        let lines = decode_chunks(&mut codec, &[b"PING :abc\r\n"]);
        assert_eq!(lines, ["PING :abc"]);
    }

    #[test]
    fn test_decode_split_at_every_offset_matches_whole() {
        let raw: &[u8] = b":alice!a@h PRIVMSG #rust :hello there\r\n";
        for split in 1..raw.len() {
            let mut codec = LineCodec::default();
            let (head, tail) = raw.split_at(split);
            let lines = decode_chunks(&mut codec, &[head, tail]);
            assert_eq!(
                lines,
                [":alice!a@h PRIVMSG #rust :hello there"],
                "split at byte {split}"
            );
        }
    }

    #[test]
    fn test_decode_byte_at_a_time() {
        let raw = b"A\r\nB :c d\r\n";
        let chunks: Vec<&[u8]> = raw.chunks(1).collect();
        let mut codec = LineCodec::default();
        assert_eq!(decode_chunks(&mut codec, &chunks), ["A", "B :c d"]);
    }

    #[test]
    fn test_decode_multiple_lines_in_one_read() {
        let mut codec = LineCodec::default();
        let lines = decode_chunks(&mut codec, &[b"ONE\r\nTWO\r\nTHR"]);
        assert_eq!(lines, ["ONE", "TWO"]);
    }

    #[test]
    fn test_decode_accepts_bare_lf_and_skips_empty_lines() {
        let mut codec = LineCodec::default();
        let lines = decode_chunks(&mut codec, &[b"\r\nONE\n\nTWO\r\n"]);
        assert_eq!(lines, ["ONE", "TWO"]);
    }

    #[test]
    fn test_decode_incomplete_fragment_waits() {
        let mut codec = LineCodec::default();
        let mut buf = BytesMut::from(&b"PING :ab"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(&buf[..], b"PING :ab");
    }

    #[test]
    fn test_decode_oversized_line_is_error() {
        let mut codec = LineCodec::new(8);
        let mut buf = BytesMut::from(&b"0123456789"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(TransportError::LineTooLong { max: 8 })
        ));

        let mut codec = LineCodec::new(8);
        let mut buf = BytesMut::from(&b"012345678\r\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(TransportError::LineTooLong { .. })
        ));
    }

    #[test]
    fn test_decode_line_at_limit_is_ok() {
        let mut codec = LineCodec::new(8);
        let lines = decode_chunks(&mut codec, &[b"01234567\r", b"\n"]);
        assert_eq!(lines, ["01234567"]);
    }

    #[test]
    fn test_decode_invalid_utf8_is_error() {
        let mut codec = LineCodec::default();
        let mut buf = BytesMut::from(&b"PRIVMSG #a :\xff\xfe\r\n"[..]);
        assert!(matches!(codec.decode(&mut buf), Err(TransportError::InvalidUtf8)));
    }

    #[test]
    fn test_decode_eof_discards_fragment() {
        let mut codec = LineCodec::default();
        let mut buf = BytesMut::from(&b"DONE\r\nhalf"[..]);
        assert_eq!(codec.decode_eof(&mut buf).unwrap().as_deref(), Some("DONE"));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_appends_crlf() {
        let mut codec = LineCodec::default();
        let mut buf = BytesMut::new();
        codec.encode("NICK bot", &mut buf).unwrap();
        assert_eq!(&buf[..], b"NICK bot\r\n");
    }
}
