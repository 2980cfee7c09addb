//! Transport layer for ircforge.
//!
//! Turns a byte stream into a sequence of text lines and back. The
//! [`Connector`] trait opens streams, [`LineCodec`] frames them, and
//! [`split`] hands back independent read and write halves so a reader
//! task never blocks a writer.
//!
//! # Feature Flags
//!
//! - `tls` (default): TLS connections via `tokio-rustls`

mod codec;
mod connector;
mod error;
#[cfg(feature = "tls")]
mod tls;

pub use codec::{DEFAULT_MAX_LINE_LEN, LineCodec};
pub use connector::{AsyncStream, BoxedStream, Connector, Endpoint, TcpConnector};
pub use error::TransportError;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{ReadHalf, WriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite};

/// Splits a connected stream into a line reader and a line writer.
pub fn split(stream: BoxedStream, max_line_len: usize) -> (LineReader, LineWriter) {
    let (read, write) = tokio::io::split(stream);
    (
        LineReader {
            inner: FramedRead::new(read, LineCodec::new(max_line_len)),
        },
        LineWriter {
            inner: FramedWrite::new(write, LineCodec::new(max_line_len)),
        },
    )
}

/// The receiving half of a connection.
pub struct LineReader {
    inner: FramedRead<ReadHalf<BoxedStream>, LineCodec>,
}

impl LineReader {
    /// Waits for the next complete line, terminator stripped.
    ///
    /// Returns `Ok(None)` once the peer has closed the stream. A partial
    /// line pending at that point is dropped.
    pub async fn next_line(&mut self) -> Result<Option<String>, TransportError> {
        let line = self.inner.next().await.transpose()?;
        if let Some(line) = &line {
            tracing::trace!(line = %line, "<<");
        }
        Ok(line)
    }
}

/// The sending half of a connection.
pub struct LineWriter {
    inner: FramedWrite<WriteHalf<BoxedStream>, LineCodec>,
}

impl LineWriter {
    /// Writes one line and flushes it.
    pub async fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        self.write_line(line).await?;
        self.flush().await
    }

    /// Buffers one line without flushing.
    ///
    /// Lines reach the wire in the order they were written.
    pub async fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        tracing::trace!(line = %line, ">>");
        self.inner.feed(line).await
    }

    /// Pushes buffered lines to the peer.
    pub async fn flush(&mut self) -> Result<(), TransportError> {
        SinkExt::<&str>::flush(&mut self.inner).await
    }

    /// Flushes and closes the write side of the stream.
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        SinkExt::<&str>::close(&mut self.inner).await
    }
}
