//! Opening byte streams to IRC servers.

use std::fmt;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::TransportError;

/// Any bidirectional async byte stream the transport can frame.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// A type-erased stream: plain TCP, TLS over TCP, or an in-memory pipe.
pub type BoxedStream = Box<dyn AsyncStream>;

/// Where to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)?;
        if self.tls {
            f.write_str(" (tls)")?;
        }
        Ok(())
    }
}

/// Opens a stream to an [`Endpoint`].
///
/// Object safe so the client can hold any connector behind an `Arc`;
/// tests plug in a connector that hands out one end of a
/// `tokio::io::duplex` pipe.
pub trait Connector: Send + Sync + 'static {
    /// Establishes the stream, including any TLS handshake.
    fn connect<'a>(
        &'a self,
        endpoint: &'a Endpoint,
    ) -> BoxFuture<'a, Result<BoxedStream, TransportError>>;
}

/// The real network: TCP, optionally upgraded to TLS.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl Connector for TcpConnector {
    fn connect<'a>(
        &'a self,
        endpoint: &'a Endpoint,
    ) -> BoxFuture<'a, Result<BoxedStream, TransportError>> {
        Box::pin(async move {
            let addr = format!("{}:{}", endpoint.host, endpoint.port);
            let tcp = tokio::time::timeout(
                self.connect_timeout,
                TcpStream::connect((endpoint.host.as_str(), endpoint.port)),
            )
            .await
            .map_err(|_| TransportError::ConnectTimeout(addr.clone()))?
            .map_err(|source| TransportError::ConnectFailed {
                addr: addr.clone(),
                source,
            })?;
            tcp.set_nodelay(true)?;
            tracing::debug!(%addr, "tcp connection established");

            if endpoint.tls {
                return upgrade(tcp, &endpoint.host).await;
            }
            Ok(Box::new(tcp) as BoxedStream)
        })
    }
}

#[cfg(feature = "tls")]
async fn upgrade(tcp: TcpStream, host: &str) -> Result<BoxedStream, TransportError> {
    let stream = crate::tls::handshake(tcp, host).await?;
    tracing::debug!(host, "tls handshake complete");
    Ok(Box::new(stream))
}

#[cfg(not(feature = "tls"))]
async fn upgrade(_tcp: TcpStream, host: &str) -> Result<BoxedStream, TransportError> {
    Err(TransportError::TlsUnavailable(host.to_string()))
}
