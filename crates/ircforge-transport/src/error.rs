/// Errors that can occur in the transport layer.
///
/// The transport never retries; every error is reported to the caller
/// and it decides whether the connection is over.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The TCP connection could not be established.
    #[error("connect to {addr} failed: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The TCP connection attempt did not finish in time.
    #[error("connect to {0} timed out")]
    ConnectTimeout(String),

    /// The TLS handshake failed.
    #[error("tls handshake with {host} failed: {source}")]
    Tls {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// The host cannot be used as a TLS server name.
    #[error("invalid tls server name {0:?}")]
    InvalidServerName(String),

    /// TLS was requested but this build has no TLS support.
    #[error("tls requested for {0} but the `tls` feature is disabled")]
    TlsUnavailable(String),

    /// A read or write on an open connection failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A line grew past the configured maximum without a terminator.
    #[error("line exceeds {max} bytes")]
    LineTooLong { max: usize },

    /// A complete line was not valid UTF-8.
    #[error("line is not valid UTF-8")]
    InvalidUtf8,

    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),
}
