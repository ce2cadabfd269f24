use mjpeg_extract::{Error, StreamConfig};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{lookup_host, TcpStream},
};
use tracing::{debug, trace};

/// Opens the byte stream an [crate::AsyncStreamingClient] reads from.
///
/// [TcpConnector] is what you want outside of tests.
#[allow(async_fn_in_trait)]
pub trait AsyncConnect {
    /// The connection type
    type Stream: AsyncRead + AsyncWrite + Unpin;

    /// Open a connection to the server described by `config`.
    ///
    /// Failures to reach the server should be reported as
    /// [Error::Resolve] or [Error::Connect], so they get the longer retry
    /// delay.
    async fn connect(&mut self, config: &StreamConfig) -> Result<Self::Stream, Error>;
}

/// Connects over TCP, trying every address the host resolves to, in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl AsyncConnect for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&mut self, config: &StreamConfig) -> Result<TcpStream, Error> {
        let authority = config.authority();
        let addrs = lookup_host((config.host.as_str(), config.port))
            .await
            .map_err(|source| Error::Resolve {
                authority: authority.clone(),
                source,
            })?;

        for addr in addrs {
            trace!(%addr, "trying address");
            match TcpStream::connect(addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) => debug!(%addr, %e, "connect failed"),
            }
        }
        Err(Error::Connect { authority })
    }
}
