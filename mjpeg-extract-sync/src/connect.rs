use mjpeg_extract::{Error, StreamConfig};
use std::{
    io::{Read, Write},
    net::{TcpStream, ToSocketAddrs},
};
use tracing::{debug, trace};

/// Opens the byte stream a [crate::StreamingClient] reads from.
///
/// [TcpConnector] is what you want outside of tests.
pub trait Connect {
    /// The connection type
    type Stream: Read + Write;

    /// Open a connection to the server described by `config`.
    ///
    /// Failures to reach the server should be reported as
    /// [Error::Resolve] or [Error::Connect], so they get the longer retry
    /// delay.
    fn connect(&mut self, config: &StreamConfig) -> Result<Self::Stream, Error>;
}

/// Connects over TCP, trying every address the host resolves to, in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connect for TcpConnector {
    type Stream = TcpStream;

    fn connect(&mut self, config: &StreamConfig) -> Result<TcpStream, Error> {
        let authority = config.authority();
        let addrs = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|source| Error::Resolve {
                authority: authority.clone(),
                source,
            })?;

        for addr in addrs {
            trace!(%addr, "trying address");
            match TcpStream::connect(addr) {
                Ok(stream) => return Ok(stream),
                Err(e) => debug!(%addr, %e, "connect failed"),
            }
        }
        Err(Error::Connect { authority })
    }
}
