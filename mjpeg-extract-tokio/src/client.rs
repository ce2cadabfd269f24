use mjpeg_extract::{
    Error, ImageSink, MultipartExtractor, ResetMode, StopSignal, StreamConfig,
};
use oval::Buffer;
use std::{io, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    time::{sleep, Instant},
};
use tracing::{info, trace, warn};

use crate::connect::{AsyncConnect, TcpConnector};

/// Pauses between connections are slept in slices this long, so a stop
/// request doesn't wait for the whole delay.
const PAUSE_SLICE: Duration = Duration::from_millis(50);

/// How a single connection ended, when it didn't fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The server closed the connection
    Closed,
    /// A stop was requested
    Stopped,
}

/// Streams from an MJPEG server, forever: connects, sends the request, feeds
/// everything it reads to a [MultipartExtractor], and reconnects when the
/// stream ends or the server can't be reached.
///
/// Images are handed to the sink from the task that awaits [Self::run]: a
/// slow sink holds up that task, and nothing else.
pub struct AsyncStreamingClient<S, C = TcpConnector> {
    config: StreamConfig,
    connector: C,
    extractor: MultipartExtractor<S>,
    buffer: Buffer,
}

impl<S> AsyncStreamingClient<S, TcpConnector>
where
    S: ImageSink,
{
    /// Create a client that connects over TCP.
    pub fn new(config: StreamConfig, sink: S) -> Result<Self, Error> {
        Self::with_connector(config, TcpConnector, sink)
    }
}

impl<S, C> AsyncStreamingClient<S, C>
where
    S: ImageSink,
    C: AsyncConnect,
{
    /// Create a client that opens its connections with `connector`.
    pub fn with_connector(config: StreamConfig, connector: C, sink: S) -> Result<Self, Error> {
        let extractor = MultipartExtractor::with_config(config.extractor, sink)?;
        let buffer = Buffer::with_capacity(config.read_buffer_size);
        Ok(Self {
            config,
            connector,
            extractor,
            buffer,
        })
    }

    /// Observe `stop` instead of the client's own signal.
    #[must_use]
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.extractor = self.extractor.with_stop_signal(stop);
        self
    }

    /// The signal that stops this client
    pub fn stop_signal(&self) -> &StopSignal {
        self.extractor.stop_signal()
    }

    /// Where this client streams from
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// What opens connections for this client
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// The extractor images go through
    pub fn extractor(&self) -> &MultipartExtractor<S> {
        &self.extractor
    }

    /// The sink images are delivered to
    pub fn sink(&self) -> &S {
        self.extractor.sink()
    }

    /// Stop streaming for good and take the sink back
    pub fn into_sink(self) -> S {
        self.extractor.into_sink()
    }

    /// Stream until stopped, reconnecting as needed.
    pub async fn run(&mut self) {
        let authority = self.config.authority();
        info!(%authority, path = %self.config.path, "starting stream");

        loop {
            let delay = match self.stream_once().await {
                Ok(SessionEnd::Stopped) => break,
                Ok(SessionEnd::Closed) => {
                    info!(%authority, "stream closed by server, reconnecting");
                    self.config.reconnect_delay
                }
                Err(e) if e.is_unreachable() => {
                    warn!(%e, delay = ?self.config.retry_delay, "server unreachable, retrying");
                    self.config.retry_delay
                }
                Err(e) => {
                    warn!(%e, "stream failed, reconnecting");
                    self.config.reconnect_delay
                }
            };

            if !self.pause(delay).await {
                break;
            }
        }

        info!(%authority, "stream stopped");
    }

    /// Connect once and stream until the connection ends.
    pub async fn stream_once(&mut self) -> Result<SessionEnd, Error> {
        if self.stop_signal().is_stop_requested() {
            return Ok(SessionEnd::Stopped);
        }

        let io = self.connector.connect(&self.config).await?;
        info!(authority = %self.config.authority(), "connected");
        self.stream_from(io).await
    }

    /// Send the request over an already-open connection, then stream from it
    /// until it ends. The boundary is learned again from this connection's
    /// headers.
    pub async fn stream_from<T>(&mut self, mut io: T) -> Result<SessionEnd, Error>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        self.extractor.initialize(ResetMode::Full)?;
        self.buffer.reset();

        io.write_all(&self.config.request()).await?;
        io.flush().await?;

        loop {
            if self.stop_signal().is_stop_requested() {
                return Ok(SessionEnd::Stopped);
            }

            if self.buffer.available_space() == 0 {
                self.buffer.shift();
            }
            let n = match io.read(self.buffer.space()).await {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                return Ok(SessionEnd::Closed);
            }
            trace!(n, "read bytes from server");
            self.buffer.fill(n);

            let res = self.extractor.process(self.buffer.data());
            self.buffer.consume(self.buffer.available_data());
            res?;
        }
    }

    /// Returns false if a stop was requested before `delay` elapsed.
    async fn pause(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            if self.stop_signal().is_stop_requested() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            sleep((deadline - now).min(PAUSE_SLICE)).await;
        }
    }
}
