//! Knobs for the extractor and for the streaming clients built on top of it.

use std::time::Duration;

/// Buffer sizing for [crate::MultipartExtractor].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractorConfig {
    /// Capacity the image buffer starts with (and goes back to on a full reset)
    pub initial_capacity: usize,

    /// Fixed amount the image buffer grows by when an image outgrows it
    pub growth_step: usize,
}

impl ExtractorConfig {
    /// 100 KiB, enough for a typical VGA JPEG frame
    pub const DEFAULT_INITIAL_CAPACITY: usize = 100 * 1024;

    /// 100 KiB
    pub const DEFAULT_GROWTH_STEP: usize = 100 * 1024;

    /// Set the initial capacity of the image buffer.
    #[must_use]
    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    /// Set the growth step of the image buffer. A step of zero is treated as one byte.
    #[must_use]
    pub fn with_growth_step(mut self, growth_step: usize) -> Self {
        self.growth_step = growth_step.max(1);
        self
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            initial_capacity: Self::DEFAULT_INITIAL_CAPACITY,
            growth_step: Self::DEFAULT_GROWTH_STEP,
        }
    }
}

/// Where to stream from, and how to behave when that goes wrong.
///
/// # Example
///
/// ```
/// use mjpeg_extract::StreamConfig;
/// use std::time::Duration;
///
/// let config = StreamConfig::default()
///     .with_host("camera.local")
///     .with_port(8081)
///     .with_retry_delay(Duration::from_secs(2));
/// assert_eq!(config.authority(), "camera.local:8081");
/// assert_eq!(config.request(), b"GET /?action=stream HTTP/1.0\r\n\r\n");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Host name or address of the MJPEG server
    pub host: String,

    /// TCP port of the MJPEG server
    pub port: u16,

    /// Request path, including the query string
    pub path: String,

    /// How long to wait after the server could not be resolved or reached
    pub retry_delay: Duration,

    /// How long to wait after a stream ended, before reconnecting
    pub reconnect_delay: Duration,

    /// Size of the buffer network reads go into
    pub read_buffer_size: usize,

    /// Image buffer sizing
    pub extractor: ExtractorConfig,
}

impl StreamConfig {
    /// mjpg-streamer's stream endpoint
    pub const DEFAULT_PATH: &'static str = "/?action=stream";

    /// Set the host to stream from.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port to stream from.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the request path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the delay used after resolve or connect failures.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the delay used after a stream ends.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the size of the network read buffer. Zero is treated as one byte.
    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Set the image buffer sizing.
    #[must_use]
    pub fn with_extractor(mut self, extractor: ExtractorConfig) -> Self {
        self.extractor = extractor;
        self
    }

    /// `host:port`, suitable for resolving and for log lines
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The request we send once connected.
    pub fn request(&self) -> Vec<u8> {
        format!("GET {} HTTP/1.0\r\n\r\n", self.path).into_bytes()
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 8080,
            path: Self::DEFAULT_PATH.to_owned(),
            retry_delay: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(1),
            read_buffer_size: 4 * 1024,
            extractor: ExtractorConfig::default(),
        }
    }
}
