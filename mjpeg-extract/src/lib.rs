#![warn(missing_docs)]

//! mjpeg-extract is a [sans-io](https://sans-io.readthedocs.io/how-to-sans-io.html) library
//! for pulling still images out of `multipart/x-mixed-replace` HTTP bodies, the
//! transport most IP cameras use for MJPEG.
//!
//! It's made up of a tiny streaming [matcher::PatternMatcher], a boundary
//! definition parser that follows RFC 2046, and a byte-at-a-time state machine
//! ([fsm::MultipartExtractor]) that reassembles image payloads no matter how the
//! network chops the stream up.
//!
//! This crate does no I/O, you may be interested in either of those higher
//! level wrappers:
//!
//!   * `mjpeg-extract-sync` for a blocking client over std I/O traits
//!   * `mjpeg-extract-tokio` for an async client over tokio I/O traits

pub mod boundary;
pub mod config;
pub mod error;
pub mod fsm;
pub mod matcher;
pub mod sink;
pub mod stop;

#[cfg(any(test, feature = "corpus"))]
pub mod corpus;


pub use config::{ExtractorConfig, StreamConfig};
pub use error::{BoundaryError, Error};
pub use fsm::{MultipartExtractor, Phase, ResetMode};
pub use matcher::PatternMatcher;
pub use sink::ImageSink;
pub use stop::StopSignal;
