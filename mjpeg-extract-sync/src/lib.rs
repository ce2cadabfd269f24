//! A blocking MJPEG stream client using std I/O traits, built on top of
//! [mjpeg-extract](https://crates.io/crates/mjpeg-extract).
//!
//! See also:
//!
//!   * [mjpeg-extract-tokio](https://crates.io/crates/mjpeg-extract-tokio) for using tokio I/O traits

#![warn(missing_docs)]

mod client;
mod connect;

// re-exports
pub use client::{SessionEnd, StreamingClient};
pub use connect::{Connect, TcpConnector};
pub use mjpeg_extract;
