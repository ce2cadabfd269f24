//! An asynchronous MJPEG stream client using tokio I/O traits,
//! based on top of [mjpeg-extract](https://crates.io/crates/mjpeg-extract).
//!
//! See also:
//!
//!   * [mjpeg-extract-sync](https://crates.io/crates/mjpeg-extract-sync) for using std I/O traits

#![warn(missing_docs)]

mod client;
mod connect;

// re-exports
pub use client::{AsyncStreamingClient, SessionEnd};
pub use connect::{AsyncConnect, TcpConnector};
pub use mjpeg_extract;
