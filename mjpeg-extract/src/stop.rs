//! Cooperative cancellation shared between a controller and a stream.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A cloneable flag that asks an extractor (and the client driving it) to
/// stop.
///
/// Extraction checks it between every byte, clients check it between reads
/// and while waiting to reconnect, so a stop takes effect after at most one
/// more byte or one more blocking read.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    /// A fresh signal, not stopped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this signal to stop.
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested.
    #[inline]
    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
