//! Where completed images go.

use crate::error::BoundaryError;

/// The consumer of completed images.
///
/// Callbacks run synchronously on the thread (or task) that drives the
/// extractor, in stream order. A slow sink stalls the read loop, which is
/// the only backpressure there is: frames are never dropped on its behalf.
pub trait ImageSink {
    /// Called once per fully delimited part. `image` is only valid for the
    /// duration of the call: the buffer is reused right after.
    fn on_image(&mut self, image: &[u8]);

    /// Called when a `boundary=` definition is malformed and was discarded.
    ///
    /// The extractor has already logged it.
    fn on_boundary_error(&mut self, err: &BoundaryError) {
        let _ = err;
    }
}

impl<F> ImageSink for F
where
    F: FnMut(&[u8]),
{
    #[inline]
    fn on_image(&mut self, image: &[u8]) {
        self(image)
    }
}
