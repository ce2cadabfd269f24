use tracing::{debug, error, trace, warn};

use crate::{
    boundary::{BoundaryCapture, BOUNDARY_MARKER},
    config::ExtractorConfig,
    error::{BoundaryError, Error},
    matcher::PatternMatcher,
    sink::ImageSink,
    stop::StopSignal,
};

/// Where the extractor is at in the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Reading header lines: the HTTP response headers, or a part's headers
    Header,
    /// Reading the value of a `boundary=` parameter
    DelimiterCapture,
    /// Copying a part body into the image buffer
    Content,
}

/// How much state [MultipartExtractor::initialize] throws away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    /// Keep the learned boundary and the buffer capacity. Used after every
    /// image, so the boundary isn't re-learned and the buffer doesn't shrink.
    Rearm,
    /// Forget the boundary and go back to a baseline-sized buffer. Used for
    /// every new connection.
    Full,
}

#[derive(Default)]
enum State {
    Header,

    DelimiterCapture {
        /// The boundary value read so far
        capture: BoundaryCapture,
    },

    Content,

    #[default]
    Transition,
}

/// The last four bytes seen, to spot line ends and the end of a header
/// section.
#[derive(Debug, Clone, Copy, Default)]
struct LineWindow(u32);

impl LineWindow {
    const CRLF: u32 = 0x0d0a;
    const CRLFCRLF: u32 = 0x0d0a_0d0a;

    #[inline]
    fn push(&mut self, byte: u8) {
        self.0 = (self.0 << 8) | byte as u32;
    }

    #[inline]
    fn is_crlf(self) -> bool {
        self.0 & 0xffff == Self::CRLF
    }

    #[inline]
    fn is_crlfcrlf(self) -> bool {
        self.0 == Self::CRLFCRLF
    }

    fn clear(&mut self) {
        self.0 = 0;
    }
}

/// [MultipartExtractor] turns an arbitrarily-chunked `multipart/x-mixed-replace`
/// byte stream into complete image payloads.
///
/// The loop is as follows:
///
///   * Feed whatever the network gave you to [Self::process].
///   * Every time a part is fully delimited, [ImageSink::on_image] is called
///     with its body, synchronously, before `process` returns.
///   * Call [Self::initialize] with [ResetMode::Full] before reusing the
///     extractor for a new connection.
///
/// The boundary starts out unknown: the extractor looks for `boundary=` in the
/// response headers and learns the token from there.
pub struct MultipartExtractor<S> {
    config: ExtractorConfig,

    state: State,

    /// Rolling window over the last four bytes
    window: LineWindow,

    /// Looks for `boundary=` until the boundary is known, then for the boundary
    boundary: PatternMatcher,

    /// Whether the boundary was learned from this stream's headers
    boundary_known: bool,

    /// Body of the current part, followed by whatever part of the boundary
    /// we've seen so far
    image: Vec<u8>,

    /// Capacity we've reserved for `image` (the allocator may give us more)
    capacity: usize,

    sink: S,

    stop: StopSignal,
}

impl<S> MultipartExtractor<S>
where
    S: ImageSink,
{
    /// Create an extractor with default buffer sizing.
    pub fn new(sink: S) -> Result<Self, Error> {
        Self::with_config(ExtractorConfig::default(), sink)
    }

    /// Create an extractor, allocating the image buffer up front.
    pub fn with_config(config: ExtractorConfig, sink: S) -> Result<Self, Error> {
        let mut extractor = Self {
            config,
            state: State::Header,
            window: LineWindow::default(),
            boundary: PatternMatcher::new(BOUNDARY_MARKER),
            boundary_known: false,
            image: Vec::new(),
            capacity: 0,
            sink,
            stop: StopSignal::new(),
        };
        extractor.initialize(ResetMode::Full)?;
        Ok(extractor)
    }

    /// Observe `stop` instead of the extractor's own signal.
    #[must_use]
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Go back to reading headers.
    ///
    /// With [ResetMode::Full], the learned boundary is forgotten and the image
    /// buffer is released and allocated again at its initial capacity, which
    /// is the only way this can fail.
    pub fn initialize(&mut self, mode: ResetMode) -> Result<(), Error> {
        self.rearm();
        if mode == ResetMode::Rearm {
            return Ok(());
        }

        self.boundary = PatternMatcher::new(BOUNDARY_MARKER);
        self.boundary_known = false;

        self.image = Vec::new();
        self.capacity = 0;
        let requested = self.config.initial_capacity;
        self.image
            .try_reserve_exact(requested)
            .map_err(|source| Error::Allocation { requested, source })?;
        self.capacity = requested;
        Ok(())
    }

    /// Process a chunk of the stream, of any size.
    ///
    /// Stops early, even in the middle of the chunk, once a stop is
    /// requested. The only error is failing to grow the image buffer: the
    /// partial image is then dropped and the extractor goes back to reading
    /// headers.
    pub fn process(&mut self, chunk: &[u8]) -> Result<(), Error> {
        for &byte in chunk {
            if self.stop.is_stop_requested() {
                trace!("stop requested, leaving chunk early");
                return Ok(());
            }
            self.step(byte)?;
        }
        Ok(())
    }

    fn step(&mut self, byte: u8) -> Result<(), Error> {
        use State as S;
        match &mut self.state {
            S::Header => {
                self.window.push(byte);
                if self.window.is_crlfcrlf() {
                    trace!("Header | end of header section, transition to Content");
                    self.state = S::Content;
                } else if self.window.is_crlf() {
                    // only match boundaries that sit on a single line
                    self.boundary.reset();
                } else if !self.boundary_known && self.boundary.feed(byte) {
                    trace!("Header | found boundary marker, transition to DelimiterCapture");
                    self.state = S::DelimiterCapture {
                        capture: BoundaryCapture::new(),
                    };
                }
            }
            S::DelimiterCapture { capture } => {
                self.window.push(byte);
                if self.window.is_crlfcrlf() {
                    transition!(self.state => (S::DelimiterCapture { capture }) {
                        self.learn_boundary(capture);
                        S::Header
                    });
                } else if let Err(err) = capture.push(byte) {
                    self.reject_boundary(err);
                    self.state = S::Header;
                }
            }
            S::Content => {
                if self.image.len() >= self.capacity {
                    if let Err(e) = self.grow() {
                        error!(%e, "dropping partial image");
                        self.rearm();
                        return Err(e);
                    }
                }
                self.image.push(byte);

                if self.boundary.feed(byte) {
                    self.emit_image();
                }
            }
            S::Transition => {
                unreachable!("the state machine should never be in the transition state")
            }
        }
        Ok(())
    }

    fn learn_boundary(&mut self, capture: BoundaryCapture) {
        if !capture.is_complete() {
            self.reject_boundary(BoundaryError::Empty);
            return;
        }

        let token = capture.into_token();
        debug!(
            boundary = %String::from_utf8_lossy(&token),
            len = token.len(),
            "DelimiterCapture | learned boundary"
        );
        self.boundary = PatternMatcher::new(token);
        self.boundary_known = true;
        // the part headers start on a fresh line
        self.window.clear();
    }

    fn reject_boundary(&mut self, err: BoundaryError) {
        warn!(%err, "DelimiterCapture | discarding malformed boundary definition");
        self.sink.on_boundary_error(&err);
        self.boundary.reset();
    }

    fn grow(&mut self) -> Result<(), Error> {
        // an overflowing request is left for the allocator to refuse
        let requested = self
            .capacity
            .saturating_add(self.config.growth_step.max(1));
        debug!(
            len = self.image.len(),
            capacity = self.capacity,
            requested,
            "Content | image outgrew buffer, growing"
        );
        self.image
            .try_reserve_exact(requested - self.image.len())
            .map_err(|source| Error::Allocation { requested, source })?;
        self.capacity = requested;
        Ok(())
    }

    /// The buffer ends with `[CRLF]--<boundary>`: hand over what's before.
    fn emit_image(&mut self) {
        let mut len = self.image.len() - self.boundary.token().len();
        if self.image[..len].ends_with(b"--") {
            len -= 2;
        }
        if self.image[..len].ends_with(b"\r\n") {
            len -= 2;
        }

        debug!(len, capacity = self.capacity, "Content | image received");
        self.sink.on_image(&self.image[..len]);
        self.rearm();
    }

    fn rearm(&mut self) {
        self.state = State::Header;
        self.window.clear();
        self.boundary.reset();
        self.image.clear();
    }

    /// Current phase of the state machine
    pub fn phase(&self) -> Phase {
        match self.state {
            State::Header => Phase::Header,
            State::DelimiterCapture { .. } => Phase::DelimiterCapture,
            State::Content => Phase::Content,
            State::Transition => unreachable!(),
        }
    }

    /// The token currently looked for: `boundary=` until the boundary is
    /// learned, the boundary itself afterwards.
    pub fn boundary(&self) -> &[u8] {
        self.boundary.token()
    }

    /// Whether the boundary has been learned from the stream's headers
    pub fn boundary_known(&self) -> bool {
        self.boundary_known
    }

    /// Capacity reserved for the image buffer. Never shrinks, except on a
    /// [ResetMode::Full] reset.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes of the current part buffered so far
    pub fn buffered_len(&self) -> usize {
        self.image.len()
    }

    /// The signal this extractor observes
    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// The sink images are delivered to
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// The sink images are delivered to
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Give up on extraction and take the sink back
    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::{MultipartExtractor, Phase, ResetMode};
    use crate::{
        config::ExtractorConfig,
        corpus::Recorder,
        error::{BoundaryError, Error},
    };

    const HEAD: &[u8] =
        b"HTTP/1.0 200 OK\r\nContent-Type: multipart/x-mixed-replace;boundary=frame\r\n\r\n";

    fn extractor() -> MultipartExtractor<Recorder> {
        MultipartExtractor::new(Recorder::default()).unwrap()
    }

    #[test_log::test]
    fn learns_boundary_from_headers() {
        let mut ex = extractor();
        assert_eq!(ex.boundary(), b"boundary=");
        assert!(!ex.boundary_known());

        ex.process(HEAD).unwrap();
        assert_eq!(ex.phase(), Phase::Header);
        assert_eq!(ex.boundary(), b"frame");
        assert!(ex.boundary_known());
    }

    #[test_log::test]
    fn phases_follow_the_stream() {
        let mut ex = extractor();
        ex.process(b"HTTP/1.0 200 OK\r\nContent-Type: multipart/x-mixed-replace;boundary=")
            .unwrap();
        assert_eq!(ex.phase(), Phase::DelimiterCapture);
        ex.process(b"frame\r\n\r\n--frame\r\nContent-Type: image/jpeg\r\n")
            .unwrap();
        assert_eq!(ex.phase(), Phase::Header);
        ex.process(b"\r\n\xff\xd8").unwrap();
        assert_eq!(ex.phase(), Phase::Content);
        assert_eq!(ex.buffered_len(), 2);
    }

    #[test_log::test]
    fn smallest_images_are_trimmed_exactly() {
        let images: [&[u8]; 6] = [b"", b"\x01", b"\r", b"\n", b"--", b"\r\n"];
        for image in images {
            let mut ex = extractor();
            ex.process(HEAD).unwrap();
            ex.process(b"--frame\r\n\r\n").unwrap();
            ex.process(image).unwrap();
            ex.process(b"\r\n--frame\r\n\r\n").unwrap();

            let rec = ex.into_sink();
            assert_eq!(rec.images, vec![image.to_vec()], "image {image:?}");
        }
    }

    #[test_log::test]
    fn part_without_leading_crlf() {
        let mut ex = extractor();
        ex.process(HEAD).unwrap();
        ex.process(b"--frame\r\n\r\nabc--frame").unwrap();
        assert_eq!(ex.into_sink().images, vec![b"abc".to_vec()]);
    }

    #[test_log::test]
    fn malformed_boundary_keeps_generic_marker() {
        let mut ex = extractor();
        ex.process(b"Content-Type: multipart/x-mixed-replace;boundary=my frame\r\n\r\n")
            .unwrap();
        assert!(!ex.boundary_known());
        assert_eq!(ex.boundary(), b"boundary=");

        let rec = ex.into_sink();
        assert_eq!(rec.boundary_errors, vec![BoundaryError::SpaceOutsideQuotes]);
        assert!(rec.images.is_empty());
    }

    #[test_log::test]
    fn learned_boundary_is_not_replaced() {
        let mut ex = extractor();
        ex.process(HEAD).unwrap();
        ex.process(b"--frame\r\nX-Note: boundary=other\r\n\r\n\x01\x02\r\n--frame\r\n\r\n")
            .unwrap();
        assert_eq!(ex.boundary(), b"frame");
        assert_eq!(ex.into_sink().images, vec![vec![1u8, 2]]);
    }

    #[test_log::test]
    fn buffer_grows_in_fixed_steps() {
        let config = ExtractorConfig::default()
            .with_initial_capacity(1024)
            .with_growth_step(4096);
        let mut ex = MultipartExtractor::with_config(config, Recorder::default()).unwrap();
        assert_eq!(ex.capacity(), 1024);

        let image = vec![0x80u8; 10_000];
        ex.process(HEAD).unwrap();
        ex.process(b"--frame\r\n\r\n").unwrap();
        ex.process(&image).unwrap();
        ex.process(b"\r\n--frame").unwrap();

        // 10_000 bytes of image + 9 bytes of delimiter
        assert_eq!(ex.capacity(), 1024 + 3 * 4096);
        assert_eq!(ex.buffered_len(), 0);
        assert_eq!(ex.into_sink().images, vec![image]);
    }

    #[test_log::test]
    fn growth_failure_drops_the_partial_image() {
        for growth_step in [usize::MAX, usize::MAX / 2] {
            let config = ExtractorConfig::default()
                .with_initial_capacity(4)
                .with_growth_step(growth_step);
            let mut ex = MultipartExtractor::with_config(config, Recorder::default()).unwrap();
            ex.process(HEAD).unwrap();
            ex.process(b"--frame\r\n\r\n").unwrap();

            let err = ex.process(b"0123456789\r\n--frame\r\n\r\n").unwrap_err();
            assert!(
                matches!(err, Error::Allocation { .. }),
                "unexpected error: {err}"
            );
            assert_eq!(ex.phase(), Phase::Header);
            assert_eq!(ex.buffered_len(), 0);
            assert_eq!(ex.capacity(), 4);
            assert_eq!(ex.boundary(), b"frame");
            assert!(ex.into_sink().images.is_empty());
        }
    }

    #[test_log::test]
    fn zero_growth_step_still_tracks_capacity() {
        let config = ExtractorConfig {
            initial_capacity: 2,
            growth_step: 0,
        };
        let mut ex = MultipartExtractor::with_config(config, Recorder::default()).unwrap();
        ex.process(HEAD).unwrap();
        ex.process(b"--frame\r\n\r\n0123").unwrap();
        assert_eq!(ex.buffered_len(), 4);
        assert!(ex.buffered_len() <= ex.capacity());

        ex.process(b"\r\n--frame\r\n\r\n").unwrap();
        assert_eq!(ex.into_sink().images, vec![b"0123".to_vec()]);
    }

    #[test_log::test]
    fn rearm_keeps_boundary_and_capacity_full_reset_does_not() {
        let config = ExtractorConfig::default()
            .with_initial_capacity(16)
            .with_growth_step(16);
        let mut ex = MultipartExtractor::with_config(config, Recorder::default()).unwrap();
        ex.process(HEAD).unwrap();
        ex.process(b"--frame\r\n\r\n").unwrap();
        ex.process(&[0x80u8; 100]).unwrap();
        let grown = ex.capacity();
        assert!(grown > 16);

        ex.initialize(ResetMode::Rearm).unwrap();
        assert_eq!(ex.phase(), Phase::Header);
        assert_eq!(ex.buffered_len(), 0);
        assert_eq!(ex.capacity(), grown);
        assert_eq!(ex.boundary(), b"frame");

        ex.initialize(ResetMode::Full).unwrap();
        assert_eq!(ex.capacity(), 16);
        assert_eq!(ex.boundary(), b"boundary=");
        assert!(!ex.boundary_known());
    }

    #[test_log::test]
    fn stop_is_observed_between_bytes() {
        let mut ex = extractor();
        let stop = ex.stop_signal().clone();
        ex.process(HEAD).unwrap();
        ex.process(b"--frame\r\n\r\n\x01\x02\x03").unwrap();
        assert_eq!(ex.buffered_len(), 3);

        stop.request_stop();
        ex.process(b"\x04\x05\r\n--frame\r\n\r\n").unwrap();
        assert_eq!(ex.buffered_len(), 3);
        assert!(ex.into_sink().images.is_empty());
    }

    #[test_log::test]
    fn closure_sinks() {
        let mut sizes = Vec::new();
        {
            let mut ex = MultipartExtractor::new(|image: &[u8]| sizes.push(image.len())).unwrap();
            ex.process(HEAD).unwrap();
            ex.process(b"--frame\r\n\r\n1234\r\n--frame\r\n\r\n12\r\n--frame\r\n")
                .unwrap();
        }
        assert_eq!(sizes, vec![4, 2]);
    }
}
