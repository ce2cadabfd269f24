#![allow(missing_docs)]

//! A corpus of multipart streams for testing.

use crate::{error::BoundaryError, sink::ImageSink};

pub struct Case {
    pub name: &'static str,
    /// Full response, headers included
    pub stream: Vec<u8>,
    /// Images a correct extractor yields, in order
    pub images: Vec<Vec<u8>>,
    /// Boundary definitions that should be rejected
    pub boundary_errors: Vec<BoundaryError>,
}

impl Default for Case {
    fn default() -> Self {
        Self {
            name: "empty",
            stream: Vec::new(),
            images: Vec::new(),
            boundary_errors: Vec::new(),
        }
    }
}

/// Collects everything an extractor hands out.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    pub images: Vec<Vec<u8>>,
    pub boundary_errors: Vec<BoundaryError>,
}

impl ImageSink for Recorder {
    fn on_image(&mut self, image: &[u8]) {
        self.images.push(image.to_vec());
    }

    fn on_boundary_error(&mut self, err: &BoundaryError) {
        self.boundary_errors.push(err.clone());
    }
}

/// A tiny deterministic PRNG, so that test data is the same on every run.
#[derive(Debug, Clone)]
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(6364136223846793005).wrapping_add(1))
    }

    pub fn next_u32(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    /// Uniform-ish in `lo..=hi`
    pub fn range(&mut self, lo: usize, hi: usize) -> usize {
        lo + (self.next_u32() as usize) % (hi - lo + 1)
    }
}

/// Something shaped like a JPEG (SOI marker, filler, EOI marker). The filler
/// never contains ASCII, so it can't be mistaken for a boundary or a line end.
pub fn fake_jpeg(seed: u64, len: usize) -> Vec<u8> {
    assert!(len >= 4, "a fake jpeg needs room for its markers");

    let mut rng = Lcg::new(seed);
    let mut out = Vec::with_capacity(len);
    out.extend_from_slice(&[0xff, 0xd8]);
    out.extend((0..len - 4).map(|_| 0x80 | (rng.next_u32() as u8)));
    out.extend_from_slice(&[0xff, 0xd9]);
    out
}

/// Response headers, with the given `Content-Type` parameters and extra header
/// lines after it.
pub fn response_head(params: &str, extra_headers: &[&str]) -> Vec<u8> {
    let mut head = String::from("HTTP/1.0 200 OK\r\n");
    head.push_str("Server: MJPG-Streamer/0.2\r\n");
    head.push_str("Connection: close\r\n");
    head.push_str(&format!("Content-Type: multipart/x-mixed-replace;{params}\r\n"));
    for line in extra_headers {
        head.push_str(line);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    head.into_bytes()
}

/// `--boundary`, part headers, then the image: what a camera sends per frame.
pub fn part(boundary: &str, image: &[u8]) -> Vec<u8> {
    let mut out = format!(
        "--{boundary}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\nX-Timestamp: 1700000000.000000\r\n\r\n",
        image.len()
    )
    .into_bytes();
    out.extend_from_slice(image);
    out.extend_from_slice(b"\r\n");
    out
}

/// Headers, one part per image, and the closing delimiter.
pub fn mjpeg_stream(params: &str, boundary: &str, images: &[Vec<u8>]) -> Vec<u8> {
    let mut out = response_head(params, &["Cache-Control: no-cache", "Pragma: no-cache"]);
    for image in images {
        out.extend(part(boundary, image));
    }
    out.extend(format!("--{boundary}--\r\n").into_bytes());
    out
}

fn frames(seed: u64, sizes: &[usize]) -> Vec<Vec<u8>> {
    sizes
        .iter()
        .enumerate()
        .map(|(i, &len)| fake_jpeg(seed + i as u64, len))
        .collect()
}

pub fn test_cases() -> Vec<Case> {
    let mut cases = vec![];

    {
        let image = vec![0xff, 0xd8, 0x01, 0x02, 0x03, 0xff, 0xd9];
        let mut stream =
            b"HTTP/1.0 200 OK\r\nContent-Type: multipart/x-mixed-replace;boundary=frame\r\n\r\n--frame\r\n\r\n"
                .to_vec();
        stream.extend_from_slice(&image);
        stream.extend_from_slice(b"\r\n--frame\r\n\r\n");
        cases.push(Case {
            name: "minimal.mjpeg",
            stream,
            images: vec![image],
            ..Default::default()
        });
    }

    {
        let images = frames(1, &[4, 1024, 5000, 64, 20_000]);
        cases.push(Case {
            name: "mjpg-streamer.mjpeg",
            stream: mjpeg_stream(
                "boundary=boundarydonotcross",
                "boundarydonotcross",
                &images,
            ),
            images,
            ..Default::default()
        });
    }

    {
        let images = frames(10, &[300, 400]);
        let mut stream = response_head("boundary=ipcam", &["X-Camera: front-door"]);
        stream.extend(part("ipcam", &images[0]));
        stream.extend(part("ipcam", &images[1]));
        stream.extend_from_slice(b"--ipcam\r\n");
        cases.push(Case {
            name: "boundary-not-on-last-header-line.mjpeg",
            stream,
            images,
            ..Default::default()
        });
    }

    {
        let images = frames(20, &[128, 256, 512]);
        cases.push(Case {
            name: "quoted-boundary.mjpeg",
            stream: mjpeg_stream(
                "boundary=\"my (quoted) boundary\"",
                "my (quoted) boundary",
                &images,
            ),
            images,
            ..Default::default()
        });
    }

    {
        let images = frames(30, &[100, 200]);
        cases.push(Case {
            name: "boundary-with-parameters.mjpeg",
            stream: mjpeg_stream(" boundary=myboundary; charset=binary", "myboundary", &images),
            images,
            ..Default::default()
        });
    }

    {
        let images = frames(40, &[250 * 1024, 10 * 1024, 150 * 1024]);
        cases.push(Case {
            name: "large-frames.mjpeg",
            stream: mjpeg_stream("boundary=frame", "frame", &images),
            images,
            ..Default::default()
        });
    }

    {
        let sizes: Vec<usize> = (0..50).map(|i| 4 + i * 37).collect();
        let images = frames(50, &sizes);
        cases.push(Case {
            name: "many-frames.mjpeg",
            stream: mjpeg_stream("boundary=frame", "frame", &images),
            images,
            ..Default::default()
        });
    }

    {
        let mut stream = response_head("boundary=frame", &[]);
        stream.extend(part("frame", b""));
        stream.extend(part("frame", &[0x01]));
        stream.extend_from_slice(b"--frame--\r\n");
        cases.push(Case {
            name: "tiny-parts.mjpeg",
            stream,
            images: vec![vec![], vec![0x01]],
            ..Default::default()
        });
    }

    {
        let images = frames(60, &[500]);
        cases.push(Case {
            name: "unterminated-quote.mjpeg",
            stream: mjpeg_stream("boundary=\"unterminated", "unterminated", &images),
            images: vec![],
            boundary_errors: vec![BoundaryError::UnterminatedQuote],
        });
    }

    {
        let images = frames(70, &[600, 700]);
        let mut stream = response_head(
            "boundary=\"unterminated",
            &["X-Fallback: boundary=frame"],
        );
        for image in &images {
            stream.extend(part("frame", image));
        }
        stream.extend_from_slice(b"--frame--\r\n");
        cases.push(Case {
            name: "malformed-then-valid.mjpeg",
            stream,
            images,
            boundary_errors: vec![BoundaryError::UnterminatedQuote],
        });
    }

    {
        let boundary = "x".repeat(71);
        let images = frames(80, &[32]);
        cases.push(Case {
            name: "boundary-too-long.mjpeg",
            stream: mjpeg_stream(&format!("boundary={boundary}"), &boundary, &images),
            images: vec![],
            boundary_errors: vec![BoundaryError::TooLong { max: 70 }],
        });
    }

    cases
}

/// Splits `data` in pseudo-random chunks of 1 to `max` bytes.
pub fn random_chunks(data: &[u8], seed: u64, max: usize) -> Vec<&[u8]> {
    let mut rng = Lcg::new(seed);
    let mut chunks = vec![];
    let mut rest = data;
    while !rest.is_empty() {
        let n = rng.range(1, max).min(rest.len());
        let (chunk, tail) = rest.split_at(n);
        chunks.push(chunk);
        rest = tail;
    }
    chunks
}

pub fn install_test_subscriber() {
    let env_filter = tracing_subscriber::EnvFilter::builder().from_env_lossy();
    // fails when called more than once per process (like in `cargo test`), that's fine
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .try_init();
}
