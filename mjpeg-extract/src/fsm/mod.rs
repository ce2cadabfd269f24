//! Finding images in a multipart stream means scanning the response headers
//! for the `boundary=` parameter, validating its value, then copying part
//! bodies into a buffer until the boundary shows up again:
//! [MultipartExtractor] is the state machine that does all of that, one byte
//! at a time, so it doesn't care how the network splits the stream.

macro_rules! transition {
    ($state: expr => ($pattern: pat) $body: expr) => {
        $state = if let $pattern = std::mem::take(&mut $state) {
            $body
        } else {
            unreachable!()
        };
    };
}

mod extractor;
pub use extractor::{MultipartExtractor, Phase, ResetMode};
