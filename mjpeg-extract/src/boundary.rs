//! Parsing the value of a `boundary=` parameter, one byte at a time.
//!
//! The value follows RFC 2046, section 5.1.1: 1 to 70 boundary characters,
//! optionally wrapped in double quotes, where only the quoted form may contain
//! spaces (but not end with one).

use crate::error::BoundaryError;

/// Maximum length of a boundary, per RFC 2046
pub const MAX_BOUNDARY_LEN: usize = 70;

/// The marker we look for in the response headers before the boundary value.
pub const BOUNDARY_MARKER: &[u8] = b"boundary=";

/// Returns true for RFC 2046 `bcharsnospace`.
#[inline]
pub fn is_boundary_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'\'' | b'(' | b')' | b'+' | b'_' | b',' | b'-' | b'.' | b'/' | b':' | b'=' | b'?'
        )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quoting {
    /// Haven't seen the first byte yet
    Undecided,
    Bare,
    Open,
    Closed,
}

/// What happened after [BoundaryCapture::push]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStep {
    /// The value goes on
    Continue,
    /// The value is complete, further bytes are none of our business
    Complete,
}

/// Accumulates and validates a boundary value that directly follows
/// `boundary=` in a header line.
///
/// The value ends at the end of the line (CR or LF), or at a `;` that starts
/// the next parameter.
#[derive(Debug, Clone)]
pub struct BoundaryCapture {
    token: Vec<u8>,
    quoting: Quoting,
    complete: bool,
}

impl Default for BoundaryCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundaryCapture {
    /// Start capturing a new boundary value.
    pub fn new() -> Self {
        Self {
            token: Vec::with_capacity(MAX_BOUNDARY_LEN),
            quoting: Quoting::Undecided,
            complete: false,
        }
    }

    /// Whether the value has been fully captured.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// The boundary captured so far, without quotes.
    pub fn token(&self) -> &[u8] {
        &self.token
    }

    /// Consume the capture, returning the boundary (without quotes).
    pub fn into_token(self) -> Vec<u8> {
        self.token
    }

    /// Feed the next byte of the value.
    ///
    /// Once this has returned [CaptureStep::Complete], further bytes are
    /// ignored. An error means the whole value must be discarded.
    pub fn push(&mut self, byte: u8) -> Result<CaptureStep, BoundaryError> {
        if self.complete {
            return Ok(CaptureStep::Complete);
        }

        if self.quoting == Quoting::Undecided {
            if byte == b'"' {
                self.quoting = Quoting::Open;
                return Ok(CaptureStep::Continue);
            }
            self.quoting = Quoting::Bare;
        }

        match byte {
            b'\r' | b'\n' => {
                if self.quoting == Quoting::Open {
                    return Err(BoundaryError::UnterminatedQuote);
                }
                self.finish()
            }
            b';' if self.quoting != Quoting::Open => self.finish(),
            _ if self.quoting == Quoting::Closed => Err(BoundaryError::MisplacedQuote),
            b'"' => match self.quoting {
                Quoting::Open => {
                    self.quoting = Quoting::Closed;
                    Ok(CaptureStep::Continue)
                }
                _ => Err(BoundaryError::MisplacedQuote),
            },
            b' ' if self.quoting != Quoting::Open => Err(BoundaryError::SpaceOutsideQuotes),
            b' ' => self.store(byte),
            _ if is_boundary_char(byte) => self.store(byte),
            _ => Err(BoundaryError::InvalidCharacter(byte)),
        }
    }

    fn store(&mut self, byte: u8) -> Result<CaptureStep, BoundaryError> {
        if self.token.len() == MAX_BOUNDARY_LEN {
            return Err(BoundaryError::TooLong {
                max: MAX_BOUNDARY_LEN,
            });
        }
        self.token.push(byte);
        Ok(CaptureStep::Continue)
    }

    fn finish(&mut self) -> Result<CaptureStep, BoundaryError> {
        match self.token.last() {
            None => Err(BoundaryError::Empty),
            Some(b' ') => Err(BoundaryError::TrailingSpace),
            Some(_) => {
                self.complete = true;
                Ok(CaptureStep::Complete)
            }
        }
    }
}
