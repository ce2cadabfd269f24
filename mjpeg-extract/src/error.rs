//! All error types used in this crate

use std::collections::TryReserveError;

/// Any extraction- or connection-related error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The image buffer could not be grown (or allocated in the first place).
    ///
    /// This is fatal for the current stream: the partial image is discarded.
    #[error("could not allocate {requested} bytes for the image buffer: {source}")]
    Allocation {
        /// capacity we were trying to reach, in bytes
        requested: usize,
        /// what the allocator told us
        source: TryReserveError,
    },

    /// I/O-related error
    #[error("io: {0}")]
    IO(#[from] std::io::Error),

    /// The configured host did not resolve to any address
    #[error("could not resolve {authority}: {source}")]
    Resolve {
        /// `host:port` we tried to resolve
        authority: String,
        /// underlying resolver error
        source: std::io::Error,
    },

    /// None of the resolved addresses accepted a connection
    #[error("could not connect to {authority}")]
    Connect {
        /// `host:port` we tried to connect to
        authority: String,
    },
}

impl Error {
    /// Returns true for the errors a streaming client should answer with a
    /// (longer) retry delay: the server could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Resolve { .. } | Self::Connect { .. })
    }
}

/// A `boundary=` parameter that does not follow RFC 2046, section 5.1.1:
///
/// ```text
/// boundary := 0*69<bchars> bcharsnospace
/// bchars := bcharsnospace / " "
/// bcharsnospace := DIGIT / ALPHA / "'" / "(" / ")" /
///                  "+" / "_" / "," / "-" / "." /
///                  "/" / ":" / "=" / "?"
/// ```
///
/// optionally wrapped in double quotes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoundaryError {
    /// Nothing between `boundary=` and the end of the parameter.
    #[error("empty boundary value")]
    Empty,

    /// A byte that is not a boundary character.
    #[error("invalid character in boundary: {0:#04x}")]
    InvalidCharacter(u8),

    /// Spaces are only allowed in quoted boundaries.
    #[error("spaces are only allowed in quoted boundaries")]
    SpaceOutsideQuotes,

    /// The line ended before the closing double quote.
    #[error("unterminated double quote in boundary")]
    UnterminatedQuote,

    /// Quoted boundaries may not end with a space.
    #[error("boundary may not end with a space")]
    TrailingSpace,

    /// A double quote somewhere other than around the whole value.
    #[error("misplaced double quote in boundary")]
    MisplacedQuote,

    /// Longer than the RFC 2046 cap.
    #[error("boundary longer than {max} characters")]
    TooLong {
        /// maximum boundary length
        max: usize,
    },
}

impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::IO(e) => e,
            e => std::io::Error::other(e),
        }
    }
}
