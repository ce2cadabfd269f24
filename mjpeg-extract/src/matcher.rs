//! A streaming substring matcher, fed one byte at a time.

/// Detects a fixed token inside an unbounded stream, one byte at a time, so it
/// works the same no matter how the stream is chunked.
///
/// This is deliberately not a full substring-search automaton: any mismatch
/// sends the cursor back to the start of the token, and the mismatching byte
/// is not re-tried against the first token byte. Tokens with self-overlapping
/// structure can be missed: `"aab"` is not found in `"aaab"`, and `"frame"`
/// is not found in `"fframe"`. Switching to a failure-function restart would
/// change which streams match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatcher {
    token: Vec<u8>,
    cursor: usize,
}

impl PatternMatcher {
    /// Create a matcher for the given token, with the cursor at the start.
    pub fn new(token: impl Into<Vec<u8>>) -> Self {
        Self {
            token: token.into(),
            cursor: 0,
        }
    }

    /// Compare `byte` against the next expected token byte.
    ///
    /// Returns true exactly when this byte completes the token. After a full
    /// match, the caller must [Self::reset] before matching again.
    #[inline]
    pub fn feed(&mut self, byte: u8) -> bool {
        if self.token.get(self.cursor) == Some(&byte) {
            self.cursor += 1;
            self.cursor == self.token.len()
        } else {
            self.cursor = 0;
            false
        }
    }

    /// Start over from the first token byte.
    #[inline]
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Whether the whole token has been seen since the last reset.
    #[inline]
    pub fn is_match(&self) -> bool {
        !self.token.is_empty() && self.cursor == self.token.len()
    }

    /// How many consecutive token bytes have matched so far.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The token this matcher looks for.
    #[inline]
    pub fn token(&self) -> &[u8] {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::PatternMatcher;

    fn feed_all(m: &mut PatternMatcher, input: &[u8]) -> usize {
        input.iter().filter(|&&b| m.feed(b)).count()
    }

    #[test]
    fn matches_embedded_token() {
        let mut m = PatternMatcher::new("boundary=");
        assert_eq!(feed_all(&mut m, b"Content-Type: multipart/x-mixed-replace;boundary="), 1);
        assert!(m.is_match());
        assert_eq!(m.cursor(), m.token().len());
    }

    #[test]
    fn mismatch_restarts_from_scratch() {
        let mut m = PatternMatcher::new("test");
        assert_eq!(feed_all(&mut m, b"tesxtest"), 1);

        // the mismatching 'f' is not re-tried as a token start
        let mut m = PatternMatcher::new("frame");
        assert_eq!(feed_all(&mut m, b"fframe"), 0);
        m.reset();
        assert_eq!(feed_all(&mut m, b"ffframe"), 1);
    }

    #[test]
    fn self_overlapping_tokens_can_be_missed() {
        let mut m = PatternMatcher::new("aab");
        assert_eq!(feed_all(&mut m, b"aaab"), 0);
    }

    #[test]
    fn byte_after_full_match_restarts() {
        let mut m = PatternMatcher::new("ab");
        assert!(!m.feed(b'a'));
        assert!(m.feed(b'b'));
        assert!(!m.feed(b'a'));
        assert_eq!(m.cursor(), 0);
    }

    #[test]
    fn reset_clears_progress() {
        let mut m = PatternMatcher::new("frame");
        feed_all(&mut m, b"fra");
        assert_eq!(m.cursor(), 3);
        m.reset();
        assert_eq!(m.cursor(), 0);
        assert_eq!(feed_all(&mut m, b"me"), 0);
    }

    #[test]
    fn empty_token_never_matches() {
        let mut m = PatternMatcher::new(Vec::new());
        assert!(!m.feed(b'x'));
        assert!(!m.is_match());
    }
}
