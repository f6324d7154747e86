//! String-aware brace matcher for framing JSON objects out of a byte
//! stream (spec §4.5, §8).
//!
//! Sensor notifications arrive as arbitrarily-fragmented GATT packets; this
//! owns a fixed buffer and emits a complete object every time `{`/`}` count
//! balances, correctly skipping braces inside quoted strings.

use heapless::Vec;

/// Accumulates bytes until a complete JSON object is framed.
pub struct BracketMatcher<const N: usize> {
    buf: Vec<u8, N>,
    depth: u32,
    in_string: bool,
    escaped: bool,
}

impl<const N: usize> Default for BracketMatcher<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> BracketMatcher<N> {
    pub fn new() -> Self {
        Self { buf: Vec::new(), depth: 0, in_string: false, escaped: false }
    }

    /// Feed one byte. Returns `Some(())` via [`Self::take_object`] once a
    /// top-level object balances; the caller should call `take_object`
    /// immediately after a `true` return to retrieve it before more bytes
    /// are fed.
    pub fn feed(&mut self, byte: u8) -> bool {
        if self.depth == 0 && byte != b'{' {
            // Not inside an object yet; ignore whitespace/noise between frames.
            return false;
        }
        if self.buf.push(byte).is_err() {
            // Overflow: drop the in-progress frame and resync on the next `{`.
            self.reset();
            return false;
        }

        if self.escaped {
            self.escaped = false;
            return false;
        }
        match byte {
            b'\\' if self.in_string => self.escaped = true,
            b'"' => self.in_string = !self.in_string,
            b'{' if !self.in_string => self.depth += 1,
            b'}' if !self.in_string => {
                self.depth = self.depth.saturating_sub(1);
                if self.depth == 0 {
                    return true;
                }
            }
            _ => {}
        }
        false
    }

    /// Retrieve the framed object and reset for the next one. Only
    /// meaningful immediately after [`Self::feed`] returns `true`.
    pub fn take_object(&mut self) -> &[u8] {
        &self.buf
    }

    pub fn reset(&mut self) {
        self.buf.clear();
        self.depth = 0;
        self.in_string = false;
        self.escaped = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all<const N: usize>(m: &mut BracketMatcher<N>, bytes: &[u8]) -> heapless::Vec<heapless::Vec<u8, N>, 8> {
        let mut out = heapless::Vec::new();
        for &b in bytes {
            if m.feed(b) {
                let obj: heapless::Vec<u8, N> = heapless::Vec::from_slice(m.take_object()).unwrap();
                out.push(obj).unwrap();
                m.reset();
            }
        }
        out
    }

    #[test]
    fn emits_one_object_from_split_fragments() {
        let mut m: BracketMatcher<64> = BracketMatcher::new();
        let mut objects = feed_all(&mut m, br#"{"r":"o"#);
        assert!(objects.is_empty());
        let rest = feed_all(&mut m, br#"k"}"#);
        objects.extend_from_slice(&rest).unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].as_slice(), br#"{"r":"ok"}"#);
    }

    #[test]
    fn ignores_braces_inside_quoted_strings() {
        let mut m: BracketMatcher<64> = BracketMatcher::new();
        let objects = feed_all(&mut m, br#"{"note":"a{b}c"}"#);
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].as_slice(), br#"{"note":"a{b}c"}"#);
    }

    #[test]
    fn emits_each_object_in_a_concatenated_stream_exactly_once() {
        let mut m: BracketMatcher<64> = BracketMatcher::new();
        let objects = feed_all(&mut m, br#"{"a":1}{"b":2}"#);
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].as_slice(), br#"{"a":1}"#);
        assert_eq!(objects[1].as_slice(), br#"{"b":2}"#);
    }

    #[test]
    fn handles_escaped_quote_within_string() {
        let mut m: BracketMatcher<64> = BracketMatcher::new();
        let objects = feed_all(&mut m, br#"{"s":"a\"}\""}"#);
        assert_eq!(objects.len(), 1);
    }
}
