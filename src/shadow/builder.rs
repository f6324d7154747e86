//! Streaming JSON writer over a fixed-capacity buffer (spec §4.2, C2).
//!
//! Every element written — primitive, group, or array — is followed
//! unconditionally by a trailing comma. Closing a container means
//! overwriting that trailing comma with the container's closer and then
//! re-appending a comma, because the container itself is one element of
//! its parent. [`ShadowBuilder::finalize`] performs the final overwrite
//! without re-appending, since the root object has no parent.
//!
//! This avoids allocating a JSON tree to build a shadow document: every
//! byte goes straight into the caller's buffer (typically a buffer-pool
//! allocation, see [`crate::pool`]), and the writer never writes past
//! `N - 1`, leaving room for a defensive NUL if the buffer is ever handed
//! to C-style string code downstream.

use heapless::{String, Vec};

/// A JSON writer bounded to `N` bytes.
pub struct ShadowBuilder<const N: usize> {
    buf: Vec<u8, N>,
}

impl<const N: usize> ShadowBuilder<N> {
    /// Start a new document; writes the opening `{` of the root object.
    pub fn new() -> Self {
        let mut buf = Vec::new();
        let _ = buf.push(b'{');
        Self { buf }
    }

    /// Bytes written so far (not yet finalized).
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Room left before the buffer hits its `N - 1` soft limit.
    fn remaining(&self) -> usize {
        (N - 1).saturating_sub(self.buf.len())
    }

    fn push_byte(&mut self, b: u8) -> bool {
        if self.remaining() == 0 {
            return false;
        }
        self.buf.push(b).is_ok()
    }

    fn push_raw(&mut self, s: &str) -> bool {
        if self.remaining() < s.len() {
            return false;
        }
        for &b in s.as_bytes() {
            if self.buf.push(b).is_err() {
                return false;
            }
        }
        true
    }

    fn push_key(&mut self, key: &str) {
        self.push_byte(b'"');
        self.push_raw(key);
        self.push_byte(b'"');
        self.push_byte(b':');
    }

    fn push_comma(&mut self) {
        self.push_byte(b',');
    }

    /// Append a string value with JSON escaping, including the surrounding quotes.
    fn push_escaped_string(&mut self, s: &str) {
        self.push_byte(b'"');
        for c in s.chars() {
            match c {
                '"' => {
                    self.push_byte(b'\\');
                    self.push_byte(b'"');
                }
                '\\' => {
                    self.push_byte(b'\\');
                    self.push_byte(b'\\');
                }
                '\u{8}' => {
                    self.push_byte(b'\\');
                    self.push_byte(b'b');
                }
                '\u{c}' => {
                    self.push_byte(b'\\');
                    self.push_byte(b'f');
                }
                '\n' => {
                    self.push_byte(b'\\');
                    self.push_byte(b'n');
                }
                '\r' => {
                    self.push_byte(b'\\');
                    self.push_byte(b'r');
                }
                '\t' => {
                    self.push_byte(b'\\');
                    self.push_byte(b't');
                }
                _ => {
                    let mut tmp = [0u8; 4];
                    self.push_raw(c.encode_utf8(&mut tmp));
                }
            }
        }
        self.push_byte(b'"');
    }

    fn push_unsigned(&mut self, value: u64) {
        if value == 0 {
            self.push_byte(b'0');
            return;
        }
        let mut digits = [0u8; 20];
        let mut i = digits.len();
        let mut v = value;
        while v > 0 {
            i -= 1;
            digits[i] = b'0' + (v % 10) as u8;
            v /= 10;
        }
        for &d in &digits[i..] {
            self.push_byte(d);
        }
    }

    fn push_signed(&mut self, value: i64) {
        if value < 0 {
            self.push_byte(b'-');
            // value.unsigned_abs() handles i64::MIN correctly.
            self.push_unsigned(value.unsigned_abs());
        } else {
            self.push_unsigned(value as u64);
        }
    }

    fn push_hex(&mut self, value: u64, digits: usize) {
        self.push_byte(b'"');
        const HEX: &[u8; 16] = b"0123456789abcdef";
        for shift in (0..digits).rev() {
            let nibble = (value >> (shift * 4)) & 0xf;
            self.push_byte(HEX[nibble as usize]);
        }
        self.push_byte(b'"');
    }

    // ── Primitives ──────────────────────────────────────────────────

    pub fn add_uint(&mut self, key: &str, value: u64) -> &mut Self {
        self.push_key(key);
        self.push_unsigned(value);
        self.push_comma();
        self
    }

    pub fn add_int(&mut self, key: &str, value: i64) -> &mut Self {
        self.push_key(key);
        self.push_signed(value);
        self.push_comma();
        self
    }

    pub fn add_str(&mut self, key: &str, value: &str) -> &mut Self {
        self.push_key(key);
        self.push_escaped_string(value);
        self.push_comma();
        self
    }

    pub fn add_bool(&mut self, key: &str, value: bool) -> &mut Self {
        self.push_key(key);
        self.push_raw(if value { "true" } else { "false" });
        self.push_comma();
        self
    }

    pub fn add_null(&mut self, key: &str) -> &mut Self {
        self.push_key(key);
        self.push_raw("null");
        self.push_comma();
        self
    }

    /// `"a.b.c"` version string.
    pub fn add_version(&mut self, key: &str, version: (u8, u8, u8)) -> &mut Self {
        self.push_key(key);
        self.push_byte(b'"');
        self.push_unsigned(version.0 as u64);
        self.push_byte(b'.');
        self.push_unsigned(version.1 as u64);
        self.push_byte(b'.');
        self.push_unsigned(version.2 as u64);
        self.push_byte(b'"');
        self.push_comma();
        self
    }

    /// Two hex digit string, e.g. `"0a"`.
    pub fn add_hex8(&mut self, key: &str, value: u8) -> &mut Self {
        self.push_key(key);
        self.push_hex(value as u64, 2);
        self.push_comma();
        self
    }

    /// Four hex digit string, e.g. `"0a8c"`.
    pub fn add_hex16(&mut self, key: &str, value: u16) -> &mut Self {
        self.push_key(key);
        self.push_hex(value as u64, 4);
        self.push_comma();
        self
    }

    /// Append a raw, already-valid JSON fragment verbatim — used to embed
    /// a nested JSON object pulled whole from another source (e.g. the
    /// sensor delta's `state` object, re-emitted as a JSON-RPC command).
    pub fn add_raw(&mut self, key: &str, json_fragment: &str) -> &mut Self {
        self.push_key(key);
        self.push_raw(json_fragment);
        self.push_comma();
        self
    }

    /// One `["addr",epoch,greenlisted]` array element (spec §4.4 gateway
    /// shadow maker). Call only inside a [`begin_array`] / [`end_array`] pair.
    pub fn sensor_table_array_entry(&mut self, addr: &str, epoch: u32, greenlisted: bool) -> &mut Self {
        self.push_byte(b'[');
        self.push_byte(b'"');
        self.push_raw(addr);
        self.push_byte(b'"');
        self.push_byte(b',');
        self.push_unsigned(epoch as u64);
        self.push_byte(b',');
        self.push_raw(if greenlisted { "true" } else { "false" });
        self.push_byte(b']');
        self.push_comma();
        self
    }

    /// One ring-log array element: `["<hex8 record_type>", epoch, "<hex16 data>"]`
    /// (spec §4.1 `generate_json`).
    pub fn log_event_triple(&mut self, record_type: u8, epoch: u32, data: u16) -> &mut Self {
        self.push_byte(b'[');
        self.push_hex(record_type as u64, 2);
        self.push_byte(b',');
        self.push_unsigned(epoch as u64);
        self.push_byte(b',');
        self.push_hex(data as u64, 4);
        self.push_byte(b']');
        self.push_comma();
        self
    }

    // ── Containers ──────────────────────────────────────────────────

    pub fn begin_group(&mut self, key: &str) -> &mut Self {
        self.push_key(key);
        self.push_byte(b'{');
        self
    }

    /// Close the most recently opened group.
    pub fn end_group(&mut self) -> &mut Self {
        self.close_container(b'}');
        self
    }

    pub fn begin_array(&mut self, key: &str) -> &mut Self {
        self.push_key(key);
        self.push_byte(b'[');
        self
    }

    pub fn end_array(&mut self) -> &mut Self {
        self.close_container(b']');
        self
    }

    fn close_container(&mut self, closer: u8) {
        match self.buf.last().copied() {
            Some(b',') => {
                self.buf.pop();
                self.push_byte(closer);
            }
            // Empty container: nothing to overwrite.
            _ => {
                self.push_byte(closer);
            }
        }
        self.push_comma();
    }

    /// Close the root object. The buffer must end in a trailing comma
    /// (i.e. at least one element was written); the comma is overwritten
    /// with `}` rather than followed by one, since the root has no parent.
    pub fn finalize(mut self) -> Vec<u8, N> {
        match self.buf.last().copied() {
            Some(b',') => {
                self.buf.pop();
                let _ = self.buf.push(b'}');
            }
            _ => {
                let _ = self.buf.push(b'}');
            }
        }
        self.buf
    }

    /// View the buffer as UTF-8 without finalizing — useful for tests that
    /// want to inspect an in-progress document.
    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.buf).unwrap_or("")
    }
}

impl<const N: usize> Default for ShadowBuilder<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a finalized buffer into a `&str`, for callers that want to log
/// or publish it without caring about the backing `heapless::Vec`.
pub fn finalized_str<const N: usize>(buf: &Vec<u8, N>) -> &str {
    core::str::from_utf8(buf).unwrap_or("")
}

/// Convenience: build a fixed string from a `&str`, truncating if it
/// doesn't fit (used for short fields like sensor names).
pub fn truncated_string<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_produces_valid_object() {
        let mut b: ShadowBuilder<128> = ShadowBuilder::new();
        b.add_uint("rssi", 5).add_bool("flag", true);
        let buf = b.finalize();
        let s = finalized_str(&buf);
        assert_eq!(s, r#"{"rssi":5,"flag":true}"#);
    }

    #[test]
    fn nested_group_closes_and_continues() {
        let mut b: ShadowBuilder<256> = ShadowBuilder::new();
        b.begin_group("state");
        b.begin_group("reported");
        b.add_uint("rssi", 1);
        b.end_group(); // reported
        b.end_group(); // state
        b.add_bool("done", true);
        let buf = b.finalize();
        let s = finalized_str(&buf);
        assert_eq!(s, r#"{"state":{"reported":{"rssi":1}},"done":true}"#);
    }

    #[test]
    fn array_of_sensor_entries() {
        let mut b: ShadowBuilder<256> = ShadowBuilder::new();
        b.begin_array("sensors");
        b.sensor_table_array_entry("c13a7e4118a2", 100, true);
        b.sensor_table_array_entry("aabbccddeeff", 200, false);
        b.end_array();
        let buf = b.finalize();
        let s = finalized_str(&buf);
        assert_eq!(
            s,
            r#"{"sensors":[["c13a7e4118a2",100,true],["aabbccddeeff",200,false]]}"#
        );
    }

    #[test]
    fn escapes_quotes_and_control_chars() {
        let mut b: ShadowBuilder<128> = ShadowBuilder::new();
        b.add_str("name", "a\"b\\c\nd");
        let buf = b.finalize();
        let s = finalized_str(&buf);
        assert_eq!(s, r#"{"name":"a\"b\\c\nd"}"#);
    }

    #[test]
    fn signed_negative_values() {
        let mut b: ShadowBuilder<64> = ShadowBuilder::new();
        b.add_int("tempCc", -2550);
        let buf = b.finalize();
        assert_eq!(finalized_str(&buf), r#"{"tempCc":-2550}"#);
    }

    #[test]
    fn hex_and_version_fields() {
        let mut b: ShadowBuilder<128> = ShadowBuilder::new();
        b.add_hex8("rt", 0x01).add_hex16("data", 0x0a8c).add_version("fw", (1, 2, 3));
        let buf = b.finalize();
        assert_eq!(
            finalized_str(&buf),
            r#"{"rt":"01","data":"0a8c","fw":"1.2.3"}"#
        );
    }

    #[test]
    fn empty_group_produces_valid_braces() {
        let mut b: ShadowBuilder<64> = ShadowBuilder::new();
        b.begin_group("empty");
        b.end_group();
        b.add_bool("after", true);
        let buf = b.finalize();
        assert_eq!(finalized_str(&buf), r#"{"empty":{},"after":true}"#);
    }

    #[test]
    fn truncates_when_buffer_is_full() {
        let mut b: ShadowBuilder<16> = ShadowBuilder::new();
        b.add_str("k", "this value is much too long to fit");
        // Must not panic; resulting bytes stay within capacity.
        assert!(b.len() <= 16);
    }

    #[test]
    fn raw_fragment_written_verbatim() {
        let mut b: ShadowBuilder<128> = ShadowBuilder::new();
        b.add_raw("params", r#"{"x":1,"y":2}"#);
        let buf = b.finalize();
        assert_eq!(finalized_str(&buf), r#"{"params":{"x":1,"y":2}}"#);
    }
}
