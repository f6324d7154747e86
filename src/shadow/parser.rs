//! Token-indexed JSON reader (spec §4.3, C3).
//!
//! A single-pass tokenizer in the spirit of `jsmn`: tokens are pushed in
//! document order into a bounded array, each carrying a parent index. This
//! makes path descent a linear scan rather than a tree walk, and costs no
//! allocation beyond the token array itself. The tokenizer tolerates a
//! truncated tail (stops cleanly at the point parsing fails rather than
//! erroring out), which is what makes the documented metadata-stripping
//! trick ([`strip_metadata`]) safe: cutting the string at `,"metadata":`
//! leaves a syntactically incomplete — but still parseable up to that
//! point — document.

use heapless::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Object,
    Array,
    String,
    Primitive,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    typ: TokenType,
    start: usize,
    end: usize,
    /// Count of immediate child tokens (for Object this is 2x the member
    /// count — each member pushes a key token and a value token).
    children: usize,
    parent: Option<usize>,
}

/// Which tokens `find_type` is allowed to consider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentMode {
    /// Any key anywhere in the document.
    Any,
    /// Only keys whose parent is the value returned by the previous match.
    NextParent,
}

/// A parsed document: the original text plus its bounded token array.
pub struct ShadowParser<'a, const N: usize> {
    json: &'a str,
    tokens: Vec<Token, N>,
    last_match: Option<usize>,
}

impl<'a, const N: usize> ShadowParser<'a, N> {
    /// Tokenize `json`. Returns `None` only if tokenization overflowed
    /// `N` tokens before any usable prefix was captured; a truncated tail
    /// (overflow, or a deliberately cut string) still yields whatever
    /// complete tokens were parsed.
    pub fn parse(json: &'a str) -> Self {
        let mut p = ShadowParser {
            json,
            tokens: Vec::new(),
            last_match: None,
        };
        p.tokenize();
        p
    }

    fn push_token(&mut self, typ: TokenType, start: usize, end: usize, parent: Option<usize>) -> Option<usize> {
        if let Some(pi) = parent {
            self.tokens[pi].children += 1;
        }
        let idx = self.tokens.len();
        self.tokens
            .push(Token {
                typ,
                start,
                end,
                children: 0,
                parent,
            })
            .ok()?;
        Some(idx)
    }

    fn tokenize(&mut self) {
        let bytes = self.json.as_bytes();
        let mut stack: Vec<usize, 32> = Vec::new();
        let mut i = 0usize;

        while i < bytes.len() {
            let c = bytes[i];
            match c {
                b' ' | b'\t' | b'\n' | b'\r' | b',' | b':' => {
                    i += 1;
                }
                b'{' | b'[' => {
                    let typ = if c == b'{' { TokenType::Object } else { TokenType::Array };
                    let parent = stack.last().copied();
                    let idx = match self.push_token(typ, i, i, parent) {
                        Some(idx) => idx,
                        None => return, // token budget exhausted; keep what we have
                    };
                    if stack.push(idx).is_err() {
                        return;
                    }
                    i += 1;
                }
                b'}' | b']' => {
                    if let Some(idx) = stack.pop() {
                        self.tokens[idx].end = i + 1;
                    } else {
                        // Unbalanced closer — stop, keep what we have.
                        return;
                    }
                    i += 1;
                }
                b'"' => {
                    let start = i + 1;
                    let mut j = start;
                    let mut closed = false;
                    while j < bytes.len() {
                        if bytes[j] == b'\\' {
                            j += 2;
                            continue;
                        }
                        if bytes[j] == b'"' {
                            closed = true;
                            break;
                        }
                        j += 1;
                    }
                    if !closed {
                        return; // truncated string — stop cleanly
                    }
                    let parent = stack.last().copied();
                    if self.push_token(TokenType::String, start, j, parent).is_none() {
                        return;
                    }
                    i = j + 1;
                }
                _ => {
                    // Primitive: number, true, false, null — runs until a
                    // structural delimiter or whitespace.
                    let start = i;
                    let mut j = i;
                    while j < bytes.len()
                        && !matches!(bytes[j], b',' | b'}' | b']' | b' ' | b'\t' | b'\n' | b'\r')
                    {
                        j += 1;
                    }
                    let parent = stack.last().copied();
                    if self.push_token(TokenType::Primitive, start, j, parent).is_none() {
                        return;
                    }
                    i = j;
                }
            }
        }
    }

    /// Reset any search anchor left by a previous [`find_type`] call so
    /// the next [`ParentMode::Any`] search starts fresh.
    pub fn reset_index(&mut self) {
        self.last_match = None;
    }

    /// Find an object member named `key` whose value has type `want`.
    ///
    /// On success, returns the value token's index and remembers it as
    /// the anchor for a subsequent [`ParentMode::NextParent`] search.
    pub fn find_type(&mut self, key: &str, want: TokenType, mode: ParentMode) -> Option<usize> {
        let scan_parent = match mode {
            ParentMode::NextParent => self.last_match,
            ParentMode::Any => None,
        };
        let mut i = 0;
        while i < self.tokens.len() {
            let tok = self.tokens[i];
            let is_key_candidate = tok.typ == TokenType::String
                && tok
                    .parent
                    .map(|p| self.tokens[p].typ == TokenType::Object)
                    .unwrap_or(false);
            if is_key_candidate {
                if let ParentMode::NextParent = mode {
                    if tok.parent != scan_parent {
                        i += 1;
                        continue;
                    }
                }
                if self.slice(tok.start, tok.end) == key {
                    let val_idx = i + 1;
                    if val_idx < self.tokens.len() && self.tokens[val_idx].typ == want {
                        self.last_match = Some(val_idx);
                        return Some(val_idx);
                    }
                }
            }
            i += 1;
        }
        None
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.json[start..end]
    }

    pub fn strlen(&self, index: usize) -> usize {
        let tok = self.tokens[index];
        tok.end - tok.start
    }

    /// Raw token text (for `String` tokens, the quoted content; for
    /// `Primitive`, the literal text; for containers, the full sub-document
    /// text — useful for re-emitting a sub-object verbatim, e.g. a delta's
    /// `state` object, see [`crate::shadow::delta`]).
    pub fn string(&self, index: usize) -> &'a str {
        let tok = self.tokens[index];
        self.slice(tok.start, tok.end)
    }

    /// Number of immediate children: object member count, array element
    /// count, zero for scalars.
    pub fn size(&self, index: usize) -> usize {
        let tok = self.tokens[index];
        match tok.typ {
            TokenType::Object => tok.children / 2,
            TokenType::Array => tok.children,
            _ => 0,
        }
    }

    pub fn token_type(&self, index: usize) -> TokenType {
        self.tokens[index].typ
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Array element at position `n` within the array token `index`.
    pub fn array_element(&self, index: usize, n: usize) -> Option<usize> {
        if self.tokens[index].typ != TokenType::Array {
            return None;
        }
        let mut seen = 0;
        let mut i = index + 1;
        while i < self.tokens.len() {
            if self.tokens[i].parent == Some(index) {
                if seen == n {
                    return Some(i);
                }
                seen += 1;
            } else if self.tokens[i].start > self.tokens[index].end {
                break;
            }
            i += 1;
        }
        None
    }

    pub fn convert_uint(&self, index: usize) -> Option<u64> {
        let s = self.string(index);
        let mut v: u64 = 0;
        if s.is_empty() {
            return None;
        }
        for c in s.chars() {
            if !c.is_ascii_digit() {
                return None;
            }
            v = v.checked_mul(10)?.checked_add(c as u64 - '0' as u64)?;
        }
        Some(v)
    }

    pub fn convert_int(&self, index: usize) -> Option<i64> {
        let s = self.string(index);
        if let Some(rest) = s.strip_prefix('-') {
            let mag: i64 = rest.parse().ok()?;
            Some(-mag)
        } else {
            s.parse().ok()
        }
    }

    /// Parse a hex string token, with or without a `0x` prefix.
    pub fn convert_hex(&self, index: usize) -> Option<u64> {
        let s = self.string(index);
        let stripped = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        if stripped.is_empty() {
            return None;
        }
        let mut v: u64 = 0;
        for c in stripped.chars() {
            let d = c.to_digit(16)?;
            v = v.checked_mul(16)?.checked_add(d as u64)?;
        }
        Some(v)
    }
}

/// Truncate `json` at the literal `,"metadata":` substring, per spec §4.3
/// parser policy. Safe because the tokenizer stops cleanly on a truncated
/// tail rather than erroring.
pub fn strip_metadata(json: &str) -> &str {
    match json.find(",\"metadata\":") {
        Some(pos) => &json[..pos],
        None => json,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_object() {
        let p: ShadowParser<32> = ShadowParser::parse(r#"{"a":1,"b":"two"}"#);
        let mut p = p;
        let a = p.find_type("a", TokenType::Primitive, ParentMode::Any).unwrap();
        assert_eq!(p.convert_uint(a), Some(1));
        let b = p.find_type("b", TokenType::String, ParentMode::Any).unwrap();
        assert_eq!(p.string(b), "two");
    }

    #[test]
    fn descends_with_next_parent_through_ambiguous_keys() {
        // "eventLog" appears twice, at different nesting — NEXT_PARENT must
        // pick the one under the matched "state" -> "reported" path.
        let json = r#"{
            "metadata": {"eventLog": {"ts": 1}},
            "state": {"reported": {"eventLog": [1,2,3]}}
        }"#;
        let p: ShadowParser<64> = ShadowParser::parse(json);
        let mut p = p;
        let state = p.find_type("state", TokenType::Object, ParentMode::Any).unwrap();
        let _ = state;
        let reported = p
            .find_type("reported", TokenType::Object, ParentMode::NextParent)
            .unwrap();
        let _ = reported;
        let log = p
            .find_type("eventLog", TokenType::Array, ParentMode::NextParent)
            .unwrap();
        assert_eq!(p.size(log), 3);
    }

    #[test]
    fn array_element_access() {
        let p: ShadowParser<64> = ShadowParser::parse(r#"{"arr":[10,20,30]}"#);
        let mut p = p;
        let arr = p.find_type("arr", TokenType::Array, ParentMode::Any).unwrap();
        assert_eq!(p.size(arr), 3);
        let e1 = p.array_element(arr, 1).unwrap();
        assert_eq!(p.convert_uint(e1), Some(20));
    }

    #[test]
    fn convert_hex_with_and_without_prefix() {
        let p: ShadowParser<32> = ShadowParser::parse(r#"{"h":"0x1a","g":"1a"}"#);
        let mut p = p;
        let h = p.find_type("h", TokenType::String, ParentMode::Any).unwrap();
        assert_eq!(p.convert_hex(h), Some(0x1a));
        let g = p.find_type("g", TokenType::String, ParentMode::Any).unwrap();
        assert_eq!(p.convert_hex(g), Some(0x1a));
    }

    #[test]
    fn strip_metadata_truncates_and_parser_still_reads_prefix() {
        let json = r#"{"state":{"reported":{"x":1}},"metadata":{"x":{"timestamp":1}}}"#;
        let stripped = strip_metadata(json);
        assert!(!stripped.contains("metadata"));
        let mut p: ShadowParser<32> = ShadowParser::parse(stripped);
        let state = p.find_type("state", TokenType::Object, ParentMode::Any).unwrap();
        let _ = state;
        let reported = p
            .find_type("reported", TokenType::Object, ParentMode::NextParent)
            .unwrap();
        let x = p.find_type("x", TokenType::Primitive, ParentMode::NextParent).unwrap();
        assert_eq!(p.convert_uint(x), Some(1));
    }

    #[test]
    fn rejects_missing_key() {
        let mut p: ShadowParser<32> = ShadowParser::parse(r#"{"a":1}"#);
        assert!(p.find_type("missing", TokenType::Primitive, ParentMode::Any).is_none());
    }
}
