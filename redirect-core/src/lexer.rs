//   Copyright (c) 2024-2026 Anton Kundenko <singaraiona@gmail.com>
//   All rights reserved.
//
//   Permission is hereby granted, free of charge, to any person obtaining a copy
//   of this software and associated documentation files (the "Software"), to deal
//   in the Software without restriction, including without limitation the rights
//   to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
//   copies of the Software, and to permit persons to whom the Software is
//   furnished to do so, subject to the following conditions:
//
//   The above copyright notice and this permission notice shall be included in all
//   copies or substantial portions of the Software.
//
//   THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
//   IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
//   FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
//   AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
//   LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
//   OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
//   SOFTWARE.

//! Lexical scanner primitives (C1).
//!
//! Every translation stage consults these instead of indexing into SQL text
//! directly, so that no stage ever matches inside a string literal or a
//! comment. Nothing here understands SQL grammar beyond quote/comment/
//! paren tracking — translation is lexical, not a parse.

/// Skip a string literal starting at `bytes[start]` (which must be a `'`).
/// Returns the index just past the closing quote, handling `''` escapes.
pub fn skip_string_literal(bytes: &[u8], start: usize) -> usize {
    debug_assert_eq!(bytes.get(start), Some(&b'\''));
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            if bytes.get(i + 1) == Some(&b'\'') {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    i
}

/// Skip a double-quoted identifier starting at `bytes[start]` (must be `"`).
pub fn skip_quoted_ident(bytes: &[u8], start: usize) -> usize {
    debug_assert_eq!(bytes.get(start), Some(&b'"'));
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == b'"' {
            if bytes.get(i + 1) == Some(&b'"') {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    i
}

/// Skip a line comment (`-- ...`) or block comment (`/* ... */`) starting at
/// `bytes[start]`. Returns `start` unchanged if no comment begins there.
pub fn skip_line_and_block_comments(bytes: &[u8], start: usize) -> usize {
    if bytes[start..].starts_with(b"--") {
        let mut i = start + 2;
        while i < bytes.len() && bytes[i] != b'\n' {
            i += 1;
        }
        return i;
    }
    if bytes[start..].starts_with(b"/*") {
        let mut i = start + 2;
        while i + 1 < bytes.len() {
            if bytes[i] == b'*' && bytes[i + 1] == b'/' {
                return i + 2;
            }
            i += 1;
        }
        return bytes.len();
    }
    start
}

/// True if `bytes[i]` is not part of an identifier (used to bound keyword
/// and function-name matches so `iif` doesn't match inside `motiif`).
pub fn is_word_boundary(bytes: &[u8], i: usize) -> bool {
    match bytes.get(i) {
        None => true,
        Some(b) => !(b.is_ascii_alphanumeric() || *b == b'_'),
    }
}

/// Find the index of the `)` matching the `(` at `bytes[open]`, skipping
/// nested parens, string literals, and comments. Returns `None` if
/// unbalanced.
pub fn find_matching_paren(bytes: &[u8], open: usize) -> Option<usize> {
    debug_assert_eq!(bytes.get(open), Some(&b'('));
    let mut depth = 0i32;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                i = skip_string_literal(bytes, i);
                continue;
            }
            b'"' | b'`' => {
                let quote = bytes[i];
                let end = skip_quoted_of(bytes, i, quote);
                i = end;
                continue;
            }
            b'-' | b'/' => {
                let after = skip_line_and_block_comments(bytes, i);
                if after != i {
                    i = after;
                    continue;
                }
            }
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn skip_quoted_of(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    i
}

/// Case-insensitive search for `needle` in `haystack` at or after `from`,
/// skipping string literals and comments, and requiring word boundaries on
/// both sides (so it behaves like a keyword/identifier match, not a raw
/// substring search). Returns the byte offset of the match, if any.
pub fn case_insensitive_substring(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let needle_lower: Vec<u8> = needle.as_bytes().iter().map(|b| b.to_ascii_lowercase()).collect();
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                i = skip_string_literal(bytes, i);
                continue;
            }
            b'"' | b'`' => {
                let q = bytes[i];
                i = skip_quoted_of(bytes, i, q);
                continue;
            }
            b'-' | b'/' => {
                let after = skip_line_and_block_comments(bytes, i);
                if after != i {
                    i = after;
                    continue;
                }
            }
            _ => {}
        }
        if i + needle_lower.len() <= bytes.len() {
            let window = &bytes[i..i + needle_lower.len()];
            if window
                .iter()
                .zip(needle_lower.iter())
                .all(|(a, b)| a.to_ascii_lowercase() == *b)
                && (i == 0 || is_word_boundary(bytes, i - 1))
                && is_word_boundary(bytes, i + needle_lower.len())
            {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

/// Normalise backtick (`` `x` ``) and bracket (`[x]`) identifiers to
/// double-quoted form, outside string literals and comments.
pub fn normalize_bracket_and_backtick_idents(sql: &str) -> String {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                let end = skip_string_literal(bytes, i);
                out.push_str(&sql[i..end]);
                i = end;
            }
            b'"' => {
                let end = skip_quoted_ident(bytes, i);
                out.push_str(&sql[i..end]);
                i = end;
            }
            b'-' | b'/' => {
                let end = skip_line_and_block_comments(bytes, i);
                if end != i {
                    out.push_str(&sql[i..end]);
                    i = end;
                } else {
                    out.push(bytes[i] as char);
                    i += 1;
                }
            }
            b'`' => {
                let end = skip_quoted_of(bytes, i, b'`');
                out.push('"');
                out.push_str(&sql[i + 1..end.saturating_sub(1)]);
                out.push('"');
                i = end;
            }
            b'[' => {
                if let Some(close) = find_bracket_ident_end(bytes, i) {
                    out.push('"');
                    out.push_str(&sql[i + 1..close]);
                    out.push('"');
                    i = close + 1;
                } else {
                    out.push('[');
                    i += 1;
                }
            }
            b => {
                out.push(b as char);
                i += 1;
            }
        }
    }
    out
}

fn find_bracket_ident_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut i = open + 1;
    while i < bytes.len() {
        if bytes[i] == b']' {
            return Some(i);
        }
        if bytes[i] == b'[' {
            return None;
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_string_literal_with_escape() {
        let s = b"'it''s' rest";
        assert_eq!(skip_string_literal(s, 0), 7);
    }

    #[test]
    fn finds_matching_paren_across_nesting_and_strings() {
        let s = b"(a, f(b, ')'), c)";
        assert_eq!(find_matching_paren(s, 0), Some(s.len() - 1));
    }

    #[test]
    fn case_insensitive_match_skips_literals() {
        let sql = "SELECT 'iif(x)' FROM t WHERE iif(a,b,c)";
        let pos = case_insensitive_substring(sql, "iif", 0).unwrap();
        assert!(sql[pos..].starts_with("iif(a"));
    }

    #[test]
    fn normalizes_backtick_and_bracket_idents() {
        let sql = "SELECT `a`, [b] FROM `t`";
        assert_eq!(
            normalize_bracket_and_backtick_idents(sql),
            "SELECT \"a\", \"b\" FROM \"t\""
        );
    }
}
