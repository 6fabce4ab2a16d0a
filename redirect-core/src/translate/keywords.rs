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

//! Stage 5: keyword rewrites (§4.2 item 5).

use crate::lexer::case_insensitive_substring;

pub fn apply_keyword_rewrites(sql: &str) -> String {
    let mut s = sql.to_string();
    s = rewrite_begin_transaction_modes(&s);
    s = replace_case_insensitive(&s, "GLOB", "LIKE");
    s = rewrite_collate_nocase(&s);
    s = rewrite_where_boolean_literal(&s);
    s = remove_limit_negative_one(&s);
    s = rewrite_insert_or_ignore(&s);
    s
}

fn replace_case_insensitive(sql: &str, from: &str, to: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut pos = 0usize;
    loop {
        match case_insensitive_substring(sql, from, pos) {
            Some(idx) => {
                out.push_str(&sql[pos..idx]);
                out.push_str(to);
                pos = idx + from.len();
            }
            None => {
                out.push_str(&sql[pos..]);
                break;
            }
        }
    }
    out
}

fn rewrite_begin_transaction_modes(sql: &str) -> String {
    let mut s = sql.to_string();
    for mode in ["IMMEDIATE", "DEFERRED", "EXCLUSIVE"] {
        if let Some(begin_idx) = case_insensitive_substring(&s, "BEGIN", 0) {
            let after_begin = begin_idx + "BEGIN".len();
            let tail = s[after_begin..].trim_start();
            let skipped = s[after_begin..].len() - tail.len();
            if tail.to_ascii_uppercase().starts_with(mode) {
                let mode_end = after_begin + skipped + mode.len();
                s = format!("{}{}", &s[..begin_idx + "BEGIN".len()], &s[mode_end..]);
            }
        }
    }
    s
}

/// `COLLATE NOCASE` becomes `ILIKE` on the nearest preceding `LIKE` in the
/// same statement; otherwise it is stripped (the comparison falls back to
/// case-sensitive equality, which is the conservative choice when no LIKE
/// anchor is found).
fn rewrite_collate_nocase(sql: &str) -> String {
    let mut out = sql.to_string();
    loop {
        let Some(collate_idx) = case_insensitive_substring(&out, "COLLATE NOCASE", 0) else {
            return out;
        };
        let prefix = &out[..collate_idx];
        if let Some(like_idx) = rfind_case_insensitive_word(prefix, "LIKE") {
            let mut rebuilt = String::with_capacity(out.len());
            rebuilt.push_str(&out[..like_idx]);
            rebuilt.push_str("ILIKE");
            rebuilt.push_str(&out[like_idx + "LIKE".len()..collate_idx]);
            let after = collate_idx + "COLLATE NOCASE".len();
            rebuilt.push_str(strip_leading_space(&out[after..]));
            out = rebuilt;
        } else {
            let after = collate_idx + "COLLATE NOCASE".len();
            let mut rebuilt = String::with_capacity(out.len());
            rebuilt.push_str(out[..collate_idx].trim_end());
            rebuilt.push_str(strip_leading_space(&out[after..]));
            out = rebuilt;
        }
    }
}

fn strip_leading_space(s: &str) -> &str {
    s.strip_prefix(' ').unwrap_or(s)
}

fn rfind_case_insensitive_word(haystack: &str, word: &str) -> Option<usize> {
    let mut last = None;
    let mut from = 0;
    while let Some(idx) = case_insensitive_substring(haystack, word, from) {
        last = Some(idx);
        from = idx + word.len();
    }
    last
}

fn rewrite_where_boolean_literal(sql: &str) -> String {
    let mut s = sql.to_string();
    if let Some(idx) = case_insensitive_substring(&s, "WHERE", 0) {
        let after = idx + "WHERE".len();
        let tail = s[after..].trim_start();
        let skipped = s[after..].len() - tail.len();
        if let Some(rest) = tail.strip_prefix('0') {
            if rest.is_empty() || !rest.as_bytes()[0].is_ascii_digit() {
                s = format!("{}{}{}", &s[..after + skipped], "FALSE", rest);
            }
        } else if let Some(rest) = tail.strip_prefix('1') {
            if rest.is_empty() || !rest.as_bytes()[0].is_ascii_digit() {
                s = format!("{}{}{}", &s[..after + skipped], "TRUE", rest);
            }
        }
    }
    s
}

fn remove_limit_negative_one(sql: &str) -> String {
    if let Some(idx) = case_insensitive_substring(sql, "LIMIT", 0) {
        let after = idx + "LIMIT".len();
        let tail = sql[after..].trim_start();
        if let Some(rest) = tail.strip_prefix("-1") {
            return format!("{}{}", sql[..idx].trim_end(), rest);
        }
    }
    sql.to_string()
}

fn rewrite_insert_or_ignore(sql: &str) -> String {
    if let Some(idx) = case_insensitive_substring(sql, "INSERT OR IGNORE", 0) {
        let before = &sql[..idx];
        let after = &sql[idx + "INSERT OR IGNORE".len()..];
        // ON CONFLICT DO NOTHING is appended by the statement classifier
        // (C6) once the target table/columns are known; here we only
        // normalise the keyword to plain INSERT.
        return format!("{before}INSERT{after}");
    }
    sql.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_immediate_becomes_begin() {
        assert_eq!(apply_keyword_rewrites("BEGIN IMMEDIATE"), "BEGIN");
    }

    #[test]
    fn glob_becomes_like() {
        assert_eq!(apply_keyword_rewrites("a GLOB 'x*'"), "a LIKE 'x*'");
    }

    #[test]
    fn collate_nocase_after_like_becomes_ilike() {
        assert_eq!(
            apply_keyword_rewrites("title LIKE :q COLLATE NOCASE"),
            "title ILIKE :q"
        );
    }

    #[test]
    fn where_zero_becomes_false() {
        assert_eq!(apply_keyword_rewrites("WHERE 0"), "WHERE FALSE");
    }

    #[test]
    fn where_one_becomes_true() {
        assert_eq!(apply_keyword_rewrites("WHERE 1"), "WHERE TRUE");
    }

    #[test]
    fn limit_negative_one_is_removed() {
        assert_eq!(
            apply_keyword_rewrites("SELECT * FROM t LIMIT -1"),
            "SELECT * FROM t"
        );
    }

    #[test]
    fn insert_or_ignore_drops_or_ignore() {
        assert_eq!(
            apply_keyword_rewrites("INSERT OR IGNORE INTO t VALUES (1)"),
            "INSERT INTO t VALUES (1)"
        );
    }
}
