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

//! Stage 9: empty-set and grouping fixups (§4.2 item 9).

use crate::lexer::case_insensitive_substring;

pub fn apply_fixups(sql: &str) -> String {
    let mut s = rewrite_empty_in_list(sql);
    s = remove_group_by_null(&s);
    s
}

/// `col IN ()` has no equivalent in the remote dialect's grammar (an empty
/// parenthesized list is a syntax error); replace with a tautologically
/// empty subselect.
fn rewrite_empty_in_list(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut pos = 0usize;
    loop {
        match case_insensitive_substring(sql, "IN", pos) {
            Some(idx) => {
                let after = idx + "IN".len();
                let tail = sql[after..].trim_start();
                let skipped = sql[after..].len() - tail.len();
                if let Some(rest) = tail.strip_prefix('(') {
                    let rest_trimmed = rest.trim_start();
                    if let Some(close_rest) = rest_trimmed.strip_prefix(')') {
                        let _ = close_rest;
                        out.push_str(&sql[pos..after + skipped]);
                        out.push_str("(SELECT -1 WHERE FALSE)");
                        let consumed = rest.len() - rest_trimmed.len() + 1;
                        pos = after + skipped + 1 + consumed;
                        continue;
                    }
                }
                out.push_str(&sql[pos..after]);
                pos = after;
            }
            None => {
                out.push_str(&sql[pos..]);
                break;
            }
        }
    }
    out
}

fn remove_group_by_null(sql: &str) -> String {
    if let Some(idx) = case_insensitive_substring(sql, "GROUP BY NULL", 0) {
        let before = sql[..idx].trim_end();
        let after = &sql[idx + "GROUP BY NULL".len()..];
        return format!("{before}{after}");
    }
    sql.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_in_list_becomes_tautologically_empty_subselect() {
        assert_eq!(
            apply_fixups("SELECT * FROM t WHERE id IN ()"),
            "SELECT * FROM t WHERE id IN (SELECT -1 WHERE FALSE)"
        );
    }

    #[test]
    fn non_empty_in_list_is_untouched() {
        let sql = "SELECT * FROM t WHERE id IN (1, 2, 3)";
        assert_eq!(apply_fixups(sql), sql);
    }

    #[test]
    fn group_by_null_is_removed() {
        assert_eq!(
            apply_fixups("SELECT count(*) FROM t GROUP BY NULL"),
            "SELECT count(*) FROM t"
        );
    }
}
