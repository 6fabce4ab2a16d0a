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

//! Stage 7: identifier quoting (§4.2 item 7).
//!
//! Bracket and backtick identifiers are normalised by [`crate::lexer`]
//! already; this stage additionally rewrites SQLite's `table.'column'`
//! single-quoted-as-identifier shorthand (legal after a `.`) into the
//! remote dialect's double-quoted form.

use crate::lexer::{skip_line_and_block_comments, skip_quoted_ident, skip_string_literal};

pub fn apply_quoting_rewrites(sql: &str) -> String {
    rewrite_dotted_single_quoted_idents(sql)
}

fn rewrite_dotted_single_quoted_idents(sql: &str) -> String {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let end = skip_quoted_ident(bytes, i);
                out.push_str(&sql[i..end]);
                i = end;
                continue;
            }
            b'-' | b'/' => {
                let end = skip_line_and_block_comments(bytes, i);
                if end != i {
                    out.push_str(&sql[i..end]);
                    i = end;
                    continue;
                }
            }
            b'\'' if i > 0 && bytes[i - 1] == b'.' => {
                let end = skip_string_literal(bytes, i);
                // end points past the closing quote; re-emit as "ident".
                let inner = &sql[i + 1..end.saturating_sub(1)];
                out.push('"');
                out.push_str(inner);
                out.push('"');
                i = end;
                continue;
            }
            b'\'' => {
                let end = skip_string_literal(bytes, i);
                out.push_str(&sql[i..end]);
                i = end;
                continue;
            }
            _ => {}
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_single_quoted_ident_becomes_double_quoted() {
        assert_eq!(
            apply_quoting_rewrites("SELECT t.'name' FROM t"),
            "SELECT t.\"name\" FROM t"
        );
    }

    #[test]
    fn ordinary_string_literal_is_untouched() {
        assert_eq!(
            apply_quoting_rewrites("SELECT 'hello' FROM t"),
            "SELECT 'hello' FROM t"
        );
    }
}
