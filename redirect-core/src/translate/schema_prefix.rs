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

//! Stage 1: schema prefix (§4.2 item 1).
//!
//! Bare references to a whitelisted table name are qualified with the
//! configured remote schema (`metadata_items` -> `plex.metadata_items`).
//! A name already schema-qualified, or one that is not on the whitelist,
//! is left untouched.

use crate::lexer::{is_word_boundary, skip_line_and_block_comments, skip_quoted_ident, skip_string_literal};

pub fn apply_schema_prefix(sql: &str, schema: &str, whitelist: &[String]) -> String {
    if whitelist.is_empty() {
        return sql.to_string();
    }
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len() + whitelist.len() * (schema.len() + 1));
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                let end = skip_string_literal(bytes, i);
                out.push_str(&sql[i..end]);
                i = end;
                continue;
            }
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
            _ => {}
        }

        if i == 0 || is_word_boundary(bytes, i - 1) {
            if let Some(matched) = match_whitelisted_table(bytes, i, whitelist) {
                let already_qualified = i > 0 && bytes[i - 1] == b'.';
                if !already_qualified {
                    out.push_str(schema);
                    out.push('.');
                }
                out.push_str(matched);
                i += matched.len();
                continue;
            }
        }

        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

fn match_whitelisted_table<'a>(bytes: &[u8], i: usize, whitelist: &'a [String]) -> Option<&'a str> {
    for name in whitelist {
        let nb = name.as_bytes();
        if i + nb.len() > bytes.len() {
            continue;
        }
        if bytes[i..i + nb.len()].eq_ignore_ascii_case(nb) && is_word_boundary(bytes, i + nb.len())
        {
            return Some(name.as_str());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_whitelisted_table_gets_schema_prefix() {
        let whitelist = vec!["metadata_items".to_string()];
        assert_eq!(
            apply_schema_prefix("SELECT * FROM metadata_items", "plex", &whitelist),
            "SELECT * FROM plex.metadata_items"
        );
    }

    #[test]
    fn already_qualified_table_is_untouched() {
        let whitelist = vec!["metadata_items".to_string()];
        assert_eq!(
            apply_schema_prefix("SELECT * FROM plex.metadata_items", "plex", &whitelist),
            "SELECT * FROM plex.metadata_items"
        );
    }

    #[test]
    fn table_not_on_whitelist_is_untouched() {
        let whitelist = vec!["metadata_items".to_string()];
        let sql = "SELECT * FROM some_other_table";
        assert_eq!(apply_schema_prefix(sql, "plex", &whitelist), sql);
    }
}
