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

//! Stage 2: placeholder normalisation (§4.2).
//!
//! `?` and `:name` become `$1`, `$2`, …; a `:name` repeated in the same
//! statement maps to the same position. Occurrences inside string literals
//! are left untouched. Produces the parameter-name vector: `Some(name)` for
//! a named parameter, `None` for a positional `?`.

use crate::lexer::{skip_line_and_block_comments, skip_quoted_ident, skip_string_literal};

pub struct PlaceholderOutput {
    pub sql: String,
    pub param_names: Vec<Option<String>>,
}

pub fn normalize_placeholders(sql: &str) -> PlaceholderOutput {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len() + 8);
    let mut param_names: Vec<Option<String>> = Vec::new();
    let mut named_positions: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
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
            b'?' => {
                param_names.push(None);
                out.push('$');
                out.push_str(&param_names.len().to_string());
                i += 1;
            }
            b':' if is_named_param_start(bytes, i) => {
                let name_start = i + 1;
                let mut j = name_start;
                while j < bytes.len() && is_ident_byte(bytes[j]) {
                    j += 1;
                }
                let name = sql[name_start..j].to_string();
                let pos = *named_positions.entry(name.clone()).or_insert_with(|| {
                    param_names.push(Some(name.clone()));
                    param_names.len()
                });
                out.push('$');
                out.push_str(&pos.to_string());
                i = j;
            }
            b => {
                out.push(b as char);
                i += 1;
            }
        }
    }

    PlaceholderOutput {
        sql: out,
        param_names,
    }
}

fn is_named_param_start(bytes: &[u8], colon_idx: usize) -> bool {
    // `::` is a cast operator in the remote dialect, not a parameter marker.
    if bytes.get(colon_idx + 1) == Some(&b':') {
        return false;
    }
    matches!(bytes.get(colon_idx + 1), Some(b) if b.is_ascii_alphabetic() || *b == b'_')
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_placeholders_become_sequential_dollar_params() {
        let out = normalize_placeholders("SELECT * FROM t WHERE a = ? AND b = ?");
        assert_eq!(out.sql, "SELECT * FROM t WHERE a = $1 AND b = $2");
        assert_eq!(out.param_names, vec![None, None]);
    }

    #[test]
    fn repeated_named_parameter_reuses_position() {
        let out = normalize_placeholders("WHERE id = :id OR parent_id = :id");
        assert_eq!(out.sql, "WHERE id = $1 OR parent_id = $1");
        assert_eq!(out.param_names, vec![Some("id".to_string())]);
    }

    #[test]
    fn ignores_placeholders_inside_string_literals() {
        let out = normalize_placeholders("SELECT '?' , :name FROM t");
        assert_eq!(out.sql, "SELECT '?' , $1 FROM t");
        assert_eq!(out.param_names, vec![Some("name".to_string())]);
    }

    #[test]
    fn named_and_positional_share_the_ordering_sequence() {
        let out = normalize_placeholders("SELECT :id, :q FROM metadata_items WHERE id = :id AND title LIKE :q");
        assert_eq!(out.param_names, vec![Some("id".to_string()), Some("q".to_string())]);
        assert!(out.sql.contains("$1") && out.sql.contains("$2"));
    }
}
