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

//! Stage 4: type rewrites (§4.2 item 4). Applied only inside DDL statements.

use crate::lexer::case_insensitive_substring;

/// `dt_integer(n)` -> a fixed-width integer type. `n` in bytes.
fn dt_integer_type(n: i64) -> &'static str {
    match n {
        1 | 2 => "smallint",
        3 | 4 => "integer",
        _ => "bigint",
    }
}

pub fn apply_type_rewrites(ddl_sql: &str) -> String {
    let mut s = replace_keyword(ddl_sql, "AUTOINCREMENT", "SERIAL");
    s = replace_keyword(&s, "BLOB", "BYTEA");
    s = rewrite_dt_integer(&s);
    s
}

fn replace_keyword(sql: &str, from: &str, to: &str) -> String {
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

fn rewrite_dt_integer(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut pos = 0usize;
    loop {
        match case_insensitive_substring(sql, "dt_integer", pos) {
            Some(idx) => {
                out.push_str(&sql[pos..idx]);
                let rest = &sql[idx + "dt_integer".len()..];
                if let Some(open_rel) = rest.find('(') {
                    if open_rel == 0 {
                        if let Some(close_rel) = rest.find(')') {
                            let arg = rest[1..close_rel].trim();
                            if let Ok(n) = arg.parse::<i64>() {
                                out.push_str(dt_integer_type(n));
                                pos = idx + "dt_integer".len() + close_rel + 1;
                                continue;
                            }
                        }
                    }
                }
                out.push_str("dt_integer");
                pos = idx + "dt_integer".len();
            }
            None => {
                out.push_str(&sql[pos..]);
                break;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autoincrement_becomes_serial() {
        assert_eq!(
            apply_type_rewrites("id INTEGER PRIMARY KEY AUTOINCREMENT"),
            "id INTEGER PRIMARY KEY SERIAL"
        );
    }

    #[test]
    fn blob_becomes_bytea() {
        assert_eq!(apply_type_rewrites("data BLOB"), "data BYTEA");
    }

    #[test]
    fn dt_integer_maps_to_fixed_width() {
        assert_eq!(apply_type_rewrites("col dt_integer(8)"), "col bigint");
        assert_eq!(apply_type_rewrites("col dt_integer(2)"), "col smallint");
    }
}
