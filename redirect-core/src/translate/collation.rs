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

//! Stage 13: collation strip (§4.2 item 13).
//!
//! Any `COLLATE <name>` clause other than `NOCASE` (already rewritten by
//! stage 5 into `ILIKE`) names a collation the remote server does not have
//! installed under that name (ICU collations, custom embedded-engine
//! collations). Rather than fail the statement, the clause is stripped and
//! the comparison falls back to the remote server's default collation.

use crate::lexer::case_insensitive_substring;

pub fn apply_collation_strip(sql: &str) -> String {
    let mut out = sql.to_string();
    let mut from = 0usize;
    loop {
        let Some(idx) = case_insensitive_substring(&out, "COLLATE", from) else {
            return out;
        };
        let after = idx + "COLLATE".len();
        let tail = out[after..].trim_start();
        let skipped = out[after..].len() - tail.len();
        let name_end = tail
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(tail.len());
        let name = &tail[..name_end];
        let clause_end = after + skipped + name_end;

        if name.eq_ignore_ascii_case("NOCASE") {
            // Already handled by the keyword-rewrite stage; if it somehow
            // survives this stage leaves it alone rather than guessing.
            from = clause_end;
            continue;
        }

        let mut rebuilt = String::with_capacity(out.len());
        rebuilt.push_str(out[..idx].trim_end());
        rebuilt.push_str(&out[clause_end..]);
        out = rebuilt;
        from = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icu_collation_is_stripped() {
        assert_eq!(
            apply_collation_strip("name COLLATE icu_en_US"),
            "name"
        );
    }

    #[test]
    fn custom_collation_is_stripped() {
        assert_eq!(
            apply_collation_strip("SELECT a FROM t ORDER BY a COLLATE binary"),
            "SELECT a FROM t ORDER BY a"
        );
    }
}
