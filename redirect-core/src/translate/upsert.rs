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

//! Stage 6: UPSERT synthesis (§4.2 item 6).
//!
//! `INSERT OR REPLACE INTO table (cols...) VALUES (...)` has no direct
//! equivalent in the remote dialect: it becomes
//! `INSERT INTO table (cols...) VALUES (...) ON CONFLICT (<conflict target>)
//! DO UPDATE SET col = EXCLUDED.col, ... [RETURNING id]`.
//!
//! The conflict target for a table is not recoverable from the statement
//! text alone (SQLite resolves it from the table's declared PRIMARY KEY /
//! UNIQUE constraints at parse time); callers supply it via a small static
//! table built from the schema the shim observed at CREATE TABLE time.

use crate::lexer::case_insensitive_substring;

/// Per-table conflict-target knowledge needed to synthesize an UPSERT.
#[derive(Debug, Clone)]
pub struct ConflictTarget {
    pub columns: Vec<String>,
    /// Whether the table has an `id` column that should be returned on
    /// conflict (mirrors the table's own auto-generated primary key).
    pub has_id_column: bool,
}

pub trait ConflictTargetLookup {
    fn lookup(&self, table: &str) -> Option<ConflictTarget>;
}

pub struct StaticConflictTargets(pub Vec<(String, ConflictTarget)>);

impl ConflictTargetLookup for StaticConflictTargets {
    fn lookup(&self, table: &str) -> Option<ConflictTarget> {
        self.0
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(table))
            .map(|(_, target)| target.clone())
    }
}

/// Replace `INSERT OR REPLACE INTO table (cols) VALUES (...)` with the
/// synthesized `ON CONFLICT` form. Statements whose table is not found in
/// `targets`, or whose shape cannot be parsed confidently, are returned
/// unchanged — the caller's soft-fail counter is incremented by `translate::mod`.
pub fn synthesize_upsert(sql: &str, targets: &dyn ConflictTargetLookup) -> Option<String> {
    let idx = case_insensitive_substring(sql, "INSERT OR REPLACE INTO", 0)?;
    let after = idx + "INSERT OR REPLACE INTO".len();
    let rest = sql[after..].trim_start();
    let skipped = sql[after..].len() - rest.len();
    let table_start = after + skipped;

    let table_end = rest
        .find(|c: char| c.is_whitespace() || c == '(')
        .map(|o| table_start + o)?;
    let table = sql[table_start..table_end].trim_matches('"');
    let target = targets.lookup(table)?;

    let open_paren = sql[table_end..].find('(').map(|o| table_end + o)?;
    let close_paren = find_paren_end(sql.as_bytes(), open_paren)?;
    let column_list = &sql[open_paren + 1..close_paren];
    let columns: Vec<String> = column_list
        .split(',')
        .map(|c| c.trim().trim_matches('"').to_string())
        .collect();

    let update_assignments: Vec<String> = columns
        .iter()
        .filter(|c| !target.columns.iter().any(|k| k.eq_ignore_ascii_case(c)))
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect();

    let conflict_cols = target.columns.join(", ");
    let tail_after_values = &sql[close_paren + 1..];

    let mut out = String::with_capacity(sql.len() + 64);
    out.push_str(&sql[..idx]);
    out.push_str("INSERT INTO ");
    out.push_str(table);
    out.push_str(&sql[table_end..close_paren + 1]);
    out.push_str(tail_after_values);

    if update_assignments.is_empty() {
        out.push_str(&format!(" ON CONFLICT ({conflict_cols}) DO NOTHING"));
    } else {
        out.push_str(&format!(
            " ON CONFLICT ({conflict_cols}) DO UPDATE SET {}",
            update_assignments.join(", ")
        ));
    }

    if target.has_id_column && case_insensitive_substring(&out, "RETURNING", 0).is_none() {
        out.push_str(" RETURNING id");
    }

    Some(out)
}

fn find_paren_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            b'\'' => {
                i = crate::lexer::skip_string_literal(bytes, i);
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags_targets() -> StaticConflictTargets {
        StaticConflictTargets(vec![(
            "tags".to_string(),
            ConflictTarget {
                columns: vec!["id".to_string()],
                has_id_column: true,
            },
        )])
    }

    #[test]
    fn insert_or_replace_becomes_upsert_with_returning() {
        let sql = "INSERT OR REPLACE INTO tags (id, tag, tag_type) VALUES (1, 'Action', 0)";
        let out = synthesize_upsert(sql, &tags_targets()).unwrap();
        assert_eq!(
            out,
            "INSERT INTO tags (id, tag, tag_type) VALUES (1, 'Action', 0) ON CONFLICT (id) DO UPDATE SET tag = EXCLUDED.tag, tag_type = EXCLUDED.tag_type RETURNING id"
        );
    }

    #[test]
    fn unknown_table_is_left_for_soft_fallback() {
        let sql = "INSERT OR REPLACE INTO unknown_table (a) VALUES (1)";
        assert!(synthesize_upsert(sql, &tags_targets()).is_none());
    }

    #[test]
    fn all_columns_in_conflict_target_does_nothing() {
        let targets = StaticConflictTargets(vec![(
            "singleton".to_string(),
            ConflictTarget {
                columns: vec!["id".to_string()],
                has_id_column: false,
            },
        )]);
        let sql = "INSERT OR REPLACE INTO singleton (id) VALUES (1)";
        let out = synthesize_upsert(sql, &targets).unwrap();
        assert_eq!(
            out,
            "INSERT INTO singleton (id) VALUES (1) ON CONFLICT (id) DO NOTHING"
        );
    }
}
