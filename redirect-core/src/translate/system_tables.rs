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

//! Stage 12: system-table rewrite (§4.2 item 12).
//!
//! `sqlite_master` (and its read-only alias `sqlite_schema`) is replaced by
//! a UNION ALL view synthesized over `information_schema.tables` and the
//! remote server's index catalog, matching the `(type, name, tbl_name,
//! rootpage, sql)` shape callers expect. `ORDER BY rowid` has no remote
//! counterpart (rowid is not exposed by the synthesized view) and is
//! dropped.

use crate::lexer::case_insensitive_substring;

const SCHEMA_CATALOG_VIEW: &str = "(SELECT 'table' AS type, table_name AS name, table_name AS tbl_name, 0 AS rootpage, '' AS sql FROM information_schema.tables WHERE table_schema = current_schema() UNION ALL SELECT 'index' AS type, indexname AS name, tablename AS tbl_name, 0 AS rootpage, indexdef AS sql FROM pg_indexes WHERE schemaname = current_schema())";

pub fn apply_system_table_rewrite(sql: &str) -> String {
    let mut s = replace_identifier(sql, "sqlite_master", SCHEMA_CATALOG_VIEW);
    s = replace_identifier(&s, "sqlite_schema", SCHEMA_CATALOG_VIEW);
    s = remove_order_by_rowid(&s);
    s
}

fn replace_identifier(sql: &str, name: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut pos = 0usize;
    loop {
        match case_insensitive_substring(sql, name, pos) {
            Some(idx) => {
                out.push_str(&sql[pos..idx]);
                out.push_str(replacement);
                pos = idx + name.len();
            }
            None => {
                out.push_str(&sql[pos..]);
                break;
            }
        }
    }
    out
}

fn remove_order_by_rowid(sql: &str) -> String {
    if let Some(idx) = case_insensitive_substring(sql, "ORDER BY rowid", 0) {
        let before = sql[..idx].trim_end();
        let after = &sql[idx + "ORDER BY rowid".len()..];
        return format!("{before}{after}");
    }
    sql.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_master_becomes_catalog_union() {
        let out = apply_system_table_rewrite("SELECT name FROM sqlite_master WHERE type = 'table'");
        assert!(out.contains("information_schema.tables"));
        assert!(out.contains("pg_indexes"));
    }

    #[test]
    fn order_by_rowid_is_removed() {
        assert_eq!(
            apply_system_table_rewrite("SELECT * FROM t ORDER BY rowid"),
            "SELECT * FROM t"
        );
    }
}
