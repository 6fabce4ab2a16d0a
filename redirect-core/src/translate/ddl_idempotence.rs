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

//! Stage 8: DDL idempotence (§4.2 item 8).
//!
//! The embedded engine accepts `CREATE TABLE`/`CREATE INDEX` without
//! `IF NOT EXISTS` and silently no-ops on a redefinition within the same
//! connection; the remote server does not, so every DDL statement the
//! shim forwards needs the guard inserted if it is missing. `ALTER TABLE
//! ... ADD COLUMN` gets the analogous `IF NOT EXISTS` on the column itself.

use crate::lexer::case_insensitive_substring;

pub fn apply_ddl_idempotence(sql: &str) -> String {
    let mut s = insert_if_not_exists_after(sql, "CREATE TABLE");
    s = insert_if_not_exists_after(&s, "CREATE INDEX");
    s = insert_if_not_exists_after(&s, "CREATE UNIQUE INDEX");
    s = insert_if_not_exists_for_add_column(&s);
    s
}

fn insert_if_not_exists_after(sql: &str, keyword: &str) -> String {
    let Some(idx) = case_insensitive_substring(sql, keyword, 0) else {
        return sql.to_string();
    };
    let after = idx + keyword.len();
    if sql[after..].trim_start().to_ascii_uppercase().starts_with("IF NOT EXISTS") {
        return sql.to_string();
    }
    format!("{} IF NOT EXISTS{}", &sql[..after], &sql[after..])
}

fn insert_if_not_exists_for_add_column(sql: &str) -> String {
    let Some(idx) = case_insensitive_substring(sql, "ADD COLUMN", 0) else {
        return sql.to_string();
    };
    if case_insensitive_substring(sql, "IF NOT EXISTS", idx).is_some() {
        return sql.to_string();
    }
    let after = idx + "ADD COLUMN".len();
    format!("{} IF NOT EXISTS{}", &sql[..after], &sql[after..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_table_gets_if_not_exists() {
        assert_eq!(
            apply_ddl_idempotence("CREATE TABLE t (id INTEGER)"),
            "CREATE TABLE IF NOT EXISTS t (id INTEGER)"
        );
    }

    #[test]
    fn existing_if_not_exists_is_left_alone() {
        let sql = "CREATE TABLE IF NOT EXISTS t (id INTEGER)";
        assert_eq!(apply_ddl_idempotence(sql), sql);
    }

    #[test]
    fn add_column_gets_if_not_exists() {
        assert_eq!(
            apply_ddl_idempotence("ALTER TABLE t ADD COLUMN age INTEGER"),
            "ALTER TABLE t ADD COLUMN IF NOT EXISTS age INTEGER"
        );
    }
}
