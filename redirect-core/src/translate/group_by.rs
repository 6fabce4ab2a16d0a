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

//! Stage 10: exhaustive GROUP BY (§4.2 item 10).
//!
//! The remote server rejects a SELECT list containing a non-aggregate,
//! non-constant column that is not named in GROUP BY. The embedded engine
//! allows it (taking an arbitrary row from each group), so every such
//! column must be enumerated into GROUP BY before the statement is sent
//! onward. This is the one rewrite stage the self-defense envelope treats
//! as stack-hungry (§4.9): it recurses through parenthesis nesting while
//! splitting the SELECT list.

use crate::lexer::{find_matching_paren, skip_string_literal};

const AGGREGATE_NAMES: &[&str] = &[
    "count",
    "sum",
    "avg",
    "min",
    "max",
    "total",
    "group_concat",
    "json_group_array",
    "json_group_object",
];

pub fn apply_exhaustive_group_by(sql: &str) -> String {
    let Some(group_by_idx) = find_keyword(sql, "GROUP BY") else {
        return sql.to_string();
    };
    let Some(select_idx) = find_keyword(sql, "SELECT") else {
        return sql.to_string();
    };
    let Some(from_idx) = find_keyword(&sql[select_idx..], "FROM").map(|o| o + select_idx) else {
        return sql.to_string();
    };
    if from_idx >= group_by_idx {
        return sql.to_string();
    }

    let select_list_start = select_idx + "SELECT".len();
    let select_list = &sql[select_list_start..from_idx];
    let select_list = select_list
        .trim_start()
        .strip_prefix("DISTINCT")
        .map(|rest| rest)
        .unwrap_or(select_list);

    let group_by_list_start = group_by_idx + "GROUP BY".len();
    let group_by_end = find_group_by_end(sql, group_by_list_start);
    let existing_list = &sql[group_by_list_start..group_by_end];

    let mut entries: Vec<String> = split_top_level(existing_list)
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let mut seen: Vec<String> = entries.iter().map(|e| normalize_key(e)).collect();

    for item in split_top_level(select_list) {
        let expr = strip_alias(item.trim());
        if expr.is_empty() || is_skippable(expr) {
            continue;
        }
        let key = normalize_key(expr);
        if !seen.contains(&key) {
            seen.push(key);
            entries.push(expr.to_string());
        }
    }

    let mut out = String::with_capacity(sql.len() + 32);
    out.push_str(&sql[..group_by_list_start]);
    out.push(' ');
    out.push_str(&entries.join(", "));
    out.push_str(&sql[group_by_end..]);
    out
}

fn find_keyword(sql: &str, keyword: &str) -> Option<usize> {
    crate::lexer::case_insensitive_substring(sql, keyword, 0)
}

fn find_group_by_end(sql: &str, start: usize) -> usize {
    for kw in ["HAVING", "ORDER BY", "LIMIT", "WINDOW"] {
        if let Some(idx) = crate::lexer::case_insensitive_substring(&sql[start..], kw, 0) {
            return start + idx;
        }
    }
    sql.len()
}

fn split_top_level(s: &str) -> Vec<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                i = skip_string_literal(bytes, i);
                continue;
            }
            b'(' => depth += 1,
            b')' => depth -= 1,
            b',' if depth == 0 => {
                out.push(s[start..i].to_string());
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    let tail = &s[start..];
    if !tail.trim().is_empty() {
        out.push(tail.to_string());
    }
    out
}

fn strip_alias(expr: &str) -> &str {
    if let Some(idx) = crate::lexer::case_insensitive_substring(expr, " AS ", 0) {
        return expr[..idx].trim();
    }
    // bare `expr alias` (no AS) — only strip when the tail is a single
    // identifier with no following punctuation, to avoid mangling
    // multi-word expressions.
    if let Some(last_space) = expr.trim_end().rfind(char::is_whitespace) {
        let head = &expr[..last_space];
        let tail = expr[last_space..].trim();
        if !head.trim().is_empty()
            && tail.chars().all(|c| c.is_alphanumeric() || c == '_')
            && !head.trim_end().ends_with(['(', ',', '.'])
            && find_matching_paren(head.as_bytes(), 0).is_none()
        {
            return head.trim();
        }
    }
    expr
}

fn is_skippable(expr: &str) -> bool {
    let trimmed = expr.trim_start();
    if trimmed.starts_with('(') {
        return true; // subquery or parenthesized expression
    }
    if trimmed.len() >= 4 && trimmed[..4].eq_ignore_ascii_case("CASE") {
        return true;
    }
    if let Some(first) = trimmed.as_bytes().first() {
        if first.is_ascii_digit() || *first == b'\'' || *first == b'-' {
            return true; // numeric / string literal constant
        }
    }
    let lower = trimmed.to_ascii_lowercase();
    AGGREGATE_NAMES
        .iter()
        .any(|name| lower.starts_with(name) && lower[name.len()..].trim_start().starts_with('('))
}

fn normalize_key(expr: &str) -> String {
    expr.trim().trim_matches('"').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumerates_non_aggregate_columns_in_order() {
        let sql = "SELECT metadata_items.id, metadata_items.title, count(distinct views.id) AS cnt FROM metadata_items JOIN views ON views.guid=metadata_items.guid GROUP BY metadata_items.guid";
        let out = apply_exhaustive_group_by(sql);
        assert!(out.contains(
            "GROUP BY metadata_items.guid, metadata_items.id, metadata_items.title"
        ));
        assert!(out.contains("count(distinct views.id) AS cnt"));
    }

    #[test]
    fn skips_literal_and_case_expressions() {
        let sql = "SELECT a, 1, CASE WHEN a > 0 THEN 1 ELSE 0 END, count(*) FROM t GROUP BY a";
        let out = apply_exhaustive_group_by(sql);
        assert!(out.contains("GROUP BY a"));
        assert!(!out.contains("GROUP BY a, 1"));
    }

    #[test]
    fn no_group_by_clause_is_untouched() {
        let sql = "SELECT a, b FROM t";
        assert_eq!(apply_exhaustive_group_by(sql), sql);
    }
}
