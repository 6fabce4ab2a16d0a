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

//! Stage 3: function rewrites (§4.2 item 3).
//!
//! All case-insensitive, argument-depth tracked: each rewrite locates a
//! `name(` at a word boundary (never inside a string literal or comment),
//! finds the matching close-paren, splits the argument list on top-level
//! commas, and substitutes a remote-dialect equivalent.

use crate::lexer::{find_matching_paren, is_word_boundary, skip_line_and_block_comments, skip_string_literal};

/// Split `args` (the text strictly between a call's parens) on top-level
/// commas, skipping nested parens and string literals.
fn split_top_level_args(args: &str) -> Vec<String> {
    let bytes = args.as_bytes();
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
                out.push(args[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    let tail = args[start..].trim();
    if !tail.is_empty() || !out.is_empty() {
        out.push(tail.to_string());
    }
    out
}

/// Scan `sql` for calls to `name` and replace each with `rewrite(args)`,
/// where `args` are the top-level-split argument texts. A call whose
/// rewrite closure returns `None` is left untouched.
fn rewrite_calls(sql: &str, name: &str, rewrite: impl Fn(&[String]) -> Option<String>) -> String {
    let bytes = sql.as_bytes();
    let name_lower = name.to_ascii_lowercase();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                let end = skip_string_literal(bytes, i);
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

        if matches_call_name(bytes, i, &name_lower) {
            let paren = i + name_lower.len();
            if let Some(close) = find_matching_paren(bytes, paren) {
                let args_text = &sql[paren + 1..close];
                let args = split_top_level_args(args_text);
                if let Some(replacement) = rewrite(&args) {
                    out.push_str(&replacement);
                    i = close + 1;
                    continue;
                }
            }
        }

        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

fn matches_call_name(bytes: &[u8], i: usize, name_lower: &str) -> bool {
    let nb = name_lower.as_bytes();
    if i + nb.len() >= bytes.len() {
        return false;
    }
    if !(i == 0 || is_word_boundary(bytes, i - 1)) {
        return false;
    }
    for (k, b) in nb.iter().enumerate() {
        if bytes[i + k].to_ascii_lowercase() != *b {
            return false;
        }
    }
    bytes[i + nb.len()] == b'('
}

pub fn apply_function_rewrites(sql: &str) -> String {
    let mut s = sql.to_string();

    s = rewrite_calls(&s, "iif", |args| {
        if args.len() == 3 {
            Some(format!(
                "CASE WHEN {} THEN {} ELSE {} END",
                args[0], args[1], args[2]
            ))
        } else {
            None
        }
    });

    s = rewrite_calls(&s, "typeof", |args| {
        args.first().map(|a| format!("pg_typeof({a})::text"))
    });
    s = rewrite_typeof_comparisons(&s);

    s = rewrite_calls(&s, "strftime", |args| {
        if args.len() >= 2 && args[0].trim_matches('\'') == "%s" {
            let source = rewrite_now_modifiers(&args[1], args.get(2).map(|s| s.as_str()));
            Some(format!("EXTRACT(EPOCH FROM {source})::bigint"))
        } else {
            None
        }
    });

    s = rewrite_calls(&s, "unixepoch", |args| {
        let base = args.first().cloned().unwrap_or_else(|| "'now'".to_string());
        let source = rewrite_now_modifiers(&base, args.get(1).map(|s| s.as_str()));
        Some(format!("EXTRACT(EPOCH FROM {source})::bigint"))
    });

    s = rewrite_calls(&s, "datetime", |args| {
        if args.len() == 1 && args[0].trim_matches('\'') == "now" {
            Some("NOW()".to_string())
        } else {
            None
        }
    });

    s = rewrite_calls(&s, "ifnull", |args| {
        if args.len() == 2 {
            Some(format!("COALESCE({}, {})", args[0], args[1]))
        } else {
            None
        }
    });

    s = rewrite_calls(&s, "substr", |args| match args.len() {
        2 => Some(format!("SUBSTRING({} FROM {})", args[0], args[1])),
        3 => Some(format!(
            "SUBSTRING({} FROM {} FOR {})",
            args[0], args[1], args[2]
        )),
        _ => None,
    });

    s = rewrite_calls(&s, "instr", |args| {
        if args.len() == 2 {
            Some(format!("POSITION({} IN {})", args[1], args[0]))
        } else {
            None
        }
    });

    s = rewrite_calls(&s, "last_insert_rowid", |args| {
        if args.is_empty() || (args.len() == 1 && args[0].is_empty()) {
            Some("lastval()".to_string())
        } else {
            None
        }
    });

    s = rewrite_calls(&s, "json_each", |args| {
        args.first()
            .map(|a| format!("json_array_elements({a}::json)"))
    });

    s
}

/// Postgres spreads a single SQLite type-name affinity across several of
/// its own `pg_typeof()` names (an `integer` column might come back
/// `smallint`, `integer`, or `bigint`, and a `0`/`1` SQLite "integer" is
/// often a genuine `boolean` column on the remote side). A bare `=`
/// against the SQLite name would silently stop matching once the bare
/// `pg_typeof(x)::text` substitution landed, so each SQLite type name
/// expands to the set of Postgres names that can stand for it.
const TYPE_EQUIVALENTS: &[(&str, &[&str])] = &[
    ("integer", &["smallint", "integer", "bigint", "boolean"]),
    ("real", &["real", "double precision", "numeric"]),
    ("text", &["text", "character varying", "character", "uuid"]),
    ("blob", &["bytea"]),
    ("null", &["unknown"]),
];

fn type_equivalents(sqlite_type: &str) -> &'static [&'static str] {
    TYPE_EQUIVALENTS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(sqlite_type))
        .map(|(_, equivs)| *equivs)
        .unwrap_or(&[])
}

#[derive(Clone, Copy)]
enum CompareOp {
    Eq,
    Ne,
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && (bytes[i] as char).is_whitespace() {
        i += 1;
    }
    i
}

fn match_operator(bytes: &[u8], i: usize) -> Option<(CompareOp, usize)> {
    if bytes[i..].starts_with(b"!=") || bytes[i..].starts_with(b"<>") {
        Some((CompareOp::Ne, i + 2))
    } else if bytes.get(i) == Some(&b'=') {
        Some((CompareOp::Eq, i + 1))
    } else {
        None
    }
}

/// If `sql[pos..]` (after skipping whitespace) is a comparison operator
/// followed by a quoted literal, returns the operator, the literal's text
/// (unquoted), and the index just past the closing quote.
fn match_comparison_literal(sql: &str, pos: usize) -> Option<(CompareOp, String, usize)> {
    let bytes = sql.as_bytes();
    let op_start = skip_ws(bytes, pos);
    let (op, after_op) = match_operator(bytes, op_start)?;
    let lit_start = skip_ws(bytes, after_op);
    if bytes.get(lit_start) != Some(&b'\'') {
        return None;
    }
    let end = skip_string_literal(bytes, lit_start);
    let literal = sql[lit_start + 1..end.saturating_sub(1)].to_string();
    Some((op, literal, end))
}

fn build_membership_expr(call_text: &str, op: CompareOp, literal: &str) -> String {
    let equivs = type_equivalents(literal);
    let values: Vec<String> = if equivs.is_empty() {
        vec![format!("'{literal}'")]
    } else {
        equivs.iter().map(|name| format!("'{name}'")).collect()
    };
    let array = values.join(", ");
    match op {
        CompareOp::Eq => format!("{call_text} = ANY(ARRAY[{array}])"),
        CompareOp::Ne => format!("{call_text} <> ALL(ARRAY[{array}])"),
    }
}

/// Rewrites `typeof(x) = '...'`/`'...' = typeof(x)` comparisons (already
/// expanded to `pg_typeof(x)::text` by the call above) into a membership
/// test against every Postgres type name the SQLite name could correspond
/// to (§4.2 item 3).
fn rewrite_typeof_comparisons(sql: &str) -> String {
    const MARKER: &str = "pg_typeof(";
    const SUFFIX: &str = "::text";
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0usize;
    while i < bytes.len() {
        if matches!(bytes[i], b'-' | b'/') {
            let end = skip_line_and_block_comments(bytes, i);
            if end != i {
                out.push_str(&sql[i..end]);
                i = end;
                continue;
            }
        }

        if sql[i..].starts_with(MARKER) {
            if let Some(close) = find_matching_paren(bytes, i + MARKER.len() - 1) {
                let after_call = close + 1;
                if sql[after_call..].starts_with(SUFFIX) {
                    let after_suffix = after_call + SUFFIX.len();
                    if let Some((op, literal, end)) = match_comparison_literal(sql, after_suffix) {
                        let call_text = &sql[i..after_suffix];
                        out.push_str(&build_membership_expr(call_text, op, &literal));
                        i = end;
                        continue;
                    }
                }
            }
        }

        if bytes[i] == b'\'' {
            let lit_end = skip_string_literal(bytes, i);
            let op_start = skip_ws(bytes, lit_end);
            if let Some((op, after_op)) = match_operator(bytes, op_start) {
                let call_start = skip_ws(bytes, after_op);
                if sql[call_start..].starts_with(MARKER) {
                    if let Some(close) = find_matching_paren(bytes, call_start + MARKER.len() - 1) {
                        let after_call = close + 1;
                        if sql[after_call..].starts_with(SUFFIX) {
                            let after_suffix = after_call + SUFFIX.len();
                            let literal = sql[i + 1..lit_end.saturating_sub(1)].to_string();
                            let call_text = &sql[call_start..after_suffix];
                            out.push_str(&build_membership_expr(call_text, op, &literal));
                            i = after_suffix;
                            continue;
                        }
                    }
                }
            }
            out.push_str(&sql[i..lit_end]);
            i = lit_end;
            continue;
        }

        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

/// Translate `'now'` plus an optional SQLite relative modifier (`-N unit`,
/// `+N unit`) into `NOW()` plus `INTERVAL` arithmetic.
fn rewrite_now_modifiers(base: &str, modifier: Option<&str>) -> String {
    let base_expr = if base.trim_matches('\'') == "now" {
        "NOW()".to_string()
    } else {
        base.to_string()
    };
    match modifier {
        None => base_expr,
        Some(m) => {
            let m = m.trim().trim_matches('\'');
            let m = m.trim();
            if let Some(rest) = m.strip_prefix('-') {
                format!("{base_expr} - INTERVAL '{}'", rest.trim())
            } else if let Some(rest) = m.strip_prefix('+') {
                format!("{base_expr} + INTERVAL '{}'", rest.trim())
            } else {
                base_expr
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iif_becomes_case_when() {
        let out = apply_function_rewrites("SELECT iif(rating > 5, 'good', 'bad') FROM t");
        assert_eq!(
            out,
            "SELECT CASE WHEN rating > 5 THEN 'good' ELSE 'bad' END FROM t"
        );
    }

    #[test]
    fn typeof_casts_to_text() {
        assert_eq!(apply_function_rewrites("typeof(x)"), "pg_typeof(x)::text");
    }

    #[test]
    fn typeof_equality_expands_to_membership_test() {
        let out = apply_function_rewrites("WHERE typeof(rating) = 'integer'");
        assert_eq!(
            out,
            "WHERE pg_typeof(rating)::text = ANY(ARRAY['smallint', 'integer', 'bigint', 'boolean'])"
        );
    }

    #[test]
    fn typeof_inequality_expands_to_negated_membership_test() {
        let out = apply_function_rewrites("WHERE typeof(col) != 'blob'");
        assert_eq!(out, "WHERE pg_typeof(col)::text <> ALL(ARRAY['bytea'])");
    }

    #[test]
    fn literal_before_typeof_call_also_expands() {
        let out = apply_function_rewrites("WHERE 'text' = typeof(name)");
        assert_eq!(
            out,
            "WHERE pg_typeof(name)::text = ANY(ARRAY['text', 'character varying', 'character', 'uuid'])"
        );
    }

    #[test]
    fn strftime_epoch_with_relative_modifier() {
        let out = apply_function_rewrites("strftime('%s', 'now', '-7 days')");
        assert_eq!(out, "EXTRACT(EPOCH FROM NOW() - INTERVAL '7 days')::bigint");
    }

    #[test]
    fn datetime_now_becomes_now() {
        assert_eq!(apply_function_rewrites("datetime('now')"), "NOW()");
    }

    #[test]
    fn ifnull_becomes_coalesce() {
        assert_eq!(apply_function_rewrites("ifnull(a, b)"), "COALESCE(a, b)");
    }

    #[test]
    fn substr_three_arg_becomes_substring_from_for() {
        assert_eq!(
            apply_function_rewrites("substr(name, 1, 3)"),
            "SUBSTRING(name FROM 1 FOR 3)"
        );
    }

    #[test]
    fn instr_becomes_position() {
        assert_eq!(apply_function_rewrites("instr(a, b)"), "POSITION(b IN a)");
    }

    #[test]
    fn last_insert_rowid_becomes_lastval() {
        assert_eq!(apply_function_rewrites("last_insert_rowid()"), "lastval()");
    }

    #[test]
    fn json_each_becomes_json_array_elements() {
        assert_eq!(
            apply_function_rewrites("json_each(tags)"),
            "json_array_elements(tags::json)"
        );
    }

    #[test]
    fn does_not_match_inside_longer_identifier() {
        assert_eq!(apply_function_rewrites("my_instr_count"), "my_instr_count");
    }
}
