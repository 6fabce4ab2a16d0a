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

//! The SQL translation pipeline (C2): a fixed-order chain of source-to-source
//! rewrites from the embedded engine's dialect to the remote server's.

mod collation;
mod ddl_idempotence;
mod ddl_types;
mod fixups;
mod functions;
mod group_by;
mod keywords;
mod operator_spacing;
mod placeholders;
mod quoting;
mod schema_prefix;
mod system_tables;
mod upsert;

pub use upsert::{ConflictTarget, ConflictTargetLookup, StaticConflictTargets};

use crate::fingerprint::fingerprint;

/// Translation stages that are skipped under the soft stack-pressure
/// threshold (§4.9 item 2) because they recurse or allocate heavily.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackBudget {
    Full,
    SkipHeavyStages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementClass {
    Write,
    Read,
    Ddl,
    DdlSuppressed,
    Passthrough,
}

#[derive(Debug, Clone)]
pub struct Translation {
    pub sql: String,
    pub param_names: Vec<Option<String>>,
    pub param_count: usize,
    pub fingerprint: u64,
    pub class: StatementClass,
    pub succeeded: bool,
}

/// DIALECT-SPECIFIC statement-class keywords used to pick which stages apply
/// and to fill in `StatementClass` before the statement object takes over.
fn classify(original_sql: &str) -> StatementClass {
    let trimmed = original_sql.trim_start();
    let upper_head: String = trimmed.chars().take(16).collect::<String>().to_ascii_uppercase();
    if upper_head.starts_with("SELECT") || upper_head.starts_with("WITH") {
        StatementClass::Read
    } else if upper_head.starts_with("INSERT")
        || upper_head.starts_with("UPDATE")
        || upper_head.starts_with("DELETE")
        || upper_head.starts_with("REPLACE")
    {
        StatementClass::Write
    } else if upper_head.starts_with("CREATE") || upper_head.starts_with("DROP") || upper_head.starts_with("ALTER") {
        StatementClass::Ddl
    } else if upper_head.starts_with("PRAGMA")
        || upper_head.starts_with("ATTACH")
        || upper_head.starts_with("DETACH")
        || upper_head.starts_with("VACUUM")
        || upper_head.starts_with("ANALYZE")
        || upper_head.starts_with("REINDEX")
    {
        StatementClass::DdlSuppressed
    } else {
        StatementClass::Passthrough
    }
}

/// Runs the fixed 13-stage pipeline over `sql`. `schema` and `table_whitelist`
/// feed stage 1; `conflict_targets` feeds stage 6. Never panics: a stage
/// that cannot make progress leaves its input unchanged (§4.2 "Failure
/// semantics").
pub fn translate(
    original_sql: &str,
    schema: &str,
    table_whitelist: &[String],
    conflict_targets: &dyn ConflictTargetLookup,
    budget: StackBudget,
) -> Translation {
    let class = classify(original_sql);
    if matches!(class, StatementClass::DdlSuppressed | StatementClass::Passthrough) {
        return Translation {
            sql: original_sql.to_string(),
            param_names: Vec::new(),
            param_count: 0,
            fingerprint: fingerprint(original_sql),
            class,
            succeeded: true,
        };
    }

    let fp = fingerprint(original_sql);
    let mut s = schema_prefix::apply_schema_prefix(original_sql, schema, table_whitelist);

    let placeholder_out = placeholders::normalize_placeholders(&s);
    s = placeholder_out.sql;
    let param_names = placeholder_out.param_names;
    let param_count = param_names.len();

    s = functions::apply_function_rewrites(&s);

    if matches!(class, StatementClass::Ddl) {
        s = ddl_types::apply_type_rewrites(&s);
    }

    s = keywords::apply_keyword_rewrites(&s);

    if matches!(class, StatementClass::Write) {
        if let Some(upserted) = upsert::synthesize_upsert(&s, conflict_targets) {
            s = upserted;
        }
    }

    s = quoting::apply_quoting_rewrites(&s);

    if matches!(class, StatementClass::Ddl) {
        s = ddl_idempotence::apply_ddl_idempotence(&s);
    }

    s = fixups::apply_fixups(&s);

    if matches!(budget, StackBudget::Full) && matches!(class, StatementClass::Read) {
        s = group_by::apply_exhaustive_group_by(&s);
    }

    s = operator_spacing::apply_operator_spacing(&s);
    s = system_tables::apply_system_table_rewrite(&s);
    s = collation::apply_collation_strip(&s);

    Translation {
        sql: s,
        param_names,
        param_count,
        fingerprint: fp,
        class,
        succeeded: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoTargets;
    impl ConflictTargetLookup for NoTargets {
        fn lookup(&self, _table: &str) -> Option<ConflictTarget> {
            None
        }
    }

    #[test]
    fn end_to_end_scenario_one_placeholder_and_rewrite() {
        let sql = "SELECT iif(rating > 5, 'good', 'bad') FROM metadata_items WHERE id = :id AND title LIKE :q COLLATE NOCASE";
        let out = translate(sql, "plex", &[], &NoTargets, StackBudget::Full);
        assert!(out.sql.contains("CASE WHEN rating > 5 THEN 'good' ELSE 'bad' END"));
        assert!(out.sql.contains("$1"));
        assert!(out.sql.contains("$2"));
        assert!(out.sql.contains("ILIKE"));
        assert!(!out.sql.contains("COLLATE NOCASE"));
        assert_eq!(
            out.param_names,
            vec![Some("id".to_string()), Some("q".to_string())]
        );
    }

    #[test]
    fn end_to_end_scenario_three_upsert_synthesis() {
        struct TagsTargets;
        impl ConflictTargetLookup for TagsTargets {
            fn lookup(&self, table: &str) -> Option<ConflictTarget> {
                if table.eq_ignore_ascii_case("tags") {
                    Some(ConflictTarget {
                        columns: vec!["id".to_string()],
                        has_id_column: true,
                    })
                } else {
                    None
                }
            }
        }
        let sql = "INSERT OR REPLACE INTO tags (id, tag, tag_type) VALUES (1, 'Action', 0)";
        let out = translate(sql, "plex", &[], &TagsTargets, StackBudget::Full);
        assert!(out.sql.contains("INSERT INTO tags"));
        assert!(out.sql.contains("ON CONFLICT (id) DO UPDATE SET tag = EXCLUDED.tag, tag_type = EXCLUDED.tag_type"));
        assert!(out.sql.contains("RETURNING id"));
    }

    #[test]
    fn end_to_end_scenario_four_empty_in_set() {
        let sql = "SELECT x FROM t WHERE id IN ()";
        let out = translate(sql, "plex", &[], &NoTargets, StackBudget::Full);
        assert!(out.sql.contains("IN (SELECT -1 WHERE FALSE)"));
    }

    #[test]
    fn translation_is_idempotent() {
        let sql = "SELECT iif(rating > 5, 'good', 'bad') FROM metadata_items WHERE id = :id";
        let once = translate(sql, "plex", &[], &NoTargets, StackBudget::Full);
        let twice = translate(&once.sql, "plex", &[], &NoTargets, StackBudget::Full);
        assert_eq!(once.sql, twice.sql);
    }

    #[test]
    fn ddl_suppressed_statement_passes_through_unchanged() {
        let sql = "PRAGMA journal_mode=WAL";
        let out = translate(sql, "plex", &[], &NoTargets, StackBudget::Full);
        assert_eq!(out.sql, sql);
        assert_eq!(out.class, StatementClass::DdlSuppressed);
    }
}
