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

//! The embedded-engine seam the core consumes for passthrough and DDL
//! shadow scans (§4.10, §4.12). A black box to the rest of the core;
//! `redirect-shadow` provides the concrete implementation over the
//! genuine embedded engine.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowHandle(pub u64);

#[derive(Debug, thiserror::Error)]
pub enum ShadowError {
    #[error("shadow engine failed to open {0}")]
    Open(String),
    #[error("shadow engine statement failed: {0}")]
    Exec(String),
}

pub trait ShadowEngine: Send {
    fn open(&mut self, path: &str) -> Result<ShadowHandle, ShadowError>;
    fn exec(&mut self, handle: ShadowHandle, sql: &str) -> Result<(), ShadowError>;
    fn close(&mut self, handle: ShadowHandle);
}

/// C12: fixed list of dialect-specific objects dropped at first attach
/// because they would error under the remote server's strict semantics
/// (ICU-backed indexes, FTS triggers).
pub const COMPATIBILITY_DROP_STATEMENTS: &[&str] = &[
    "DROP INDEX IF EXISTS index_title_sort_icu",
    "DROP INDEX IF EXISTS index_metadata_items_title_icu",
    "DROP TRIGGER IF EXISTS fts_metadata_items_insert",
    "DROP TRIGGER IF EXISTS fts_metadata_items_delete",
];

/// Runs the fixed C12 compatibility shim against `engine` for `handle`.
/// Each statement is independent; a failure on one does not prevent the
/// rest from running (the shim is best-effort cleanup, not a transaction).
pub fn apply_compatibility_shims(engine: &mut dyn ShadowEngine, handle: ShadowHandle) {
    for stmt in COMPATIBILITY_DROP_STATEMENTS {
        let _ = engine.exec(handle, stmt);
    }
}

/// A collation name is accepted-and-ignored when it looks
/// dialect-specific (§4.12: "names containing `icu`").
pub fn is_ignorable_collation(name: &str) -> bool {
    name.to_ascii_lowercase().contains("icu")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeShadow {
        next_id: u64,
        executed: HashMap<u64, Vec<String>>,
    }

    impl ShadowEngine for FakeShadow {
        fn open(&mut self, _path: &str) -> Result<ShadowHandle, ShadowError> {
            let id = self.next_id;
            self.next_id += 1;
            self.executed.insert(id, Vec::new());
            Ok(ShadowHandle(id))
        }

        fn exec(&mut self, handle: ShadowHandle, sql: &str) -> Result<(), ShadowError> {
            self.executed
                .get_mut(&handle.0)
                .ok_or_else(|| ShadowError::Exec("unknown handle".to_string()))?
                .push(sql.to_string());
            Ok(())
        }

        fn close(&mut self, handle: ShadowHandle) {
            self.executed.remove(&handle.0);
        }
    }

    #[test]
    fn compatibility_shims_run_every_statement() {
        let mut engine = FakeShadow::default();
        let handle = engine.open("/tmp/x.db").unwrap();
        apply_compatibility_shims(&mut engine, handle);
        assert_eq!(
            engine.executed.get(&handle.0).unwrap().len(),
            COMPATIBILITY_DROP_STATEMENTS.len()
        );
    }

    #[test]
    fn icu_collation_is_ignorable() {
        assert!(is_ignorable_collation("icu_en_US"));
        assert!(!is_ignorable_collation("binary"));
    }
}
