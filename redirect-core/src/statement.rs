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

//! The statement object (C6). Owns a prepare/bind/step/column/reset/finalize
//! state machine over a translated SQL text, wiring together the translation
//! cache, the prepared-statement cache, the fake-value pool's decoders, and
//! the self-defense envelope that gates prepare calls.

use std::time::Instant;

use crate::cache::TRANSLATION_CACHE;
use crate::decode::{decode_float, decode_int, decode_type, RowCache};
use crate::defense::{stack_gate, GateDecision, RecursionGuard, LOOP_DETECTOR};
use crate::fingerprint::fingerprint;
use crate::session::{ParamFormat, RemoteSession, SessionError};
use crate::stmtcache::PreparedStatementCache;
use crate::translate::{translate, ConflictTargetLookup, StatementClass, Translation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    Created,
    Prepared,
    Bound,
    Executed,
    Finalized,
}

#[derive(Debug, thiserror::Error)]
pub enum StatementError {
    #[error("statement used after finalize")]
    Finalized,
    #[error("statement has not been executed")]
    NotExecuted,
    #[error("parameter index out of range")]
    ParamOutOfRange,
    #[error("recursion limit exceeded while preparing statement")]
    RecursionLimit,
    #[error("stack headroom exhausted while preparing statement")]
    OutOfMemory,
    #[error("loop detector rejected repeated prepare of the same statement")]
    LoopDetected,
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// One prepared/bound/executed statement. Created via [`Statement::prepare`],
/// driven through [`Statement::bind`], [`Statement::execute`] and
/// [`Statement::step`], read back through the `column_*` accessors, and
/// recycled with [`Statement::reset`] or retired with [`Statement::finalize`].
pub struct Statement {
    state: StatementState,
    fingerprint: u64,
    translation: Translation,
    params: Vec<Option<String>>,
    result: Option<crate::session::RemoteResult>,
    row: usize,
    row_cache: RowCache,
}

impl Statement {
    /// Prepares `original_sql`: runs the self-defense gates (recursion,
    /// stack headroom, loop detector), then consults the per-thread
    /// translation cache before falling back to the full pipeline.
    pub fn prepare(
        original_sql: &str,
        schema: &str,
        table_whitelist: &[String],
        conflict_targets: &dyn ConflictTargetLookup,
        stack_remaining_bytes: usize,
    ) -> Result<Self, StatementError> {
        let _guard = RecursionGuard::enter().ok_or(StatementError::RecursionLimit)?;

        let (decision, budget) = stack_gate(stack_remaining_bytes);
        if decision == GateDecision::OutOfMemory {
            return Err(StatementError::OutOfMemory);
        }

        let fp = fingerprint(original_sql);
        let looping = LOOP_DETECTOR.with(|d| d.borrow_mut().observe(fp, Instant::now()));
        if looping {
            return Err(StatementError::LoopDetected);
        }

        let translation = TRANSLATION_CACHE.with(|c| {
            let mut cache = c.borrow_mut();
            if let Some(cached) = cache.get(fp) {
                return cached.clone();
            }
            let fresh = translate(original_sql, schema, table_whitelist, conflict_targets, budget);
            cache.insert(fp, fresh.clone());
            fresh
        });

        let param_count = translation.param_count;
        Ok(Statement {
            state: StatementState::Prepared,
            fingerprint: fp,
            translation,
            params: vec![None; param_count],
            result: None,
            row: usize::MAX,
            row_cache: RowCache::default(),
        })
    }

    pub fn state(&self) -> StatementState {
        self.state
    }

    pub fn class(&self) -> StatementClass {
        self.translation.class
    }

    pub fn sql(&self) -> &str {
        &self.translation.sql
    }

    pub fn param_count(&self) -> usize {
        self.translation.param_count
    }

    /// Binds a 1-indexed-by-caller parameter, `index` already translated to
    /// 0-based. Named parameters are resolved by the caller against
    /// `translation.param_names` before calling this.
    pub fn bind(&mut self, index: usize, value: Option<String>) -> Result<(), StatementError> {
        if self.state == StatementState::Finalized {
            return Err(StatementError::Finalized);
        }
        let slot = self.params.get_mut(index).ok_or(StatementError::ParamOutOfRange)?;
        *slot = value;
        self.state = StatementState::Bound;
        Ok(())
    }

    pub fn param_names(&self) -> &[Option<String>] {
        &self.translation.param_names
    }

    /// Currently bound parameter values, in translated `$1, $2, ...` order.
    pub fn bound_params(&self) -> &[Option<String>] {
        &self.params
    }

    /// Executes the translated SQL against `session`, preparing it
    /// server-side on first use for this connection and reusing the
    /// server-assigned name on subsequent calls (C5).
    pub fn execute(
        &mut self,
        session: &mut dyn RemoteSession,
        stmt_cache: &mut PreparedStatementCache,
    ) -> Result<(), StatementError> {
        if self.state == StatementState::Finalized {
            return Err(StatementError::Finalized);
        }
        let (name, hit) = stmt_cache.name_for(self.fingerprint);
        if !hit {
            session.prepare(&name, &self.translation.sql)?;
        }
        let result = session.exec_prepared(&name, &self.params, ParamFormat::Text)?;
        self.row_cache = RowCache::for_columns(result.nfields());
        self.result = Some(result);
        self.row = usize::MAX;
        self.state = StatementState::Executed;
        Ok(())
    }

    /// Advances the cursor one row. Returns `false` once the result set is
    /// exhausted; invalidates the per-row decode cache on every advance
    /// (§4.8 "Cache invalidation").
    pub fn step(&mut self) -> Result<bool, StatementError> {
        let result = self.result.as_ref().ok_or(StatementError::NotExecuted)?;
        let next = self.row.wrapping_add(1);
        if next >= result.ntuples() {
            return Ok(false);
        }
        self.row = next;
        self.row_cache.invalidate();
        Ok(true)
    }

    pub fn column_count(&self) -> usize {
        self.result.as_ref().map(|r| r.nfields()).unwrap_or(0)
    }

    pub fn column_name(&self, col: usize) -> Option<&str> {
        self.result.as_ref().and_then(|r| r.fname(col))
    }

    pub fn is_null(&self, col: usize) -> bool {
        self.result.as_ref().map(|r| r.getisnull(self.row, col)).unwrap_or(true)
    }

    pub fn column_type(&self, col: usize) -> Result<i32, StatementError> {
        let result = self.result.as_ref().ok_or(StatementError::NotExecuted)?;
        let type_oid = result.ftype(col).unwrap_or(0);
        Ok(decode_type(result.getvalue(self.row, col), type_oid))
    }

    pub fn column_int(&self, col: usize) -> Result<i64, StatementError> {
        let result = self.result.as_ref().ok_or(StatementError::NotExecuted)?;
        Ok(result.getvalue(self.row, col).map(decode_int).unwrap_or(0))
    }

    pub fn column_float(&self, col: usize) -> Result<f64, StatementError> {
        let result = self.result.as_ref().ok_or(StatementError::NotExecuted)?;
        Ok(result.getvalue(self.row, col).map(decode_float).unwrap_or(0.0))
    }

    pub fn column_text(&mut self, col: usize) -> Result<&str, StatementError> {
        let row = self.row;
        let raw = match &self.result {
            Some(result) => result.getvalue(row, col).unwrap_or("").to_string(),
            None => return Err(StatementError::NotExecuted),
        };
        Ok(self.row_cache.text(col, &raw))
    }

    pub fn column_blob(&mut self, col: usize) -> Result<&[u8], StatementError> {
        let row = self.row;
        let (raw, type_oid) = match &self.result {
            Some(result) => (
                result.getvalue(row, col).unwrap_or("").to_string(),
                result.ftype(col).unwrap_or(0),
            ),
            None => return Err(StatementError::NotExecuted),
        };
        Ok(self.row_cache.blob(col, &raw, type_oid))
    }

    pub fn rows_affected(&self) -> u64 {
        self.result.as_ref().map(|r| r.rows_affected).unwrap_or(0)
    }

    /// Rewinds the statement to PREPARED, dropping any bound result and row
    /// cursor but keeping the translated SQL and parameter buffer sizes.
    pub fn reset(&mut self) {
        self.result = None;
        self.row = usize::MAX;
        self.row_cache = RowCache::default();
        for slot in &mut self.params {
            *slot = None;
        }
        if self.state != StatementState::Finalized {
            self.state = StatementState::Prepared;
        }
    }

    pub fn finalize(&mut self) {
        self.state = StatementState::Finalized;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ConnStatus, FieldValue, RemoteResult};
    use crate::translate::ConflictTarget;

    struct NoTargets;
    impl ConflictTargetLookup for NoTargets {
        fn lookup(&self, _table: &str) -> Option<ConflictTarget> {
            None
        }
    }

    struct FakeSession {
        prepared_names: Vec<String>,
    }

    impl RemoteSession for FakeSession {
        fn prepare(&mut self, name: &str, _sql: &str) -> Result<(), SessionError> {
            self.prepared_names.push(name.to_string());
            Ok(())
        }

        fn exec_prepared(
            &mut self,
            _name: &str,
            _params: &[Option<String>],
            _format: ParamFormat,
        ) -> Result<RemoteResult, SessionError> {
            Ok(RemoteResult {
                field_names: vec!["id".to_string(), "title".to_string()],
                field_types: vec![23, 25],
                rows: vec![
                    vec![FieldValue::Text("1".to_string()), FieldValue::Text("Alpha".to_string())],
                    vec![FieldValue::Text("2".to_string()), FieldValue::Null],
                ],
                rows_affected: 2,
            })
        }

        fn status(&self) -> ConnStatus {
            ConnStatus::Ok
        }
    }

    #[test]
    fn prepare_bind_execute_step_column_round_trip() {
        let mut stmt = Statement::prepare(
            "SELECT id, title FROM metadata_items WHERE id = :id",
            "plex",
            &[],
            &NoTargets,
            1024 * 1024,
        )
        .unwrap();
        assert_eq!(stmt.state(), StatementState::Prepared);
        assert_eq!(stmt.param_count(), 1);

        stmt.bind(0, Some("1".to_string())).unwrap();
        assert_eq!(stmt.state(), StatementState::Bound);

        let mut session = FakeSession { prepared_names: Vec::new() };
        let mut stmt_cache = PreparedStatementCache::new();
        stmt.execute(&mut session, &mut stmt_cache).unwrap();
        assert_eq!(stmt.state(), StatementState::Executed);
        assert_eq!(session.prepared_names.len(), 1);

        assert!(stmt.step().unwrap());
        assert_eq!(stmt.column_int(0).unwrap(), 1);
        assert_eq!(stmt.column_text(1).unwrap(), "Alpha");
        assert!(!stmt.is_null(1));

        assert!(stmt.step().unwrap());
        assert!(stmt.is_null(1));

        assert!(!stmt.step().unwrap());
    }

    #[test]
    fn reused_fingerprint_reuses_prepared_name_on_second_statement() {
        let sql = "SELECT 1 FROM metadata_items";
        let mut stmt_cache = PreparedStatementCache::new();
        let mut session = FakeSession { prepared_names: Vec::new() };

        let mut first = Statement::prepare(sql, "plex", &[], &NoTargets, 1024 * 1024).unwrap();
        first.execute(&mut session, &mut stmt_cache).unwrap();

        let mut second = Statement::prepare(sql, "plex", &[], &NoTargets, 1024 * 1024).unwrap();
        second.execute(&mut session, &mut stmt_cache).unwrap();

        assert_eq!(session.prepared_names.len(), 1, "second execute should reuse the cached name");
    }

    #[test]
    fn operations_after_finalize_are_rejected() {
        let mut stmt = Statement::prepare("SELECT 1", "plex", &[], &NoTargets, 1024 * 1024).unwrap();
        stmt.finalize();
        assert_eq!(stmt.state(), StatementState::Finalized);
        assert!(matches!(stmt.bind(0, None), Err(StatementError::Finalized)));
    }

    #[test]
    fn reset_clears_result_and_bound_params_but_keeps_translation() {
        let mut stmt = Statement::prepare(
            "SELECT id FROM metadata_items WHERE id = :id",
            "plex",
            &[],
            &NoTargets,
            1024 * 1024,
        )
        .unwrap();
        stmt.bind(0, Some("5".to_string())).unwrap();
        let mut session = FakeSession { prepared_names: Vec::new() };
        let mut stmt_cache = PreparedStatementCache::new();
        stmt.execute(&mut session, &mut stmt_cache).unwrap();
        stmt.step().unwrap();

        stmt.reset();
        assert_eq!(stmt.state(), StatementState::Prepared);
        assert!(matches!(stmt.step(), Err(StatementError::NotExecuted)));
        assert_eq!(stmt.param_count(), 1);
    }
}
