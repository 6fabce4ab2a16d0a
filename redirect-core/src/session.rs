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

//! The remote-server wire protocol the core consumes (§6 "Remote-server
//! wire protocol consumed"). A black box to the rest of the core: the
//! `redirect-pg` crate provides the concrete implementation over the
//! `postgres` crate; tests use an in-memory fake.

/// Parameter transfer format (§6: "Parameter format 0 = text, 1 = binary").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamFormat {
    Text = 0,
    Binary = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnStatus {
    Ok,
    Bad,
}

/// One textual result field, or SQL NULL.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Null,
    Text(String),
}

/// A materialised result set in the PostgreSQL text protocol (§4.6:
/// "the entire result set is materialised into the statement").
#[derive(Debug, Clone, Default)]
pub struct RemoteResult {
    pub field_names: Vec<String>,
    /// Server type OID per column, used by C8 to pick a decoder.
    pub field_types: Vec<u32>,
    pub rows: Vec<Vec<FieldValue>>,
    pub rows_affected: u64,
}

impl RemoteResult {
    pub fn ntuples(&self) -> usize {
        self.rows.len()
    }

    pub fn nfields(&self) -> usize {
        self.field_names.len()
    }

    pub fn fname(&self, col: usize) -> Option<&str> {
        self.field_names.get(col).map(|s| s.as_str())
    }

    pub fn ftype(&self, col: usize) -> Option<u32> {
        self.field_types.get(col).copied()
    }

    pub fn getvalue(&self, row: usize, col: usize) -> Option<&str> {
        match self.rows.get(row)?.get(col)? {
            FieldValue::Null => None,
            FieldValue::Text(s) => Some(s.as_str()),
        }
    }

    pub fn getlength(&self, row: usize, col: usize) -> usize {
        self.getvalue(row, col).map(str::len).unwrap_or(0)
    }

    pub fn getisnull(&self, row: usize, col: usize) -> bool {
        matches!(self.rows.get(row).and_then(|r| r.get(col)), Some(FieldValue::Null) | None)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("remote server error: {0}")]
    Remote(String),
    #[error("connection lost: {0}")]
    Lost(String),
}

/// A session against the remote server. Implementors own the network
/// connection; the core only ever sees this interface (§6).
pub trait RemoteSession: Send {
    fn exec(&mut self, _sql: &str) -> Result<RemoteResult, SessionError> {
        Err(SessionError::Remote("exec not implemented".to_string()))
    }

    fn prepare(&mut self, _name: &str, _sql: &str) -> Result<(), SessionError> {
        Ok(())
    }

    fn exec_prepared(
        &mut self,
        _name: &str,
        _params: &[Option<String>],
        _format: ParamFormat,
    ) -> Result<RemoteResult, SessionError> {
        Err(SessionError::Remote("exec_prepared not implemented".to_string()))
    }

    fn status(&self) -> ConnStatus {
        ConnStatus::Ok
    }

    fn finish(&mut self) {}
}
