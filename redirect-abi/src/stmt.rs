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

//! The real state behind an opaque `*mut sqlite3_stmt`.

use std::ffi::CString;
use std::sync::Mutex;

use redirect_core::statement::Statement;

use crate::connection::Connection;

pub enum StmtBackend {
    Intercepted(Mutex<Statement>),
    Passthrough(*mut libsqlite3_sys::sqlite3_stmt),
}

pub struct Stmt {
    pub conn: *mut Connection,
    pub backend: StmtBackend,
    /// Owns the NUL-terminated bytes `column_text`/`sql`/`expanded_sql`
    /// hand back to the host; a column's slot is overwritten the next time
    /// that column is read, matching the "valid until the next step/reset"
    /// lifetime the embedded engine documents for these pointers.
    pub text_cache: Mutex<Vec<Option<CString>>>,
    pub sql_cache: Mutex<Option<CString>>,
    /// One slot per bind parameter, filled lazily by `bind_parameter_name`.
    pub param_name_cache: Mutex<Vec<Option<CString>>>,
    /// One slot per result column, filled lazily by `column_decltype`.
    pub decltype_cache: Mutex<Vec<Option<CString>>>,
    /// Statement-owned, like `sql_cache` — see `sqlite3_expanded_sql`'s doc
    /// comment for why this diverges from the embedded engine's "caller
    /// frees with `sqlite3_free`" contract.
    pub expanded_cache: Mutex<Option<CString>>,
}

unsafe impl Send for Stmt {}
unsafe impl Sync for Stmt {}

impl Stmt {
    pub fn new_intercepted(conn: *mut Connection, statement: Statement) -> Self {
        Stmt {
            conn,
            backend: StmtBackend::Intercepted(Mutex::new(statement)),
            text_cache: Mutex::new(Vec::new()),
            sql_cache: Mutex::new(None),
            param_name_cache: Mutex::new(Vec::new()),
            decltype_cache: Mutex::new(Vec::new()),
            expanded_cache: Mutex::new(None),
        }
    }

    pub fn new_passthrough(conn: *mut Connection, raw: *mut libsqlite3_sys::sqlite3_stmt) -> Self {
        Stmt {
            conn,
            backend: StmtBackend::Passthrough(raw),
            text_cache: Mutex::new(Vec::new()),
            sql_cache: Mutex::new(None),
            param_name_cache: Mutex::new(Vec::new()),
            decltype_cache: Mutex::new(Vec::new()),
            expanded_cache: Mutex::new(None),
        }
    }

    /// Caches `text` as column `col`'s NUL-terminated buffer and returns a
    /// pointer valid until the next read of the same column.
    pub fn cache_column_text(&self, col: usize, text: &str) -> *const std::os::raw::c_char {
        cache_slot(&self.text_cache, col, text)
    }

    /// Same slot-per-index caching as [`Stmt::cache_column_text`], applied
    /// to `param_name_cache`/`decltype_cache`.
    pub fn cache_indexed(cache: &Mutex<Vec<Option<CString>>>, idx: usize, text: &str) -> *const std::os::raw::c_char {
        cache_slot(cache, idx, text)
    }
}

fn cache_slot(cache: &Mutex<Vec<Option<CString>>>, idx: usize, text: &str) -> *const std::os::raw::c_char {
    let mut cache = cache.lock().expect("stmt cache poisoned");
    if cache.len() <= idx {
        cache.resize_with(idx + 1, || None);
    }
    let owned = CString::new(text.as_bytes().to_vec()).unwrap_or_else(|_| CString::new("").unwrap());
    cache[idx] = Some(owned);
    cache[idx].as_ref().unwrap().as_ptr()
}
