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

//! `sqlite3_get_table`/`sqlite3_free_table` (§6): built generically atop
//! prepare/step/column_*, the same relationship `sqlite3_exec` has to the
//! row-by-row primitives, so it works uniformly for intercepted and
//! passthrough connections alike.
//!
//! The embedded engine's own implementation hands back one contiguous
//! allocation and expects `sqlite3_free_table` to recover its size from
//! bookkeeping stored just before the returned pointer. We can't borrow that
//! trick without matching its allocator layout exactly, so this keeps an
//! explicit side table instead: `get_table` records `(len, cells)` keyed by
//! the returned pointer's address, and `free_table` looks it up and drops
//! it rather than freeing blind.

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::sync::{Mutex, OnceLock};

use redirect_sys::{
    sqlite3 as raw_sqlite3, sqlite3_stmt as raw_sqlite3_stmt, SQLITE_DONE, SQLITE_MISUSE, SQLITE_NULL, SQLITE_OK,
    SQLITE_ROW,
};

use crate::{
    prepare_impl, sqlite3_column_count, sqlite3_column_name, sqlite3_column_text, sqlite3_column_type,
    sqlite3_finalize, sqlite3_step,
};

type TableEntry = (usize, Vec<Option<CString>>);

fn registry() -> &'static Mutex<HashMap<usize, TableEntry>> {
    static REGISTRY: OnceLock<Mutex<HashMap<usize, TableEntry>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// # Safety
/// Same contract as the embedded engine's own `sqlite3_get_table`.
pub unsafe fn get_table(
    db: *mut raw_sqlite3,
    sql: *const c_char,
    result_out: *mut *mut *mut c_char,
    rows_out: *mut c_int,
    cols_out: *mut c_int,
    errmsg_out: *mut *mut c_char,
) -> c_int {
    if db.is_null() || result_out.is_null() {
        return SQLITE_MISUSE;
    }
    if !errmsg_out.is_null() {
        *errmsg_out = std::ptr::null_mut();
    }

    let mut stmt_ptr: *mut raw_sqlite3_stmt = std::ptr::null_mut();
    let rc = prepare_impl(db, sql, -1, &mut stmt_ptr, std::ptr::null_mut());
    if rc != SQLITE_OK {
        *result_out = std::ptr::null_mut();
        zero_counts(rows_out, cols_out);
        return rc;
    }

    let ncols = sqlite3_column_count(stmt_ptr) as usize;
    let mut cells: Vec<Option<CString>> = Vec::new();
    for c in 0..ncols {
        let name_ptr = sqlite3_column_name(stmt_ptr, c as c_int);
        cells.push(Some(c_string_from(name_ptr)));
    }

    let mut nrows = 0usize;
    loop {
        match sqlite3_step(stmt_ptr) {
            SQLITE_ROW => {
                nrows += 1;
                for c in 0..ncols {
                    if sqlite3_column_type(stmt_ptr, c as c_int) == SQLITE_NULL {
                        cells.push(None);
                    } else {
                        cells.push(Some(c_string_from(sqlite3_column_text(stmt_ptr, c as c_int))));
                    }
                }
            }
            SQLITE_DONE => break,
            other => {
                sqlite3_finalize(stmt_ptr);
                *result_out = std::ptr::null_mut();
                zero_counts(rows_out, cols_out);
                return other;
            }
        }
    }
    sqlite3_finalize(stmt_ptr);

    let len = cells.len();
    let ptrs: Vec<*mut c_char> = cells
        .iter()
        .map(|c| c.as_ref().map(|s| s.as_ptr() as *mut c_char).unwrap_or(std::ptr::null_mut()))
        .collect();
    let raw = Box::into_raw(ptrs.into_boxed_slice()) as *mut *mut c_char;
    registry().lock().expect("get_table registry poisoned").insert(raw as usize, (len, cells));

    *result_out = raw;
    if !rows_out.is_null() {
        *rows_out = nrows as c_int;
    }
    if !cols_out.is_null() {
        *cols_out = ncols as c_int;
    }
    SQLITE_OK
}

/// # Safety
/// `result` must be a pointer previously returned by [`get_table`], or null.
pub unsafe fn free_table(result: *mut *mut c_char) {
    if result.is_null() {
        return;
    }
    let entry = registry().lock().expect("get_table registry poisoned").remove(&(result as usize));
    if let Some((len, cells)) = entry {
        drop(Box::from_raw(std::slice::from_raw_parts_mut(result, len)));
        drop(cells);
    }
}

unsafe fn c_string_from(ptr: *const c_char) -> CString {
    if ptr.is_null() {
        CString::new("").unwrap()
    } else {
        CString::new(CStr::from_ptr(ptr).to_bytes()).unwrap_or_else(|_| CString::new("").unwrap())
    }
}

fn zero_counts(rows_out: *mut c_int, cols_out: *mut c_int) {
    unsafe {
        if !rows_out.is_null() {
            *rows_out = 0;
        }
        if !cols_out.is_null() {
            *cols_out = 0;
        }
    }
}
