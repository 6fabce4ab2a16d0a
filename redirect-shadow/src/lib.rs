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

//! The concrete [`ShadowEngine`] over the genuine embedded engine, via the
//! vendored C sources `libsqlite3-sys` compiles with its `bundled` feature.
//! Backs passthrough statements against non-intercepted databases and the
//! C12 compatibility shims run on attach.

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use libsqlite3_sys as ffi;

use redirect_core::shadow::{ShadowEngine, ShadowError, ShadowHandle};

pub struct SqliteShadowEngine {
    handles: HashMap<u64, *mut ffi::sqlite3>,
    next_id: u64,
}

// Raw `sqlite3*` handles are only ever touched from the thread that holds
// the owning `ShadowHandle`; the engine itself places no constraint beyond
// "don't call two methods on the same handle from two threads at once",
// which is the same contract the host ABI already imposes on statements.
unsafe impl Send for SqliteShadowEngine {}

impl Default for SqliteShadowEngine {
    fn default() -> Self {
        SqliteShadowEngine {
            handles: HashMap::new(),
            next_id: 0,
        }
    }
}

impl SqliteShadowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn last_error(db: *mut ffi::sqlite3) -> String {
        unsafe {
            let msg = ffi::sqlite3_errmsg(db);
            if msg.is_null() {
                "unknown sqlite error".to_string()
            } else {
                CStr::from_ptr(msg).to_string_lossy().into_owned()
            }
        }
    }
}

impl ShadowEngine for SqliteShadowEngine {
    fn open(&mut self, path: &str) -> Result<ShadowHandle, ShadowError> {
        let cpath = CString::new(path).map_err(|e| ShadowError::Open(e.to_string()))?;
        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE | ffi::SQLITE_OPEN_FULLMUTEX;
        let rc = unsafe { ffi::sqlite3_open_v2(cpath.as_ptr(), &mut db, flags, ptr::null()) };
        if rc != ffi::SQLITE_OK {
            let message = if db.is_null() {
                format!("sqlite3_open_v2 failed with code {rc}")
            } else {
                Self::last_error(db)
            };
            unsafe {
                ffi::sqlite3_close_v2(db);
            }
            return Err(ShadowError::Open(message));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.handles.insert(id, db);
        Ok(ShadowHandle(id))
    }

    fn exec(&mut self, handle: ShadowHandle, sql: &str) -> Result<(), ShadowError> {
        let db = *self
            .handles
            .get(&handle.0)
            .ok_or_else(|| ShadowError::Exec("unknown shadow handle".to_string()))?;
        let csql = CString::new(sql).map_err(|e| ShadowError::Exec(e.to_string()))?;
        let mut errmsg: *mut c_char = ptr::null_mut();
        let rc = unsafe { ffi::sqlite3_exec(db, csql.as_ptr(), None, ptr::null_mut(), &mut errmsg) };
        if rc != ffi::SQLITE_OK {
            let message = if errmsg.is_null() {
                Self::last_error(db)
            } else {
                let message = unsafe { CStr::from_ptr(errmsg).to_string_lossy().into_owned() };
                unsafe {
                    ffi::sqlite3_free(errmsg as *mut _);
                }
                message
            };
            return Err(ShadowError::Exec(message));
        }
        Ok(())
    }

    fn close(&mut self, handle: ShadowHandle) {
        if let Some(db) = self.handles.remove(&handle.0) {
            unsafe {
                ffi::sqlite3_close_v2(db);
            }
        }
    }
}

impl Drop for SqliteShadowEngine {
    fn drop(&mut self) {
        for (_, db) in self.handles.drain() {
            unsafe {
                ffi::sqlite3_close_v2(db);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_exec_close_round_trip_on_a_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shadow.db");
        let mut engine = SqliteShadowEngine::new();
        let handle = engine.open(path.to_str().unwrap()).unwrap();
        engine.exec(handle, "CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();
        engine.exec(handle, "INSERT INTO t (id) VALUES (1)").unwrap();
        engine.close(handle);
    }

    #[test]
    fn exec_on_unknown_handle_fails() {
        let mut engine = SqliteShadowEngine::new();
        let err = engine.exec(ShadowHandle(999), "SELECT 1").unwrap_err();
        assert!(matches!(err, ShadowError::Exec(_)));
    }
}
