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

//! The real state behind an opaque `*mut sqlite3` handed to the host.
//! Two flavours: an intercepted connection drives the translation/pool
//! pipeline; a passthrough connection forwards straight to a genuine
//! embedded engine opened via `libsqlite3-sys`, giving non-Plex databases
//! full native fidelity for free.

use std::ffi::CString;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use redirect_core::errors::ErrorMirror;
use redirect_core::pool::SlotHandle;
use redirect_core::shadow::{apply_compatibility_shims, ShadowEngine, ShadowHandle};
use redirect_core::stmtcache::PreparedStatementCache;

use crate::context::context;

pub enum Backend {
    Intercepted {
        slot: SlotHandle,
        host_handle: u64,
    },
    Passthrough {
        raw: *mut libsqlite3_sys::sqlite3,
    },
}

pub struct Connection {
    pub backend: Backend,
    pub stmt_cache: Mutex<PreparedStatementCache>,
    pub errors: ErrorMirror,
    pub last_insert_rowid: AtomicI64,
    pub changes: AtomicI64,
    pub total_changes: AtomicI64,
    /// Owns the NUL-terminated bytes `sqlite3_errmsg` hands back; replaced,
    /// not leaked, the next time this connection records an error.
    pub errmsg_cache: Mutex<Option<CString>>,
}

// The host only calls into one `Connection` from whatever thread currently
// owns it, the same single-threaded-per-connection discipline the embedded
// engine itself requires; the raw pointer in `Backend::Passthrough` never
// escapes that thread-owned access pattern.
unsafe impl Send for Connection {}
unsafe impl Sync for Connection {}

static NEXT_HOST_HANDLE: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);

impl Connection {
    pub fn open_intercepted(thread: std::thread::ThreadId) -> Result<Self, redirect_core::errors::CoreError> {
        let ctx = context();
        let slot = ctx.pool.acquire(thread)?;
        let host_handle = NEXT_HOST_HANDLE.fetch_add(1, Ordering::Relaxed);
        ctx.router.lock().expect("router mutex poisoned").attach(host_handle, slot);

        if !ctx.config.no_shadow_scan {
            let mut shadow = ctx.shadow.lock().expect("shadow engine mutex poisoned");
            if let Ok(handle) = shadow.open(":memory:") {
                apply_compatibility_shims(&mut *shadow, handle);
                shadow.close(handle);
            }
        }

        Ok(Connection {
            backend: Backend::Intercepted { slot, host_handle },
            stmt_cache: Mutex::new(PreparedStatementCache::new()),
            errors: ErrorMirror::default(),
            last_insert_rowid: AtomicI64::new(0),
            changes: AtomicI64::new(0),
            total_changes: AtomicI64::new(0),
            errmsg_cache: Mutex::new(None),
        })
    }

    pub fn open_passthrough(raw: *mut libsqlite3_sys::sqlite3) -> Self {
        Connection {
            backend: Backend::Passthrough { raw },
            stmt_cache: Mutex::new(PreparedStatementCache::new()),
            errors: ErrorMirror::default(),
            last_insert_rowid: AtomicI64::new(0),
            changes: AtomicI64::new(0),
            total_changes: AtomicI64::new(0),
            errmsg_cache: Mutex::new(None),
        }
    }

    pub fn is_intercepted(&self) -> bool {
        matches!(self.backend, Backend::Intercepted { .. })
    }

    pub fn close(&self) {
        if let Backend::Intercepted { slot, host_handle } = &self.backend {
            let ctx = context();
            ctx.router.lock().expect("router mutex poisoned").detach(*host_handle);
            let _ = ctx.pool.release(*slot);
        }
    }
}

/// Decides whether `path` should be intercepted (§4.10 whitelist check).
pub fn is_intercepted_path(path: &str) -> bool {
    context().router.lock().expect("router mutex poisoned").is_intercepted(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadow_handle_type_is_copy() {
        let h = ShadowHandle(1);
        let _h2 = h;
        let _h3 = h;
    }
}
