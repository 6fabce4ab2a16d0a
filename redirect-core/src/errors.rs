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

//! Error types and the per-connection error mirror (C11, §7).

use redirect_sys::ErrorKind;
use std::sync::Mutex;

/// Errors the core itself can raise. Every variant maps onto an
/// [`ErrorKind`] through [`CoreError::kind`] for the error mirror.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("out of memory")]
    Nomem,
    #[error("unknown handle")]
    NotFound,
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("remote server rejected translated SQL: {0}")]
    Syntax(String),
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    #[error("translation unsupported: {0}")]
    TranslationFailed(String),
    #[error("connection pool exhausted")]
    Busy,
    #[error("{0}")]
    Generic(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Nomem => ErrorKind::Nomem,
            CoreError::NotFound => ErrorKind::Notfound,
            CoreError::Constraint(_) => ErrorKind::Constraint,
            CoreError::Syntax(_) => ErrorKind::Syntax,
            CoreError::ConnectionLost(_) => ErrorKind::ConnectionLost,
            CoreError::TranslationFailed(_) => ErrorKind::TranslationFailed,
            CoreError::Busy => ErrorKind::Busy,
            CoreError::Generic(_) => ErrorKind::Generic,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Most-recent `(kind, message)` pair for a Connection (§4.11).
///
/// The host queries error text/code after a failed prepare; because the
/// shim's own aborts never reach the embedded engine's internal error slot,
/// each Connection retains its own diagnosis and consults it first.
#[derive(Debug)]
pub struct ErrorMirror {
    inner: Mutex<(ErrorKind, String)>,
}

impl Default for ErrorMirror {
    fn default() -> Self {
        ErrorMirror {
            inner: Mutex::new((ErrorKind::Ok, String::new())),
        }
    }
}

impl ErrorMirror {
    pub fn set(&self, kind: ErrorKind, message: impl Into<String>) {
        let mut guard = self.inner.lock().expect("error mirror poisoned");
        *guard = (kind, message.into());
    }

    pub fn set_from_error(&self, err: &CoreError) {
        self.set(err.kind(), err.to_string());
    }

    pub fn clear(&self) {
        self.set(ErrorKind::Ok, "");
    }

    /// Returns `None` when the mirror is empty (§4.11: "falls through to
    /// the embedded engine only if empty").
    pub fn get(&self) -> Option<(ErrorKind, String)> {
        let guard = self.inner.lock().expect("error mirror poisoned");
        if guard.0 == ErrorKind::Ok && guard.1.is_empty() {
            None
        } else {
            Some(guard.clone())
        }
    }
}
