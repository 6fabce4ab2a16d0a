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

//! The translation pipeline, call-level state bridge, and self-defense
//! envelope of the Postgres redirect shim. This crate has no C linkage of
//! its own; `redirect-abi` is the only place that exposes one.

pub mod cache;
pub mod decode;
pub mod defense;
pub mod errors;
pub mod fakevalue;
pub mod fingerprint;
pub mod lexer;
pub mod pool;
pub mod router;
pub mod session;
pub mod shadow;
pub mod statement;
pub mod stmtcache;
pub mod translate;

pub use cache::CacheStats;
pub use defense::DefenseStats;
pub use errors::{CoreError, CoreResult, ErrorMirror};
pub use translate::{translate, StackBudget, StatementClass, Translation};
