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

// ABI surface of the embedded engine the shim impersonates.
// Hand-written from the public sqlite3.h contract; only the subset the
// shim's export layer and fake-value dispatch need is reproduced here.
#![allow(non_camel_case_types, non_upper_case_globals, dead_code)]

use std::os::raw::{c_char, c_int, c_void};
use std::sync::atomic::AtomicU32;

// ===== Result / status codes =====

pub const SQLITE_OK: c_int = 0;
pub const SQLITE_ERROR: c_int = 1;
pub const SQLITE_NOMEM: c_int = 7;
pub const SQLITE_BUSY: c_int = 5;
pub const SQLITE_CONSTRAINT: c_int = 19;
pub const SQLITE_MISUSE: c_int = 21;
pub const SQLITE_ROW: c_int = 100;
pub const SQLITE_DONE: c_int = 101;

// ===== Fundamental column/value types =====

pub const SQLITE_INTEGER: c_int = 1;
pub const SQLITE_FLOAT: c_int = 2;
pub const SQLITE_TEXT: c_int = 3;
pub const SQLITE_BLOB: c_int = 4;
pub const SQLITE_NULL: c_int = 5;

// ===== bind/column parameter formats consumed from the remote session =====
// 0 = text, 1 = binary, matching the libpq convention the session layer speaks.
pub const PARAM_FORMAT_TEXT: u8 = 0;
pub const PARAM_FORMAT_BINARY: u8 = 1;

// ===== Pool slot states (C4) =====

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Free = 0,
    Reserved = 1,
    Ready = 2,
    Reconnecting = 3,
    Error = 4,
}

impl SlotState {
    #[inline]
    pub fn from_u8(v: u8) -> Option<SlotState> {
        match v {
            0 => Some(SlotState::Free),
            1 => Some(SlotState::Reserved),
            2 => Some(SlotState::Ready),
            3 => Some(SlotState::Reconnecting),
            4 => Some(SlotState::Error),
            _ => None,
        }
    }
}

// ===== Statement classification (C6) =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StmtClass {
    Write,
    Read,
    DdlSuppressed,
    Passthrough,
}

// ===== Fake-value ring (C7) =====
//
// A fixed-size record impersonating the embedded engine's opaque
// `sqlite3_value *`. The magic is the sole disambiguator between a value
// the shim produced and a value the real engine produced; it must never
// collide with a plausible heap pointer. 0xFACEFEED_u64's top bits make it
// an implausible address on every supported platform (always non-canonical
// on x86_64, always misaligned/out-of-range on 32-bit).
pub const FAKE_VALUE_MAGIC: u64 = 0xFACE_FEED_DEAD_BEEF;

pub const FAKE_VALUE_RING_SIZE: usize = 256;
// Must stay a power of two: the ring index is advanced with a bitmask,
// never a signed modulo (see historical overflow note, §4.7).
const _: () = assert!(FAKE_VALUE_RING_SIZE.is_power_of_two());

#[repr(C)]
pub struct FakeValue {
    pub magic: u64,
    pub stmt_id: u64,
    pub col: u32,
    pub row: u32,
}

#[inline]
pub fn is_fake_value(magic: u64) -> bool {
    magic == FAKE_VALUE_MAGIC
}

// ===== Translation cache (C3) =====

pub const TRANSLATION_CACHE_CAPACITY: usize = 512;
const _: () = assert!(TRANSLATION_CACHE_CAPACITY.is_power_of_two());
pub const TRANSLATION_CACHE_PROBE_LIMIT: usize = 8;

// ===== Connection pool (C4) =====

pub const POOL_DEFAULT_CAPACITY: usize = 50;
pub const POOL_HARD_MAX_CAPACITY: usize = 100;

// ===== Self-defense envelope (C9) =====

pub const RECURSION_GATE_LIMIT: u32 = 100;
pub const STACK_HARD_THRESHOLD_BYTES: usize = 400 * 1024;
pub const STACK_SOFT_THRESHOLD_BYTES: usize = 512 * 1024;
pub const LOOP_DETECTOR_SLOTS: usize = 16;
pub const LOOP_DETECTOR_THRESHOLD: u32 = 50;
pub const LOOP_DETECTOR_WINDOW_MS: u64 = 100;
pub const TRYLOCK_RETRIES: u32 = 10;
pub const TRYLOCK_RETRY_DELAY_MICROS: u64 = 1000;

// ===== Error kinds mirrored per-connection (C11 / §7) =====

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Ok = 0,
    Nomem = 1,
    Notfound = 2,
    Constraint = 3,
    Syntax = 4,
    ConnectionLost = 5,
    TranslationFailed = 6,
    Busy = 7,
    Generic = 8,
}

impl ErrorKind {
    /// Map to the embedded engine's error constant (§7).
    pub fn to_sqlite_code(self) -> c_int {
        match self {
            ErrorKind::Ok => SQLITE_OK,
            ErrorKind::Nomem => SQLITE_NOMEM,
            ErrorKind::Constraint => SQLITE_CONSTRAINT,
            ErrorKind::Busy => SQLITE_BUSY,
            ErrorKind::Notfound
            | ErrorKind::Syntax
            | ErrorKind::ConnectionLost
            | ErrorKind::TranslationFailed
            | ErrorKind::Generic => SQLITE_ERROR,
        }
    }
}

// ===== Opaque handle types exported across the ABI boundary =====
//
// The host only ever holds pointers to these; their true representation
// lives behind the pointer in `redirect-abi`. Declared here, not there, so
// that `redirect-core` can reason about handle identity without depending
// on the cdylib crate.
#[repr(C)]
pub struct sqlite3 {
    _opaque: [u8; 0],
}

#[repr(C)]
pub struct sqlite3_stmt {
    _opaque: [u8; 0],
}

#[repr(C)]
pub struct sqlite3_value {
    _opaque: [u8; 0],
}

// Re-exported so downstream crates can name raw C types without importing
// `std::os::raw` themselves.
pub type RawChar = c_char;
pub type RawVoid = c_void;
pub type RawInt = c_int;

// `AtomicU32` is used for the pool slot generation counter (C4); assert its
// layout matches a plain u32 so the ABI-facing struct embedding it stays
// predictable across targets.
const _: () = assert!(std::mem::size_of::<AtomicU32>() == std::mem::size_of::<u32>());
