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

//! Fake-value pool (C7, §4.7). A ring of N records (N a power of two)
//! impersonating the embedded engine's opaque column-value handles. The
//! allocation counter advances by a power-of-two mask, never a signed
//! modulo — the historical overflow bug this sidesteps is a counter that
//! wraps into negative territory and corrupts the mask arithmetic.

use std::sync::atomic::{AtomicU64, Ordering};

use redirect_sys::{FakeValue, FAKE_VALUE_MAGIC, FAKE_VALUE_RING_SIZE};

pub struct FakeValuePool {
    ring: Vec<std::sync::atomic::AtomicU64>,
    records: Vec<std::sync::Mutex<FakeValue>>,
    counter: AtomicU64,
}

impl Default for FakeValuePool {
    fn default() -> Self {
        FakeValuePool {
            ring: (0..FAKE_VALUE_RING_SIZE).map(|_| std::sync::atomic::AtomicU64::new(0)).collect(),
            records: (0..FAKE_VALUE_RING_SIZE)
                .map(|_| {
                    std::sync::Mutex::new(FakeValue {
                        magic: 0,
                        stmt_id: 0,
                        col: 0,
                        row: 0,
                    })
                })
                .collect(),
            counter: AtomicU64::new(0),
        }
    }
}

impl FakeValuePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a ring slot for `(stmt_id, col, row)` and returns its
    /// index. The index is always in `[0, N)` regardless of how many
    /// times `allocate` has been called, including across a `u32`/`u64`
    /// wraparound of the underlying counter.
    pub fn allocate(&self, stmt_id: u64, col: u32, row: u32) -> usize {
        let ticket = self.counter.fetch_add(1, Ordering::Relaxed);
        let idx = (ticket as usize) & (FAKE_VALUE_RING_SIZE - 1);
        let mut record = self.records[idx].lock().expect("fake-value record mutex poisoned");
        *record = FakeValue {
            magic: FAKE_VALUE_MAGIC,
            stmt_id,
            col,
            row,
        };
        self.ring[idx].store(FAKE_VALUE_MAGIC, Ordering::Release);
        idx
    }

    /// Validates an opaque slot index as carrying a live fake-value magic.
    /// A caller holding a stale or out-of-range index is forwarded to the
    /// embedded engine rather than dereferenced (§4.7).
    pub fn validate(&self, idx: usize) -> Option<(u64, u32, u32)> {
        if idx >= FAKE_VALUE_RING_SIZE {
            return None;
        }
        if self.ring[idx].load(Ordering::Acquire) != FAKE_VALUE_MAGIC {
            return None;
        }
        let record = self.records[idx].lock().expect("fake-value record mutex poisoned");
        if record.magic != FAKE_VALUE_MAGIC {
            return None;
        }
        Some((record.stmt_id, record.col, record.row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_validate_round_trips() {
        let pool = FakeValuePool::new();
        let idx = pool.allocate(1, 2, 3);
        assert_eq!(pool.validate(idx), Some((1, 2, 3)));
    }

    #[test]
    fn index_never_leaves_ring_bounds_after_counter_wrap() {
        let pool = FakeValuePool::new();
        pool.counter.store(u64::MAX - 2, Ordering::Relaxed);
        for _ in 0..20 {
            let idx = pool.allocate(0, 0, 0);
            assert!(idx < FAKE_VALUE_RING_SIZE);
            assert!(pool.validate(idx).is_some());
        }
    }

    #[test]
    fn out_of_range_index_fails_validation() {
        let pool = FakeValuePool::new();
        assert!(pool.validate(FAKE_VALUE_RING_SIZE).is_none());
    }
}
