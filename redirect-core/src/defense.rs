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

//! Self-defense envelope (C9, §4.9): recursion gate, stack-remaining gate,
//! loop detector, and the try-lock discipline used everywhere a mutex is
//! acquired across subsystems.

use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::{Mutex, TryLockError};
use std::time::{Duration, Instant};

use redirect_sys::{
    LOOP_DETECTOR_SLOTS, LOOP_DETECTOR_THRESHOLD, LOOP_DETECTOR_WINDOW_MS, RECURSION_GATE_LIMIT,
    STACK_HARD_THRESHOLD_BYTES, STACK_SOFT_THRESHOLD_BYTES, TRYLOCK_RETRIES, TRYLOCK_RETRY_DELAY_MICROS,
};

use crate::translate::StackBudget;

thread_local! {
    static RECURSION_DEPTH: Cell<u32> = Cell::new(0);
    static RECURSION_HIGH_WATER: Cell<u32> = Cell::new(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    OutOfMemory,
}

/// Per-thread recursion gate (§4.9 item 1): accepts depth up to and
/// including `RECURSION_GATE_LIMIT`, rejects beyond.
pub struct RecursionGuard;

impl RecursionGuard {
    /// Enters one level of recursion; returns `None` if the gate rejects.
    /// The guard decrements the counter on drop.
    pub fn enter() -> Option<Self> {
        let depth = RECURSION_DEPTH.with(|d| {
            let next = d.get() + 1;
            d.set(next);
            next
        });
        if depth > RECURSION_GATE_LIMIT {
            RECURSION_DEPTH.with(|d| d.set(d.get() - 1));
            None
        } else {
            RECURSION_HIGH_WATER.with(|hw| hw.set(hw.get().max(depth)));
            Some(RecursionGuard)
        }
    }

    /// This thread's deepest recursion depth reached since the last reset,
    /// surfaced by `redirect-cli --stats`.
    pub fn high_water_mark() -> u32 {
        RECURSION_HIGH_WATER.with(|hw| hw.get())
    }
}

impl Drop for RecursionGuard {
    fn drop(&mut self) {
        RECURSION_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// Stack-remaining gate (§4.9 item 2). `remaining_bytes` is supplied by the
/// caller (the ABI entry point measures the calling thread's stack before
/// invoking the core); this function only classifies it.
pub fn stack_gate(remaining_bytes: usize) -> (GateDecision, StackBudget) {
    if remaining_bytes < STACK_HARD_THRESHOLD_BYTES {
        (GateDecision::OutOfMemory, StackBudget::SkipHeavyStages)
    } else if remaining_bytes < STACK_SOFT_THRESHOLD_BYTES {
        (GateDecision::Proceed, StackBudget::SkipHeavyStages)
    } else {
        (GateDecision::Proceed, StackBudget::Full)
    }
}

struct LoopSlot {
    fingerprint: u64,
    arrivals: VecDeque<Instant>,
}

/// Per-thread loop detector (§4.9 item 3): a small open-addressed table of
/// recent fingerprints with arrival timestamps. A fingerprint seen at
/// least `LOOP_DETECTOR_THRESHOLD` times within `LOOP_DETECTOR_WINDOW_MS`
/// triggers a cool-down rejection.
pub struct LoopDetector {
    slots: Vec<Option<LoopSlot>>,
    trips: u32,
}

impl Default for LoopDetector {
    fn default() -> Self {
        LoopDetector {
            slots: (0..LOOP_DETECTOR_SLOTS).map(|_| None).collect(),
            trips: 0,
        }
    }
}

impl LoopDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trips(&self) -> u32 {
        self.trips
    }

    fn home(&self, fingerprint: u64) -> usize {
        (fingerprint as usize) & (LOOP_DETECTOR_SLOTS - 1)
    }

    /// Records an arrival of `fingerprint` at `now` and reports whether the
    /// call should be rejected for this round.
    pub fn observe(&mut self, fingerprint: u64, now: Instant) -> bool {
        let idx = self.home(fingerprint);
        let window = Duration::from_millis(LOOP_DETECTOR_WINDOW_MS);
        let slot = self.slots[idx].get_or_insert_with(|| LoopSlot {
            fingerprint,
            arrivals: VecDeque::new(),
        });
        if slot.fingerprint != fingerprint {
            // Collision with a different fingerprint: reset the slot. This
            // can undercount a legitimate loop sharing a bucket with noise,
            // which is acceptable for a heuristic defense mechanism.
            *slot = LoopSlot {
                fingerprint,
                arrivals: VecDeque::new(),
            };
        }
        while let Some(&front) = slot.arrivals.front() {
            if now.duration_since(front) > window {
                slot.arrivals.pop_front();
            } else {
                break;
            }
        }
        slot.arrivals.push_back(now);
        let tripped = slot.arrivals.len() >= LOOP_DETECTOR_THRESHOLD as usize;
        if tripped {
            self.trips += 1;
        }
        tripped
    }
}

/// Snapshot of this thread's self-defense envelope, surfaced by
/// `redirect-cli --stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefenseStats {
    pub recursion_high_water: u32,
    pub loop_detector_trips: u32,
}

impl std::fmt::Display for DefenseStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "self-defense: recursion high-water {}, loop detector trips {}",
            self.recursion_high_water, self.loop_detector_trips
        )
    }
}

thread_local! {
    pub static LOOP_DETECTOR: std::cell::RefCell<LoopDetector> = std::cell::RefCell::new(LoopDetector::new());
}

/// Global lock order (§4.9, §5): connection → statement → fake-value →
/// error-mirror. Acquisition always uses try-lock with bounded retry; on
/// exhaustion the caller falls back to the embedded engine rather than
/// blocking indefinitely.
pub fn try_lock_with_retry<'a, T>(mutex: &'a Mutex<T>) -> Option<std::sync::MutexGuard<'a, T>> {
    for _ in 0..=TRYLOCK_RETRIES {
        match mutex.try_lock() {
            Ok(guard) => return Some(guard),
            Err(TryLockError::WouldBlock) => {
                std::thread::sleep(Duration::from_micros(TRYLOCK_RETRY_DELAY_MICROS));
            }
            Err(TryLockError::Poisoned(poisoned)) => return Some(poisoned.into_inner()),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recursion_gate_accepts_limit_and_rejects_beyond() {
        let mut guards = Vec::new();
        for _ in 0..RECURSION_GATE_LIMIT {
            guards.push(RecursionGuard::enter().expect("within limit"));
        }
        assert!(RecursionGuard::enter().is_none());
    }

    #[test]
    fn stack_gate_boundary_behaviour() {
        assert_eq!(stack_gate(450 * 1024).0, GateDecision::Proceed);
        assert_eq!(stack_gate(350 * 1024).0, GateDecision::OutOfMemory);
    }

    #[test]
    fn loop_detector_triggers_at_threshold_within_window() {
        let mut detector = LoopDetector::new();
        let base = Instant::now();
        let mut triggered = false;
        for _ in 0..LOOP_DETECTOR_THRESHOLD {
            triggered = detector.observe(123, base);
        }
        assert!(triggered);
        assert_eq!(detector.trips(), 1);
    }

    #[test]
    fn loop_detector_does_not_trigger_for_distinct_fingerprints() {
        let mut detector = LoopDetector::new();
        let base = Instant::now();
        let mut any_triggered = false;
        for fp in 0..100u64 {
            if detector.observe(fp, base) {
                any_triggered = true;
            }
        }
        assert!(!any_triggered);
    }

    #[test]
    fn try_lock_with_retry_succeeds_when_uncontended() {
        let mutex = Mutex::new(5);
        let guard = try_lock_with_retry(&mutex).unwrap();
        assert_eq!(*guard, 5);
    }
}
