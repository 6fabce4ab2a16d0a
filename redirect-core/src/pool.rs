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

//! Connection pool (C4, §4.4). Fixed-capacity array of slots; each slot's
//! state transitions only via compare-and-swap. Generation increments on
//! every FREE→RESERVED so a stale `(slot, generation)` pair can never be
//! acted on by a caller that missed an intervening release/reacquire.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread::ThreadId;
use std::time::Duration;

use redirect_sys::{SlotState, POOL_DEFAULT_CAPACITY, POOL_HARD_MAX_CAPACITY, TRYLOCK_RETRIES, TRYLOCK_RETRY_DELAY_MICROS};

use crate::errors::{CoreError, CoreResult};
use crate::session::RemoteSession;

struct Slot<S> {
    state: AtomicU32,
    generation: AtomicU32,
    owner: Mutex<Option<ThreadId>>,
    connection: Mutex<Option<S>>,
}

impl<S> Slot<S> {
    fn new() -> Self {
        Slot {
            state: AtomicU32::new(SlotState::Free as u32),
            generation: AtomicU32::new(0),
            owner: Mutex::new(None),
            connection: Mutex::new(None),
        }
    }

    fn state(&self) -> SlotState {
        SlotState::from_u8(self.state.load(Ordering::Acquire) as u8).unwrap_or(SlotState::Error)
    }

    fn cas_state(&self, from: SlotState, to: SlotState) -> bool {
        self.state
            .compare_exchange(from as u32, to as u32, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// `(slot_index, generation)` as cached in thread-local storage for the
/// fast-path check in §4.4 step 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotHandle {
    pub slot_index: usize,
    pub generation: u32,
}

pub struct ConnectionPool<S> {
    slots: Vec<Slot<S>>,
    open: Box<dyn Fn() -> CoreResult<S> + Send + Sync>,
    acquire_attempts: AtomicU64,
}

impl<S: Send> ConnectionPool<S> {
    pub fn new(capacity: usize, open: impl Fn() -> CoreResult<S> + Send + Sync + 'static) -> Self {
        let capacity = capacity.clamp(1, POOL_HARD_MAX_CAPACITY);
        ConnectionPool {
            slots: (0..capacity).map(|_| Slot::new()).collect(),
            open: Box::new(open),
            acquire_attempts: AtomicU64::new(0),
        }
    }

    pub fn with_default_capacity(open: impl Fn() -> CoreResult<S> + Send + Sync + 'static) -> Self {
        Self::new(POOL_DEFAULT_CAPACITY, open)
    }

    /// Fast-path check for a thread-local cached handle (§4.4 step 1).
    pub fn fast_path_valid(&self, handle: SlotHandle, thread: ThreadId) -> bool {
        let Some(slot) = self.slots.get(handle.slot_index) else {
            return false;
        };
        if slot.state() != SlotState::Ready {
            return false;
        }
        if slot.generation.load(Ordering::Acquire) != handle.generation {
            return false;
        }
        matches!(*slot.owner.lock().expect("slot owner mutex poisoned"), Some(owner) if owner == thread)
    }

    /// Slow-path acquisition: scan for a FREE slot, CAS to RESERVED, open
    /// the remote session, transition to READY. Bounded retry on full pool
    /// (§4.4 step 3); returns `Busy` if every retry finds the pool full.
    pub fn acquire(&self, thread: ThreadId) -> CoreResult<SlotHandle> {
        for _ in 0..=TRYLOCK_RETRIES {
            self.acquire_attempts.fetch_add(1, Ordering::Relaxed);
            if let Some(handle) = self.try_acquire_once(thread)? {
                return Ok(handle);
            }
            std::thread::sleep(Duration::from_micros(TRYLOCK_RETRY_DELAY_MICROS));
        }
        Err(CoreError::Busy)
    }

    fn try_acquire_once(&self, thread: ThreadId) -> CoreResult<Option<SlotHandle>> {
        for (idx, slot) in self.slots.iter().enumerate() {
            if slot.state() != SlotState::Free {
                continue;
            }
            if !slot.cas_state(SlotState::Free, SlotState::Reserved) {
                continue;
            }
            *slot.owner.lock().expect("slot owner mutex poisoned") = Some(thread);
            let session = (self.open)();
            match session {
                Ok(conn) => {
                    *slot.connection.lock().expect("slot connection mutex poisoned") = Some(conn);
                    let generation = slot.generation.fetch_add(1, Ordering::AcqRel) + 1;
                    slot.state.store(SlotState::Ready as u32, Ordering::Release);
                    return Ok(Some(SlotHandle {
                        slot_index: idx,
                        generation,
                    }));
                }
                Err(e) => {
                    slot.state.store(SlotState::Error as u32, Ordering::Release);
                    return Err(e);
                }
            }
        }
        Ok(None)
    }

    /// Releases a slot back to FREE. A stale generation is rejected without
    /// any state transition (§8 scenario 6).
    pub fn release(&self, handle: SlotHandle) -> CoreResult<()> {
        let slot = self.slots.get(handle.slot_index).ok_or(CoreError::NotFound)?;
        if slot.generation.load(Ordering::Acquire) != handle.generation {
            return Err(CoreError::NotFound);
        }
        if !slot.cas_state(SlotState::Ready, SlotState::Free) {
            return Err(CoreError::Generic("slot not in READY state".to_string()));
        }
        *slot.connection.lock().expect("slot connection mutex poisoned") = None;
        *slot.owner.lock().expect("slot owner mutex poisoned") = None;
        Ok(())
    }

    /// Marks a slot ERROR after a session fault, then performs the single
    /// reconnect attempt described in §4.4 "Release".
    pub fn reconnect(&self, handle: SlotHandle) -> CoreResult<()> {
        let slot = self.slots.get(handle.slot_index).ok_or(CoreError::NotFound)?;
        if !slot.cas_state(SlotState::Error, SlotState::Reconnecting) {
            return Err(CoreError::Generic("slot not in ERROR state".to_string()));
        }
        match (self.open)() {
            Ok(conn) => {
                *slot.connection.lock().expect("slot connection mutex poisoned") = Some(conn);
                slot.state.store(SlotState::Ready as u32, Ordering::Release);
                Ok(())
            }
            Err(e) => {
                slot.state.store(SlotState::Error as u32, Ordering::Release);
                Err(e)
            }
        }
    }

    pub fn mark_errored(&self, handle: SlotHandle) {
        if let Some(slot) = self.slots.get(handle.slot_index) {
            slot.state.store(SlotState::Error as u32, Ordering::Release);
        }
    }

    pub fn with_connection<R>(&self, handle: SlotHandle, f: impl FnOnce(&mut S) -> R) -> CoreResult<R> {
        let slot = self.slots.get(handle.slot_index).ok_or(CoreError::NotFound)?;
        if slot.generation.load(Ordering::Acquire) != handle.generation {
            return Err(CoreError::NotFound);
        }
        let mut guard = slot.connection.lock().expect("slot connection mutex poisoned");
        let conn = guard.as_mut().ok_or(CoreError::ConnectionLost("slot has no session".to_string()))?;
        Ok(f(conn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSession;
    impl RemoteSession for FakeSession {}

    #[test]
    fn acquire_then_release_increments_generation_and_rejects_stale_release() {
        let pool = ConnectionPool::new(2, || Ok(FakeSession));
        let thread = std::thread::current().id();
        let h1 = pool.acquire(thread).unwrap();
        assert_eq!(h1.generation, 1);
        pool.release(h1).unwrap();

        let h2 = pool.acquire(thread).unwrap();
        assert_eq!(h2.generation, 2);
        assert_eq!(h2.slot_index, h1.slot_index);

        // Stale generation release is rejected, no transition occurs.
        assert!(pool.release(h1).is_err());
        assert!(pool.fast_path_valid(h2, thread));
    }

    #[test]
    fn pool_exhaustion_returns_busy() {
        let pool = ConnectionPool::new(1, || Ok(FakeSession));
        let thread = std::thread::current().id();
        let _h1 = pool.acquire(thread).unwrap();
        let err = pool.acquire(thread).unwrap_err();
        assert!(matches!(err, CoreError::Busy));
    }
}
