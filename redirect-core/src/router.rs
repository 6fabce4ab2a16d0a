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

//! Per-database router (C10, §4.10). A whitelist of filename substrings
//! decides whether an opened file is intercepted; the host's opaque DB
//! handle is associated with an acquired pool connection via a small map.

use std::collections::HashMap;

use crate::pool::SlotHandle;

pub struct Router {
    whitelist: Vec<String>,
    handles: HashMap<u64, SlotHandle>,
}

impl Router {
    pub fn new(whitelist: Vec<String>) -> Self {
        Router {
            whitelist,
            handles: HashMap::new(),
        }
    }

    /// Whether `filename` names an intercepted database (§4.10: "a
    /// whitelist of filename substrings").
    pub fn is_intercepted(&self, filename: &str) -> bool {
        self.whitelist.iter().any(|pat| filename.contains(pat.as_str()))
    }

    /// Associates the host's opaque DB handle (its raw pointer value cast
    /// to `u64`, or any other stable identity the ABI layer chooses) with
    /// the pool slot acquired on attach.
    pub fn attach(&mut self, host_handle: u64, slot: SlotHandle) {
        self.handles.insert(host_handle, slot);
    }

    pub fn lookup(&self, host_handle: u64) -> Option<SlotHandle> {
        self.handles.get(&host_handle).copied()
    }

    /// Removes the association on detach (close-family call); the pool
    /// connection itself is released by the caller, not destroyed here.
    pub fn detach(&mut self, host_handle: u64) -> Option<SlotHandle> {
        self.handles.remove(&host_handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_match_on_whitelist() {
        let router = Router::new(vec!["com.plexapp.plugins".to_string()]);
        assert!(router.is_intercepted("/data/com.plexapp.plugins.library.db"));
        assert!(!router.is_intercepted("/data/other.db"));
    }

    #[test]
    fn attach_then_detach_removes_association() {
        let mut router = Router::new(vec!["library".to_string()]);
        let slot = SlotHandle {
            slot_index: 0,
            generation: 1,
        };
        router.attach(42, slot);
        assert_eq!(router.lookup(42), Some(slot));
        assert_eq!(router.detach(42), Some(slot));
        assert_eq!(router.lookup(42), None);
    }
}
