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

//! Prepared-statement cache (C5, §4.5). Per-connection map from SQL
//! fingerprint to a server-assigned prepared-statement name. Discarded
//! whole on reconnect (§4.4 "the whole cache is discarded").

use std::collections::HashMap;

pub struct PreparedStatementCache {
    by_fingerprint: HashMap<u64, String>,
    next_id: u64,
}

impl Default for PreparedStatementCache {
    fn default() -> Self {
        PreparedStatementCache {
            by_fingerprint: HashMap::new(),
            next_id: 0,
        }
    }
}

impl PreparedStatementCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, fingerprint: u64) -> Option<&str> {
        self.by_fingerprint.get(&fingerprint).map(|s| s.as_str())
    }

    /// Returns the server-side name to prepare under, allocating one if
    /// this fingerprint has not been seen on this connection before.
    pub fn name_for(&mut self, fingerprint: u64) -> (String, bool) {
        if let Some(name) = self.by_fingerprint.get(&fingerprint) {
            return (name.clone(), true);
        }
        let name = format!("redirect_stmt_{}", self.next_id);
        self.next_id += 1;
        self.by_fingerprint.insert(fingerprint, name.clone());
        (name, false)
    }

    /// Invalidates the whole cache; called on session reconnect.
    pub fn clear(&mut self) {
        self.by_fingerprint.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_fingerprint_reuses_name_and_reports_hit() {
        let mut cache = PreparedStatementCache::new();
        let (name1, hit1) = cache.name_for(7);
        assert!(!hit1);
        let (name2, hit2) = cache.name_for(7);
        assert!(hit2);
        assert_eq!(name1, name2);
    }

    #[test]
    fn clear_discards_all_entries() {
        let mut cache = PreparedStatementCache::new();
        cache.name_for(1);
        cache.clear();
        assert!(cache.lookup(1).is_none());
    }
}
