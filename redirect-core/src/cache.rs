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

//! Translation cache (C3, §4.3). Per-thread, fixed power-of-two capacity,
//! linear probing bounded by a small constant. Lookup is a single hash plus
//! a bounded scan; eviction overwrites the oldest slot once the probe limit
//! is exhausted.

use redirect_sys::{TRANSLATION_CACHE_CAPACITY, TRANSLATION_CACHE_PROBE_LIMIT};

use crate::translate::Translation;

#[derive(Clone)]
struct Entry {
    fingerprint: u64,
    translation: Translation,
    age: u64,
}

pub struct TranslationCache {
    slots: Vec<Option<Entry>>,
    clock: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    max_probe_distance: usize,
}

impl Default for TranslationCache {
    fn default() -> Self {
        TranslationCache {
            slots: vec![None; TRANSLATION_CACHE_CAPACITY],
            clock: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
            max_probe_distance: 0,
        }
    }
}

impl TranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn home(&self, fingerprint: u64) -> usize {
        (fingerprint as usize) & (TRANSLATION_CACHE_CAPACITY - 1)
    }

    pub fn get(&mut self, fingerprint: u64) -> Option<&Translation> {
        let start = self.home(fingerprint);
        for probe in 0..TRANSLATION_CACHE_PROBE_LIMIT {
            let idx = (start + probe) & (TRANSLATION_CACHE_CAPACITY - 1);
            match &self.slots[idx] {
                Some(entry) if entry.fingerprint == fingerprint => {
                    self.hits += 1;
                    self.max_probe_distance = self.max_probe_distance.max(probe);
                    return Some(&self.slots[idx].as_ref().unwrap().translation);
                }
                Some(_) => continue,
                None => break,
            }
        }
        self.misses += 1;
        None
    }

    pub fn insert(&mut self, fingerprint: u64, translation: Translation) {
        let start = self.home(fingerprint);
        self.clock += 1;
        let mut oldest_idx = start;
        let mut oldest_age = u64::MAX;
        for probe in 0..TRANSLATION_CACHE_PROBE_LIMIT {
            let idx = (start + probe) & (TRANSLATION_CACHE_CAPACITY - 1);
            match &self.slots[idx] {
                None => {
                    self.slots[idx] = Some(Entry {
                        fingerprint,
                        translation,
                        age: self.clock,
                    });
                    return;
                }
                Some(entry) if entry.fingerprint == fingerprint => {
                    self.slots[idx] = Some(Entry {
                        fingerprint,
                        translation,
                        age: self.clock,
                    });
                    return;
                }
                Some(entry) if entry.age < oldest_age => {
                    oldest_age = entry.age;
                    oldest_idx = idx;
                }
                Some(_) => {}
            }
        }
        // Probe limit exhausted: overwrite the oldest slot seen (§4.3 "eviction on collision overwrite").
        self.evictions += 1;
        self.slots[oldest_idx] = Some(Entry {
            fingerprint,
            translation,
            age: self.clock,
        });
    }

    /// Snapshot of this thread's cache behaviour, surfaced by
    /// `redirect-cli --stats` and exercised directly by tests.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            max_probe_distance: self.max_probe_distance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub max_probe_distance: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "translation cache: {} hits, {} misses, {} evictions, max probe distance {}",
            self.hits, self.misses, self.evictions, self.max_probe_distance
        )
    }
}

thread_local! {
    pub static TRANSLATION_CACHE: std::cell::RefCell<TranslationCache> =
        std::cell::RefCell::new(TranslationCache::new());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::StatementClass;

    fn dummy(sql: &str, fp: u64) -> Translation {
        Translation {
            sql: sql.to_string(),
            param_names: Vec::new(),
            param_count: 0,
            fingerprint: fp,
            class: StatementClass::Read,
            succeeded: true,
        }
    }

    #[test]
    fn hit_after_insert() {
        let mut cache = TranslationCache::new();
        cache.insert(42, dummy("SELECT 1", 42));
        assert_eq!(cache.get(42).unwrap().sql, "SELECT 1");
    }

    #[test]
    fn miss_on_absent_fingerprint() {
        let mut cache = TranslationCache::new();
        assert!(cache.get(7).is_none());
    }

    #[test]
    fn stats_count_hits_and_misses() {
        let mut cache = TranslationCache::new();
        cache.insert(42, dummy("SELECT 1", 42));
        cache.get(42);
        cache.get(7);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn capacity_is_power_of_two() {
        assert_eq!(TRANSLATION_CACHE_CAPACITY & (TRANSLATION_CACHE_CAPACITY - 1), 0);
    }
}
