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

//! Non-cryptographic SQL fingerprinting (§3 "Translation", FNV-1a).

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// FNV-1a hash of `sql`, used as the translation-cache and loop-detector key.
pub fn fingerprint(sql: &str) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in sql.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Combine a fingerprint with bound-parameter hashes for the optional
/// query-result cache key (§3 "Query-result cache entry").
pub fn combine(base: u64, param_hashes: &[u64]) -> u64 {
    param_hashes.iter().fold(base, |acc, h| acc ^ h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_same_fingerprint() {
        assert_eq!(fingerprint("SELECT 1"), fingerprint("SELECT 1"));
    }

    #[test]
    fn different_input_almost_always_differs() {
        assert_ne!(fingerprint("SELECT 1"), fingerprint("SELECT 2"));
    }
}
