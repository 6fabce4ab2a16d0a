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

//! Result-value decoders (C8, §4.8). Stateless transforms from the
//! PostgreSQL text protocol into the embedded engine's four value kinds.

use redirect_sys::{SQLITE_BLOB, SQLITE_FLOAT, SQLITE_INTEGER, SQLITE_NULL, SQLITE_TEXT};

/// Well-known OIDs the decoder needs to distinguish (subset of pg_type).
mod oid {
    pub const BOOL: u32 = 16;
    pub const INT8: u32 = 20;
    pub const INT2: u32 = 21;
    pub const INT4: u32 = 23;
    pub const OID: u32 = 26;
    pub const FLOAT4: u32 = 700;
    pub const FLOAT8: u32 = 701;
    pub const NUMERIC: u32 = 1700;
    pub const BYTEA: u32 = 17;
}

/// Maps a server type OID to one of the four source-engine value kinds
/// (§4.8 "Type accessor").
pub fn value_kind_for_oid(type_oid: u32) -> i32 {
    match type_oid {
        oid::BOOL | oid::INT8 | oid::INT2 | oid::INT4 | oid::OID => SQLITE_INTEGER,
        oid::FLOAT4 | oid::FLOAT8 | oid::NUMERIC => SQLITE_FLOAT,
        oid::BYTEA => SQLITE_BLOB,
        _ => SQLITE_TEXT,
    }
}

pub fn decode_type(value: Option<&str>, type_oid: u32) -> i32 {
    if value.is_none() {
        return SQLITE_NULL;
    }
    value_kind_for_oid(type_oid)
}

/// Integer accessor decode (§4.8): `t`→1, `f`→0, else decimal parse.
pub fn decode_int(value: &str) -> i64 {
    match value {
        "t" => 1,
        "f" => 0,
        other => other.parse::<i64>().unwrap_or(0),
    }
}

/// Float accessor decode (§4.8): `t`→1.0, `f`→0.0, else decimal parse.
pub fn decode_float(value: &str) -> f64 {
    match value {
        "t" => 1.0,
        "f" => 0.0,
        other => other.parse::<f64>().unwrap_or(0.0),
    }
}

const HEX_LOOKUP: [i8; 256] = build_hex_lookup();

const fn build_hex_lookup() -> [i8; 256] {
    let mut table = [-1i8; 256];
    let mut i = 0u8;
    loop {
        let v: i8 = match i {
            b'0'..=b'9' => (i - b'0') as i8,
            b'a'..=b'f' => (i - b'a' + 10) as i8,
            b'A'..=b'F' => (i - b'A' + 10) as i8,
            _ => -1,
        };
        table[i as usize] = v;
        if i == 255 {
            break;
        }
        i += 1;
    }
    table
}

/// Decodes a BYTEA textual field (`\x48656c6c6f`) into raw bytes via the
/// 256-entry hex lookup table (§4.8 "decode `\x…` hex via the lookup
/// table and cache").
pub fn decode_bytea_hex(text: &str) -> Vec<u8> {
    let stripped = text.strip_prefix("\\x").unwrap_or(text);
    let bytes = stripped.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() / 2);
    let mut i = 0;
    while i + 1 < bytes.len() {
        let hi = HEX_LOOKUP[bytes[i] as usize];
        let lo = HEX_LOOKUP[bytes[i + 1] as usize];
        if hi < 0 || lo < 0 {
            break;
        }
        out.push(((hi as u8) << 4) | (lo as u8));
        i += 2;
    }
    out
}

/// Per-row, per-column decoded cache. Invalidated wholesale whenever the
/// cursor advances (§4.8 "Cache invalidation").
#[derive(Default)]
pub struct RowCache {
    text: Vec<Option<String>>,
    blob: Vec<Option<Vec<u8>>>,
}

impl RowCache {
    pub fn for_columns(n: usize) -> Self {
        RowCache {
            text: vec![None; n],
            blob: vec![None; n],
        }
    }

    pub fn invalidate(&mut self) {
        self.text.iter_mut().for_each(|c| *c = None);
        self.blob.iter_mut().for_each(|c| *c = None);
    }

    pub fn text(&mut self, col: usize, raw: &str) -> &str {
        if self.text[col].is_none() {
            self.text[col] = Some(raw.to_string());
        }
        self.text[col].as_deref().unwrap()
    }

    pub fn blob(&mut self, col: usize, raw: &str, type_oid: u32) -> &[u8] {
        if self.blob[col].is_none() {
            let decoded = if type_oid == oid::BYTEA {
                decode_bytea_hex(raw)
            } else {
                raw.as_bytes().to_vec()
            };
            self.blob[col] = Some(decoded);
        }
        self.blob[col].as_deref().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_text_decodes_for_integer_accessor() {
        assert_eq!(decode_int("t"), 1);
        assert_eq!(decode_int("f"), 0);
        assert_eq!(decode_int("42"), 42);
    }

    #[test]
    fn boolean_text_decodes_for_float_accessor() {
        assert_eq!(decode_float("t"), 1.0);
        assert_eq!(decode_float("f"), 0.0);
    }

    #[test]
    fn bytea_hex_round_trips() {
        assert_eq!(decode_bytea_hex("\\x48656c6c6f"), b"Hello".to_vec());
    }

    #[test]
    fn oid_maps_to_expected_kind() {
        assert_eq!(value_kind_for_oid(23), SQLITE_INTEGER);
        assert_eq!(value_kind_for_oid(701), SQLITE_FLOAT);
        assert_eq!(value_kind_for_oid(17), SQLITE_BLOB);
        assert_eq!(value_kind_for_oid(25), SQLITE_TEXT);
    }

    #[test]
    fn row_cache_invalidate_clears_entries() {
        let mut cache = RowCache::for_columns(2);
        cache.text(0, "hello");
        cache.invalidate();
        // after invalidation the cache recomputes rather than reusing stale data
        assert_eq!(cache.text(0, "world"), "world");
    }
}
