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

//! The concrete [`RemoteSession`] over the `postgres` crate. Every value
//! crossing the trait boundary is textual (§6 "Result format is text
//! only"), so every column read back from the driver is converted to its
//! textual representation here regardless of the wire format the driver
//! itself negotiated for that column.

use std::collections::HashMap;
use std::error::Error as StdError;

use postgres::types::{FromSql, ToSql, Type};
use postgres::{Client, NoTls, Row};

use redirect_core::session::{ConnStatus, FieldValue, ParamFormat, RemoteResult, RemoteSession, SessionError};

use crate::config::Config;

/// A `FromSql` wrapper that accepts every OID and converts the column's raw
/// bytes to the same text the embedded engine decoders in
/// `redirect-core::decode` expect, instead of requiring one concrete Rust
/// type per query shape.
struct TextCell(Option<String>);

impl<'a> FromSql<'a> for TextCell {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Ok(TextCell(Some(decode_column_to_text(ty, raw))))
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Ok(TextCell(None))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

mod pg_oid {
    pub const BOOL: u32 = 16;
    pub const BYTEA: u32 = 17;
    pub const INT8: u32 = 20;
    pub const INT2: u32 = 21;
    pub const INT4: u32 = 23;
    pub const TEXT: u32 = 25;
    pub const OID: u32 = 26;
    pub const FLOAT4: u32 = 700;
    pub const FLOAT8: u32 = 701;
    pub const VARCHAR: u32 = 1043;
    pub const BPCHAR: u32 = 1042;
    pub const NUMERIC: u32 = 1700;
}

fn decode_column_to_text(ty: &Type, raw: &[u8]) -> String {
    match ty.oid() {
        pg_oid::BOOL => if raw.first() == Some(&1) { "t" } else { "f" }.to_string(),
        pg_oid::INT2 if raw.len() >= 2 => i16::from_be_bytes([raw[0], raw[1]]).to_string(),
        pg_oid::INT4 | pg_oid::OID if raw.len() >= 4 => i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]).to_string(),
        pg_oid::INT8 if raw.len() >= 8 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&raw[..8]);
            i64::from_be_bytes(buf).to_string()
        }
        pg_oid::FLOAT4 if raw.len() >= 4 => f32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]).to_string(),
        pg_oid::FLOAT8 if raw.len() >= 8 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&raw[..8]);
            f64::from_be_bytes(buf).to_string()
        }
        pg_oid::NUMERIC => decode_numeric(raw),
        pg_oid::BYTEA => format!("\\x{}", raw.iter().map(|b| format!("{b:02x}")).collect::<String>()),
        pg_oid::TEXT | pg_oid::VARCHAR | pg_oid::BPCHAR => String::from_utf8_lossy(raw).into_owned(),
        _ => String::from_utf8_lossy(raw).into_owned(),
    }
}

/// Decodes PostgreSQL's binary NUMERIC wire format: a big-endian header of
/// `(ndigits, weight, sign, dscale)` followed by `ndigits` base-10000
/// digit groups, most significant first.
fn decode_numeric(raw: &[u8]) -> String {
    if raw.len() < 8 {
        return "0".to_string();
    }
    let ndigits = u16::from_be_bytes([raw[0], raw[1]]) as usize;
    let weight = i16::from_be_bytes([raw[2], raw[3]]) as i32;
    let sign = u16::from_be_bytes([raw[4], raw[5]]);
    let dscale = u16::from_be_bytes([raw[6], raw[7]]) as usize;

    if sign == 0xC000 {
        return "NaN".to_string();
    }
    let negative = sign == 0x4000;

    let mut groups = Vec::with_capacity(ndigits);
    for i in 0..ndigits {
        let offset = 8 + i * 2;
        if offset + 1 >= raw.len() {
            break;
        }
        groups.push(u16::from_be_bytes([raw[offset], raw[offset + 1]]));
    }

    if groups.is_empty() {
        return if dscale == 0 { "0".to_string() } else { format!("0.{}", "0".repeat(dscale)) };
    }

    let unscaled: String = groups.iter().map(|g| format!("{g:04}")).collect();
    let decimal_shift = (weight - (groups.len() as i32 - 1)) * 4;

    let (int_part, frac_part) = if decimal_shift >= 0 {
        (format!("{unscaled}{}", "0".repeat(decimal_shift as usize)), String::new())
    } else {
        let frac_len = (-decimal_shift) as usize;
        if unscaled.len() <= frac_len {
            (String::new(), format!("{}{unscaled}", "0".repeat(frac_len - unscaled.len())))
        } else {
            let split = unscaled.len() - frac_len;
            (unscaled[..split].to_string(), unscaled[split..].to_string())
        }
    };

    let int_part = {
        let trimmed = int_part.trim_start_matches('0');
        if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() }
    };

    let frac_part = if frac_part.len() < dscale {
        format!("{frac_part}{}", "0".repeat(dscale - frac_part.len()))
    } else {
        frac_part[..dscale].to_string()
    };

    let mut result = String::new();
    if negative {
        result.push('-');
    }
    result.push_str(&int_part);
    if dscale > 0 {
        result.push('.');
        result.push_str(&frac_part);
    }
    result
}

fn rows_to_result(columns: &[postgres::Column], rows: &[Row]) -> Result<RemoteResult, SessionError> {
    let field_names = columns.iter().map(|c| c.name().to_string()).collect();
    let field_types = columns.iter().map(|c| c.type_().oid()).collect();
    let mut out_rows = Vec::with_capacity(rows.len());
    for row in rows {
        let mut out_row = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            let cell: TextCell = row.try_get(idx).map_err(|e| SessionError::Remote(e.to_string()))?;
            out_row.push(match cell.0 {
                Some(text) => FieldValue::Text(text),
                None => FieldValue::Null,
            });
        }
        out_rows.push(out_row);
    }
    Ok(RemoteResult {
        field_names,
        field_types,
        rows_affected: out_rows.len() as u64,
        rows: out_rows,
    })
}

/// Converts bound text parameters into `ToSql` trait objects. Every
/// parameter crosses the wire as text (§6), matching `Option<String>: ToSql`
/// directly — no per-type encoding is needed on the way in.
fn params_as_tosql(params: &[Option<String>]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

pub struct PgSession {
    client: Client,
    prepared: HashMap<String, postgres::Statement>,
}

impl PgSession {
    pub fn connect(config: &Config) -> Result<Self, SessionError> {
        let client = Client::connect(&config.connection_string(), NoTls).map_err(|e| SessionError::Remote(e.to_string()))?;
        Ok(PgSession {
            client,
            prepared: HashMap::new(),
        })
    }
}

impl RemoteSession for PgSession {
    fn exec(&mut self, sql: &str) -> Result<RemoteResult, SessionError> {
        let stmt = self.client.prepare(sql).map_err(|e| SessionError::Remote(e.to_string()))?;
        let rows = self.client.query(&stmt, &[]).map_err(|e| SessionError::Remote(e.to_string()))?;
        rows_to_result(stmt.columns(), &rows)
    }

    fn prepare(&mut self, name: &str, sql: &str) -> Result<(), SessionError> {
        let stmt = self.client.prepare(sql).map_err(|e| SessionError::Remote(e.to_string()))?;
        self.prepared.insert(name.to_string(), stmt);
        Ok(())
    }

    fn exec_prepared(&mut self, name: &str, params: &[Option<String>], _format: ParamFormat) -> Result<RemoteResult, SessionError> {
        let stmt = self
            .prepared
            .get(name)
            .ok_or_else(|| SessionError::Remote(format!("unknown prepared statement {name}")))?
            .clone();
        let refs = params_as_tosql(params);
        let rows = self.client.query(&stmt, &refs).map_err(|e| SessionError::Remote(e.to_string()))?;
        rows_to_result(stmt.columns(), &rows)
    }

    fn status(&self) -> ConnStatus {
        if self.client.is_closed() {
            ConnStatus::Bad
        } else {
            ConnStatus::Ok
        }
    }

    fn finish(&mut self) {
        self.prepared.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_decodes_positive_fraction() {
        // 12345.67 stored as digit groups [1, 2345, 6700] with weight 1, dscale 2.
        let mut raw = Vec::new();
        raw.extend_from_slice(&3i16.to_be_bytes());
        raw.extend_from_slice(&1i16.to_be_bytes());
        raw.extend_from_slice(&0x0000u16.to_be_bytes());
        raw.extend_from_slice(&2u16.to_be_bytes());
        raw.extend_from_slice(&1u16.to_be_bytes());
        raw.extend_from_slice(&2345u16.to_be_bytes());
        raw.extend_from_slice(&6700u16.to_be_bytes());
        assert_eq!(decode_numeric(&raw), "12345.67");
    }

    #[test]
    fn numeric_decodes_negative_integer() {
        // -42 stored as a single digit group [42] with weight 0, dscale 0.
        let mut raw = Vec::new();
        raw.extend_from_slice(&1i16.to_be_bytes());
        raw.extend_from_slice(&0i16.to_be_bytes());
        raw.extend_from_slice(&0x4000u16.to_be_bytes());
        raw.extend_from_slice(&0u16.to_be_bytes());
        raw.extend_from_slice(&42u16.to_be_bytes());
        assert_eq!(decode_numeric(&raw), "-42");
    }

    #[test]
    fn numeric_decodes_small_fraction_with_leading_zero() {
        // 0.0007 stored as a single digit group [7] with weight -1, dscale 4.
        let mut raw = Vec::new();
        raw.extend_from_slice(&1i16.to_be_bytes());
        raw.extend_from_slice(&(-1i16).to_be_bytes());
        raw.extend_from_slice(&0x0000u16.to_be_bytes());
        raw.extend_from_slice(&4u16.to_be_bytes());
        raw.extend_from_slice(&7u16.to_be_bytes());
        assert_eq!(decode_numeric(&raw), "0.0007");
    }

    #[test]
    fn bool_decodes_to_single_letter_textual_form() {
        assert_eq!(decode_column_to_text(&Type::BOOL, &[1]), "t");
        assert_eq!(decode_column_to_text(&Type::BOOL, &[0]), "f");
    }

    #[test]
    fn bytea_decodes_to_backslash_x_hex() {
        assert_eq!(decode_column_to_text(&Type::BYTEA, b"Hi"), "\\x4869");
    }
}
