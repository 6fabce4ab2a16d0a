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

//! Stage 11: operator-spacing fixup (§4.2 item 11).
//!
//! The embedded engine's tokenizer accepts `a=-1` (treating `=-` as two
//! tokens); the remote parser's tokenizer reads `=-` as a single unknown
//! operator. A space is inserted between a comparison operator and an
//! immediately following unary minus/plus on a numeric literal.

const OPERATORS: &[&str] = &["<=", ">=", "<>", "!=", "=", "<", ">"];

pub fn apply_operator_spacing(sql: &str) -> String {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len() + 4);
    let mut i = 0usize;
    'outer: while i < bytes.len() {
        if matches!(bytes[i], b'\'' | b'"') {
            let quote = bytes[i];
            out.push(bytes[i] as char);
            i += 1;
            while i < bytes.len() {
                out.push(bytes[i] as char);
                if bytes[i] == quote {
                    i += 1;
                    break;
                }
                i += 1;
            }
            continue;
        }
        for op in OPERATORS {
            let ob = op.as_bytes();
            if sql[i..].as_bytes().starts_with(ob) {
                out.push_str(op);
                let after = i + ob.len();
                if matches!(bytes.get(after), Some(b'-') | Some(b'+'))
                    && bytes
                        .get(after + 1)
                        .is_some_and(|b| b.is_ascii_digit())
                {
                    out.push(' ');
                }
                i = after;
                continue 'outer;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equals_minus_gets_a_space() {
        assert_eq!(apply_operator_spacing("WHERE a=-1"), "WHERE a= -1");
    }

    #[test]
    fn less_equal_plus_gets_a_space() {
        assert_eq!(apply_operator_spacing("WHERE a<=+5"), "WHERE a<= +5");
    }

    #[test]
    fn ordinary_subtraction_is_untouched() {
        assert_eq!(apply_operator_spacing("a - 1"), "a - 1");
    }

    #[test]
    fn string_literal_contents_are_untouched() {
        assert_eq!(apply_operator_spacing("WHERE a='=-1'"), "WHERE a='=-1'");
    }
}
