// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Notation OSD serializer: `i`/`r`/`s`/`u`/`d`/`b` sigils plus `[...]` and
//! `{...}` containers.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::osd::malformed;
use crate::osd::value::{format_iso8601, parse_iso8601, OsdValue};

pub fn emit(value: &OsdValue) -> Vec<u8> {
    let mut out = String::new();
    write_value(value, &mut out);
    out.into_bytes()
}

fn write_value(value: &OsdValue, out: &mut String) {
    match value {
        OsdValue::Null => out.push('!'),
        OsdValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        OsdValue::Int(i) => out.push_str(&format!("i{i}")),
        OsdValue::Real(r) => out.push_str(&format!("r{r}")),
        OsdValue::String(s) => write_quoted(s, out),
        OsdValue::Uuid(u) => out.push_str(&format!("u{u}")),
        OsdValue::Date(d) => out.push_str(&format!("d\"{}\"", format_iso8601(*d))),
        OsdValue::Uri(s) => out.push_str(&format!("l\"{s}\"")),
        OsdValue::Binary(b) => out.push_str(&format!("b64\"{}\"", crate::primitive::base64_encode(b))),
        OsdValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        OsdValue::Map(map) => {
            out.push('{');
            for (i, (key, val)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_quoted(key, out);
                out.push(':');
                write_value(val, out);
            }
            out.push('}');
        }
    }
}

fn write_quoted(s: &str, out: &mut String) {
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('\'');
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && (self.bytes[self.pos] as char).is_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(malformed(format!("expected '{}' at offset {}", byte as char, self.pos)))
        }
    }

    fn starts_with(&self, lit: &str) -> bool {
        self.bytes[self.pos..].starts_with(lit.as_bytes())
    }

    fn read_quoted(&mut self) -> Result<String> {
        let quote = self.peek().ok_or_else(|| malformed("expected quoted string"))?;
        self.pos += 1;
        let mut s = String::new();
        loop {
            let c = *self.bytes.get(self.pos).ok_or_else(|| malformed("unterminated quoted string"))?;
            self.pos += 1;
            if c == b'\\' {
                let escaped = *self.bytes.get(self.pos).ok_or_else(|| malformed("dangling escape"))?;
                self.pos += 1;
                s.push(escaped as char);
            } else if c == quote {
                break;
            } else {
                s.push(c as char);
            }
        }
        Ok(s)
    }

    fn read_number_token(&mut self) -> String {
        let start = self.pos;
        if self.peek() == Some(b'-') || self.peek() == Some(b'+') {
            self.pos += 1;
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == b'.' || c == b'e' || c == b'E' || c == b'-' || c == b'+' {
                self.pos += 1;
            } else {
                break;
            }
        }
        String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned()
    }

    fn parse_value(&mut self) -> Result<OsdValue> {
        self.skip_ws();
        match self.peek().ok_or_else(|| malformed("unexpected end of notation input"))? {
            b'!' => {
                self.pos += 1;
                Ok(OsdValue::Null)
            }
            b'i' => {
                self.pos += 1;
                let tok = self.read_number_token();
                Ok(OsdValue::Int(tok.parse().unwrap_or(0)))
            }
            b'r' => {
                self.pos += 1;
                let tok = self.read_number_token();
                Ok(OsdValue::Real(tok.parse().unwrap_or(0.0)))
            }
            b'u' => {
                self.pos += 1;
                let start = self.pos;
                while self.pos < self.bytes.len() && self.bytes[self.pos] != b',' && self.bytes[self.pos] != b']' && self.bytes[self.pos] != b'}' {
                    self.pos += 1;
                }
                let text = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
                Ok(OsdValue::Uuid(uuid::Uuid::parse_str(text.trim()).unwrap_or_default()))
            }
            b'd' => {
                self.pos += 1;
                let text = self.read_quoted()?;
                Ok(OsdValue::Date(parse_iso8601(&text).unwrap_or(std::time::UNIX_EPOCH)))
            }
            b'l' => {
                self.pos += 1;
                Ok(OsdValue::Uri(self.read_quoted()?))
            }
            b'\'' | b'"' => Ok(OsdValue::String(self.read_quoted()?)),
            b't' if self.starts_with("true") => {
                self.pos += 4;
                Ok(OsdValue::Bool(true))
            }
            b'f' if self.starts_with("false") => {
                self.pos += 5;
                Ok(OsdValue::Bool(false))
            }
            b'b' if self.starts_with("b64") => {
                self.pos += 3;
                let text = self.read_quoted()?;
                Ok(OsdValue::Binary(crate::primitive::base64_decode(&text)?))
            }
            b'[' => {
                self.pos += 1;
                let mut items = Vec::new();
                self.skip_ws();
                if self.peek() == Some(b']') {
                    self.pos += 1;
                    return Ok(OsdValue::Array(items));
                }
                loop {
                    items.push(self.parse_value()?);
                    self.skip_ws();
                    match self.peek() {
                        Some(b',') => {
                            self.pos += 1;
                        }
                        Some(b']') => {
                            self.pos += 1;
                            break;
                        }
                        _ => return Err(malformed("expected ',' or ']' in notation array")),
                    }
                }
                Ok(OsdValue::Array(items))
            }
            b'{' => {
                self.pos += 1;
                let mut map = BTreeMap::new();
                self.skip_ws();
                if self.peek() == Some(b'}') {
                    self.pos += 1;
                    return Ok(OsdValue::Map(map));
                }
                loop {
                    self.skip_ws();
                    let key = self.read_quoted()?;
                    self.skip_ws();
                    self.expect(b':')?;
                    let value = self.parse_value()?;
                    map.insert(key, value);
                    self.skip_ws();
                    match self.peek() {
                        Some(b',') => {
                            self.pos += 1;
                        }
                        Some(b'}') => {
                            self.pos += 1;
                            break;
                        }
                        _ => return Err(malformed("expected ',' or '}' in notation map")),
                    }
                }
                Ok(OsdValue::Map(map))
            }
            other => Err(malformed(format!("unexpected notation token '{}'", other as char))),
        }
    }
}

pub fn parse(bytes: &[u8]) -> Result<OsdValue> {
    let mut parser = Parser { bytes, pos: 0 };
    parser.skip_ws();
    if parser.starts_with("<? llsd/notation") || parser.starts_with("<?llsd/notation") {
        if let Some(nl) = bytes[parser.pos..].iter().position(|b| *b == b'\n') {
            parser.pos += nl + 1;
        }
    }
    parser.parse_value()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn scalar_roundtrip() {
        for value in [
            OsdValue::Null,
            OsdValue::Bool(true),
            OsdValue::Bool(false),
            OsdValue::Int(-42),
            OsdValue::Real(2.5),
            OsdValue::String("hello world".into()),
            OsdValue::Uuid(uuid::Uuid::from_u128(3)),
            OsdValue::Uri("http://example.com/x".into()),
            OsdValue::Binary(vec![5, 6, 7]),
        ] {
            let encoded = emit(&value);
            let decoded = parse(&encoded).unwrap();
            match (&value, &decoded) {
                (OsdValue::Real(a), OsdValue::Real(b)) => assert!((a - b).abs() < 1e-9),
                _ => assert_eq!(value, decoded),
            }
        }
    }

    #[test]
    fn nested_container_roundtrip() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), OsdValue::Array(vec![OsdValue::Int(1), OsdValue::Bool(true), OsdValue::Null]));
        let value = OsdValue::Map(map);
        let encoded = emit(&value);
        assert_eq!(parse(&encoded).unwrap(), value);
    }

    #[test]
    fn escaped_quote_in_string_roundtrip() {
        let value = OsdValue::String("it's a test".into());
        let encoded = emit(&value);
        assert_eq!(parse(&encoded).unwrap(), value);
    }
}
