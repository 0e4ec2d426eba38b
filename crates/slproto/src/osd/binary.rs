// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binary OSD serializer: length-framed, big-endian, one-byte type tags.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::osd::malformed;
use crate::osd::value::OsdValue;
use crate::primitive::{system_time_from_unix_seconds, unix_seconds_f64};

const HEADER: &[u8] = b"<? llsd/binary\n";

const TAG_NULL: u8 = 0x00;
const TAG_BOOL: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_REAL: u8 = 0x03;
const TAG_STRING: u8 = 0x04;
const TAG_UUID: u8 = 0x05;
const TAG_DATE: u8 = 0x06;
const TAG_URI: u8 = 0x07;
const TAG_BINARY: u8 = 0x08;
const TAG_ARRAY: u8 = 0x09;
const TAG_MAP: u8 = 0x0A;

pub fn emit(value: &OsdValue) -> Vec<u8> {
    let mut out = HEADER.to_vec();
    encode_value(value, &mut out);
    out
}

fn encode_value(value: &OsdValue, out: &mut Vec<u8>) {
    match value {
        OsdValue::Null => out.push(TAG_NULL),
        OsdValue::Bool(b) => {
            out.push(TAG_BOOL);
            out.push(u8::from(*b));
        }
        OsdValue::Int(i) => {
            out.push(TAG_INT);
            out.extend_from_slice(&i.to_be_bytes());
        }
        OsdValue::Real(r) => {
            out.push(TAG_REAL);
            out.extend_from_slice(&r.to_be_bytes());
        }
        OsdValue::String(s) => encode_framed(out, TAG_STRING, s.as_bytes()),
        OsdValue::Uuid(u) => {
            out.push(TAG_UUID);
            out.extend_from_slice(u.as_bytes());
        }
        OsdValue::Date(d) => {
            out.push(TAG_DATE);
            out.extend_from_slice(&unix_seconds_f64(*d).to_be_bytes());
        }
        OsdValue::Uri(s) => encode_framed(out, TAG_URI, s.as_bytes()),
        OsdValue::Binary(b) => encode_framed(out, TAG_BINARY, b),
        OsdValue::Array(items) => {
            out.push(TAG_ARRAY);
            out.extend_from_slice(&(items.len() as u32).to_be_bytes());
            for item in items {
                encode_value(item, out);
            }
        }
        OsdValue::Map(map) => {
            out.push(TAG_MAP);
            out.extend_from_slice(&(map.len() as u32).to_be_bytes());
            for (key, val) in map {
                encode_framed_key(out, key.as_bytes());
                encode_value(val, out);
            }
        }
    }
}

fn encode_framed(out: &mut Vec<u8>, tag: u8, bytes: &[u8]) {
    out.push(tag);
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

fn encode_framed_key(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

pub fn parse(bytes: &[u8]) -> Result<OsdValue> {
    let body = strip_header(bytes);
    let mut pos = 0usize;
    let value = decode_value(body, &mut pos)?;
    Ok(value)
}

fn strip_header(bytes: &[u8]) -> &[u8] {
    if let Some(nl) = bytes.iter().position(|b| *b == b'\n') {
        let head = String::from_utf8_lossy(&bytes[..nl]).to_ascii_lowercase();
        if head.starts_with("<? llsd/binary") || head.starts_with("<?llsd/binary") {
            return &bytes[nl + 1..];
        }
    }
    bytes
}

fn take<'a>(bytes: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8]> {
    if *pos + len > bytes.len() {
        return Err(malformed("binary OSD stream truncated"));
    }
    let slice = &bytes[*pos..*pos + len];
    *pos += len;
    Ok(slice)
}

fn take_u32(bytes: &[u8], pos: &mut usize) -> Result<u32> {
    let slice = take(bytes, pos, 4)?;
    Ok(u32::from_be_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

fn decode_value(bytes: &[u8], pos: &mut usize) -> Result<OsdValue> {
    let tag = *bytes.get(*pos).ok_or_else(|| malformed("binary OSD stream ended before tag"))?;
    *pos += 1;
    Ok(match tag {
        TAG_NULL => OsdValue::Null,
        TAG_BOOL => OsdValue::Bool(take(bytes, pos, 1)?[0] != 0),
        TAG_INT => {
            let slice = take(bytes, pos, 4)?;
            OsdValue::Int(i32::from_be_bytes([slice[0], slice[1], slice[2], slice[3]]))
        }
        TAG_REAL => {
            let slice = take(bytes, pos, 8)?;
            let mut buf = [0u8; 8];
            buf.copy_from_slice(slice);
            OsdValue::Real(f64::from_be_bytes(buf))
        }
        TAG_STRING => OsdValue::String(decode_string(bytes, pos)?),
        TAG_UUID => {
            let slice = take(bytes, pos, 16)?;
            let mut buf = [0u8; 16];
            buf.copy_from_slice(slice);
            OsdValue::Uuid(uuid::Uuid::from_bytes(buf))
        }
        TAG_DATE => {
            let slice = take(bytes, pos, 8)?;
            let mut buf = [0u8; 8];
            buf.copy_from_slice(slice);
            OsdValue::Date(system_time_from_unix_seconds(f64::from_be_bytes(buf)))
        }
        TAG_URI => OsdValue::Uri(decode_string(bytes, pos)?),
        TAG_BINARY => {
            let len = take_u32(bytes, pos)? as usize;
            OsdValue::Binary(take(bytes, pos, len)?.to_vec())
        }
        TAG_ARRAY => {
            let count = take_u32(bytes, pos)? as usize;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(decode_value(bytes, pos)?);
            }
            OsdValue::Array(items)
        }
        TAG_MAP => {
            let count = take_u32(bytes, pos)? as usize;
            let mut map = BTreeMap::new();
            for _ in 0..count {
                let key = decode_string(bytes, pos)?;
                let val = decode_value(bytes, pos)?;
                map.insert(key, val);
            }
            OsdValue::Map(map)
        }
        other => return Err(malformed(format!("unknown binary OSD tag {other:#04x}"))),
    })
}

fn decode_string(bytes: &[u8], pos: &mut usize) -> Result<String> {
    let len = take_u32(bytes, pos)? as usize;
    let raw = take(bytes, pos, len)?;
    String::from_utf8(raw.to_vec()).map_err(|e| malformed(format!("invalid utf-8 in binary OSD string: {e}")))
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
            OsdValue::Int(-7),
            OsdValue::Real(3.5),
            OsdValue::String("hi".into()),
            OsdValue::Uuid(uuid::Uuid::from_u128(9)),
            OsdValue::Uri("http://example.com".into()),
            OsdValue::Binary(vec![1, 2, 3]),
        ] {
            let encoded = emit(&value);
            assert_eq!(parse(&encoded).unwrap(), value);
        }
    }

    #[test]
    fn nested_map_roundtrip() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), OsdValue::Array(vec![OsdValue::Int(1), OsdValue::Bool(true), OsdValue::Null]));
        let value = OsdValue::Map(map);
        let encoded = emit(&value);
        assert_eq!(parse(&encoded).unwrap(), value);
    }
}
