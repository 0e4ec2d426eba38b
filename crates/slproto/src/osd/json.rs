// SPDX-License-Identifier: Apache-2.0 OR MIT

//! JSON OSD serializer. Maps onto conventional JSON with two extensions:
//! binary encodes as a base64 string, UUID/Date encode as plain strings.
//! These three types and `Uri` are therefore write-only through this
//! serializer: a round trip through JSON recovers a [`OsdValue::String`],
//! never the original variant. Use binary, notation or XML when exact
//! type fidelity for those variants matters.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::Result;
use crate::osd::malformed;
use crate::osd::value::{format_iso8601, OsdValue};

pub fn emit(value: &OsdValue) -> Result<Vec<u8>> {
    let json = to_json(value);
    serde_json::to_vec(&json).map_err(|e| malformed(format!("JSON OSD encode failed: {e}")))
}

fn to_json(value: &OsdValue) -> Value {
    match value {
        OsdValue::Null => Value::Null,
        OsdValue::Bool(b) => Value::Bool(*b),
        OsdValue::Int(i) => Value::from(*i),
        OsdValue::Real(r) => serde_json::Number::from_f64(*r).map(Value::Number).unwrap_or(Value::Null),
        OsdValue::String(s) | OsdValue::Uri(s) => Value::String(s.clone()),
        OsdValue::Uuid(u) => Value::String(u.to_string()),
        OsdValue::Date(d) => Value::String(format_iso8601(*d)),
        OsdValue::Binary(b) => Value::String(crate::primitive::base64_encode(b)),
        OsdValue::Array(items) => Value::Array(items.iter().map(to_json).collect()),
        OsdValue::Map(map) => {
            Value::Object(map.iter().map(|(k, v)| (k.clone(), to_json(v))).collect())
        }
    }
}

pub fn parse(bytes: &[u8]) -> Result<OsdValue> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| malformed(format!("JSON OSD parse failed: {e}")))?;
    Ok(from_json(&value))
}

fn from_json(value: &Value) -> OsdValue {
    match value {
        Value::Null => OsdValue::Null,
        Value::Bool(b) => OsdValue::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i >= i64::from(i32::MIN) && i <= i64::from(i32::MAX) {
                    OsdValue::Int(i as i32)
                } else {
                    OsdValue::Real(i as f64)
                }
            } else {
                OsdValue::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => OsdValue::String(s.clone()),
        Value::Array(items) => OsdValue::Array(items.iter().map(from_json).collect()),
        Value::Object(map) => {
            let mut out = BTreeMap::new();
            for (k, v) in map {
                out.insert(k.clone(), from_json(v));
            }
            OsdValue::Map(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn scenario_nested_array_roundtrip() {
        let mut map = BTreeMap::new();
        map.insert(
            "a".to_string(),
            OsdValue::Array(vec![OsdValue::Int(1), OsdValue::Bool(true), OsdValue::Null]),
        );
        let value = OsdValue::Map(map);
        let encoded = emit(&value).unwrap();
        assert_eq!(encoded, br#"{"a":[1,true,null]}"#.to_vec());
        assert_eq!(parse(&encoded).unwrap(), value);
    }

    #[test]
    fn uuid_and_date_are_lossy_through_json() {
        let value = OsdValue::Uuid(uuid::Uuid::from_u128(42));
        let encoded = emit(&value).unwrap();
        let decoded = parse(&encoded).unwrap();
        assert_eq!(decoded, OsdValue::String(value.as_string()));
    }

    #[test]
    fn real_roundtrips_through_f64() {
        let value = OsdValue::Real(3.14159);
        let encoded = emit(&value).unwrap();
        match parse(&encoded).unwrap() {
            OsdValue::Real(r) => assert!((r - 3.14159).abs() < 1e-9),
            other => panic!("expected Real, got {other:?}"),
        }
    }
}
