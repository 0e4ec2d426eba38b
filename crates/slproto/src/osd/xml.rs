// SPDX-License-Identifier: Apache-2.0 OR MIT

//! XML-LLSD serializer, the interoperability baseline format. Root element
//! is `<llsd>`; the empty sentinel is `<?xml version="1.0"?><Empty></Empty>`.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::osd::malformed;
use crate::osd::value::{format_iso8601, parse_iso8601, OsdValue};

pub fn emit(value: &OsdValue) -> Vec<u8> {
    if matches!(value, OsdValue::Null) {
        return b"<?xml version=\"1.0\"?><Empty></Empty>".to_vec();
    }
    let mut out = String::from("<llsd>");
    write_value(value, &mut out);
    out.push_str("</llsd>");
    out.into_bytes()
}

fn write_value(value: &OsdValue, out: &mut String) {
    match value {
        OsdValue::Null => out.push_str("<undef/>"),
        OsdValue::Bool(b) => out.push_str(&format!("<boolean>{}</boolean>", if *b { 1 } else { 0 })),
        OsdValue::Int(i) => out.push_str(&format!("<integer>{i}</integer>")),
        OsdValue::Real(r) => out.push_str(&format!("<real>{r}</real>")),
        OsdValue::String(s) => out.push_str(&format!("<string>{}</string>", escape(s))),
        OsdValue::Uuid(u) => out.push_str(&format!("<uuid>{u}</uuid>")),
        OsdValue::Date(d) => out.push_str(&format!("<date>{}</date>", format_iso8601(*d))),
        OsdValue::Uri(s) => out.push_str(&format!("<uri>{}</uri>", escape(s))),
        OsdValue::Binary(b) => out.push_str(&format!(
            "<binary encoding=\"base64\">{}</binary>",
            crate::primitive::base64_encode(b)
        )),
        OsdValue::Array(items) => {
            out.push_str("<array>");
            for item in items {
                write_value(item, out);
            }
            out.push_str("</array>");
        }
        OsdValue::Map(map) => {
            out.push_str("<map>");
            for (key, val) in map {
                out.push_str(&format!("<key>{}</key>", escape(key)));
                write_value(val, out);
            }
            out.push_str("</map>");
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&apos;")
        .replace('"', "&quot;")
}

pub fn parse(bytes: &[u8]) -> Result<OsdValue> {
    let text = std::str::from_utf8(bytes).map_err(|e| malformed(format!("XML OSD is not valid utf-8: {e}")))?;
    let doc = roxmltree::Document::parse(text).map_err(|e| malformed(format!("XML OSD parse error: {e}")))?;
    let root = doc.root_element();
    if root.tag_name().name().eq_ignore_ascii_case("empty") {
        return Ok(OsdValue::Null);
    }
    let llsd_node = if root.tag_name().name().eq_ignore_ascii_case("llsd") {
        root.first_element_child()
            .ok_or_else(|| malformed("<llsd> root has no value child"))?
    } else {
        root
    };
    parse_node(llsd_node)
}

fn parse_node(node: roxmltree::Node) -> Result<OsdValue> {
    let tag = node.tag_name().name().to_ascii_lowercase();
    let text = node.text().unwrap_or("").to_string();
    Ok(match tag.as_str() {
        "undef" => OsdValue::Null,
        "boolean" => OsdValue::Bool(!(text.trim().is_empty() || text.trim() == "0" || text.trim().eq_ignore_ascii_case("false"))),
        "integer" => OsdValue::Int(text.trim().parse().unwrap_or(0)),
        "real" => OsdValue::Real(text.trim().parse().unwrap_or(0.0)),
        "string" => OsdValue::String(text),
        "uuid" => OsdValue::Uuid(uuid::Uuid::parse_str(text.trim()).unwrap_or_default()),
        "date" => OsdValue::Date(parse_iso8601(text.trim()).unwrap_or(std::time::UNIX_EPOCH)),
        "uri" => OsdValue::Uri(text),
        "binary" => OsdValue::Binary(crate::primitive::base64_decode(text.trim())?),
        "array" => {
            let mut items = Vec::new();
            for child in node.children().filter(|n| n.is_element()) {
                items.push(parse_node(child)?);
            }
            OsdValue::Array(items)
        }
        "map" => {
            let mut map = BTreeMap::new();
            let mut children = node.children().filter(|n| n.is_element());
            while let Some(key_node) = children.next() {
                if !key_node.tag_name().name().eq_ignore_ascii_case("key") {
                    return Err(malformed("expected <key> element in <map>"));
                }
                let key = key_node.text().unwrap_or("").to_string();
                let value_node = children
                    .next()
                    .ok_or_else(|| malformed("map key without a following value element"))?;
                map.insert(key, parse_node(value_node)?);
            }
            OsdValue::Map(map)
        }
        other => return Err(malformed(format!("unknown XML OSD element <{other}>"))),
    })
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
            OsdValue::Int(-5),
            OsdValue::Real(1.25),
            OsdValue::String("a & b <c>".into()),
            OsdValue::Uuid(uuid::Uuid::from_u128(77)),
            OsdValue::Uri("http://example.com".into()),
            OsdValue::Binary(vec![10, 20, 30]),
        ] {
            let encoded = emit(&value);
            assert_eq!(parse(&encoded).unwrap(), value);
        }
    }

    #[test]
    fn null_emits_the_empty_sentinel_not_an_llsd_undef() {
        let encoded = emit(&OsdValue::Null);
        assert_eq!(std::str::from_utf8(&encoded).unwrap(), "<?xml version=\"1.0\"?><Empty></Empty>");
        assert_eq!(parse(&encoded).unwrap(), OsdValue::Null);
    }

    #[test]
    fn map_and_array_roundtrip() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), OsdValue::Array(vec![OsdValue::Int(1), OsdValue::Bool(true), OsdValue::Null]));
        let value = OsdValue::Map(map);
        let encoded = emit(&value);
        assert_eq!(parse(&encoded).unwrap(), value);
    }
}
