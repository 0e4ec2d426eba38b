// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structured-data codec (C4): the [`OsdValue`] tree plus four
//! interoperable serializations.

pub mod binary;
pub mod json;
pub mod notation;
pub mod value;
pub mod xml;

pub use value::OsdValue;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Binary,
    Notation,
    Xml,
    Json,
}

/// Case-insensitive header sniff used to pick a deserializer, per §4.4:
/// `<llsd>`/`<?xml` -> XML, `<? llsd/notation` -> notation,
/// `<? llsd/binary` -> binary, otherwise JSON.
pub fn detect_format(bytes: &[u8]) -> Format {
    let head: String = bytes
        .iter()
        .take(32)
        .map(|b| (*b as char).to_ascii_lowercase())
        .collect();
    if head.starts_with("<llsd>") || head.starts_with("<?xml") {
        Format::Xml
    } else if head.starts_with("<? llsd/notation") || head.starts_with("<?llsd/notation") {
        Format::Notation
    } else if head.starts_with("<? llsd/binary") || head.starts_with("<?llsd/binary") {
        Format::Binary
    } else {
        Format::Json
    }
}

pub fn parse(bytes: &[u8]) -> Result<OsdValue> {
    match detect_format(bytes) {
        Format::Xml => xml::parse(bytes),
        Format::Notation => notation::parse(bytes),
        Format::Binary => binary::parse(bytes),
        Format::Json => json::parse(bytes),
    }
}

pub fn emit(value: &OsdValue, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Xml => Ok(xml::emit(value)),
        Format::Notation => Ok(notation::emit(value)),
        Format::Binary => Ok(binary::emit(value)),
        Format::Json => json::emit(value),
    }
}

pub(crate) fn malformed(reason: impl Into<String>) -> Error {
    Error::Malformed(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_format_matches_headers() {
        assert_eq!(detect_format(b"<llsd><map/></llsd>"), Format::Xml);
        assert_eq!(detect_format(b"<?xml version=\"1.0\"?><llsd/>"), Format::Xml);
        assert_eq!(detect_format(b"<? llsd/notation\n!"), Format::Notation);
        assert_eq!(detect_format(b"<? llsd/binary\n"), Format::Binary);
        assert_eq!(detect_format(b"{\"a\":1}"), Format::Json);
    }
}
