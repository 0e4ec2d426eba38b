// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Endian-aware scalar I/O shared by the message codec, header codec and OSD
//! binary serializer.
//!
//! [`Cursor`] is a bounds-checked, zero-copy reader over a borrowed byte
//! slice. All primitive message fields are little-endian on the wire except
//! `IPPort`, which is big-endian, and the datagram header's sequence number
//! and appended-ack list, which are big-endian per the header codec.

use crate::error::{Error, Result};

/// Generate bounds-checked little-endian read methods.
macro_rules! impl_read_le {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> Result<$type> {
            let bytes = self.read_bytes($size)?;
            let mut buf = [0u8; $size];
            buf.copy_from_slice(bytes);
            Ok(<$type>::from_le_bytes(buf))
        }
    };
}

/// Generate bounds-checked big-endian read methods.
macro_rules! impl_read_be {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> Result<$type> {
            let bytes = self.read_bytes($size)?;
            let mut buf = [0u8; $size];
            buf.copy_from_slice(bytes);
            Ok(<$type>::from_be_bytes(buf))
        }
    };
}

/// Bounds-checked, zero-copy reader over a borrowed byte slice.
pub struct Cursor<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    pub fn is_eof(&self) -> bool {
        self.offset >= self.buffer.len()
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.offset + len > self.buffer.len() {
            return Err(Error::Malformed(format!(
                "expected {len} bytes at offset {}, only {} remaining",
                self.offset,
                self.remaining()
            )));
        }
        let slice = &self.buffer[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    /// Read all remaining bytes without advancing past EOF.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let slice = &self.buffer[self.offset..];
        self.offset = self.buffer.len();
        slice
    }

    impl_read_le!(read_u8, u8, 1);
    impl_read_le!(read_u16_le, u16, 2);
    impl_read_le!(read_u32_le, u32, 4);
    impl_read_le!(read_u64_le, u64, 8);

    impl_read_be!(read_u16_be, u16, 2);
    impl_read_be!(read_u32_be, u32, 4);

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_i16_le(&mut self) -> Result<i16> {
        Ok(self.read_u16_le()? as i16)
    }

    pub fn read_i32_le(&mut self) -> Result<i32> {
        Ok(self.read_u32_le()? as i32)
    }

    pub fn read_f32_le(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32_le()?))
    }

    pub fn read_f64_le(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64_le()?))
    }
}

/// Write a little-endian sequence number... no; sequence numbers are
/// big-endian on the wire (header codec), scalars inside message bodies are
/// little-endian. Both directions are exposed as free functions for the
/// header/zero-coder, which operate on raw `Vec<u8>` buffers rather than a
/// cursor.
pub fn write_u32_be(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Pack a signed fixed-point value the way `pack_fixed` does for the layer
/// bit-packer, but byte-aligned: `(value + bias) * 2^frac_bits`, clamped to
/// the representable range. Exposed here because both the bit-packer and a
/// handful of message fields (unused by the catalogue in this crate, kept
/// for parity with the wire-level primitive set) rely on identical rounding.
pub fn quantize_fixed(value: f64, signed: bool, int_bits: u32, frac_bits: u32) -> u64 {
    let total_bits = int_bits + frac_bits + u32::from(signed);
    debug_assert!(total_bits <= 32, "pack_fixed total_bits must fit in 32 bits");
    let bias = if signed {
        f64::from(1u32 << int_bits)
    } else {
        0.0
    };
    let scaled = (value + bias) * f64::from(1u32 << frac_bits);
    let max = if total_bits >= 64 {
        u64::MAX
    } else {
        (1u64 << total_bits) - 1
    };
    scaled.round().clamp(0.0, max as f64) as u64
}

/// Inverse of [`quantize_fixed`].
pub fn dequantize_fixed(wire: u64, signed: bool, int_bits: u32, frac_bits: u32) -> f64 {
    let bias = if signed {
        f64::from(1u32 << int_bits)
    } else {
        0.0
    };
    (wire as f64) / f64::from(1u32 << frac_bits) - bias
}

/// Seconds-since-epoch as used by the binary OSD `Date` representation.
pub fn unix_seconds_f64(time: std::time::SystemTime) -> f64 {
    match time.duration_since(std::time::UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

/// Inverse of [`unix_seconds_f64`].
pub fn system_time_from_unix_seconds(secs: f64) -> std::time::SystemTime {
    if secs >= 0.0 {
        std::time::UNIX_EPOCH + std::time::Duration::from_secs_f64(secs)
    } else {
        std::time::UNIX_EPOCH - std::time::Duration::from_secs_f64(-secs)
    }
}

pub fn base64_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(data)
}

pub fn base64_decode(data: &str) -> Result<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| Error::Malformed(format!("invalid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_reads_mixed_endianness() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0x1234u16.to_le_bytes());
        buf.extend_from_slice(&0x5678u16.to_be_bytes());
        buf.push(0xAB);

        let mut cur = Cursor::new(&buf);
        assert_eq!(cur.read_u16_le().unwrap(), 0x1234);
        assert_eq!(cur.read_u16_be().unwrap(), 0x5678);
        assert_eq!(cur.read_u8().unwrap(), 0xAB);
        assert!(cur.is_eof());
    }

    #[test]
    fn cursor_read_overflow_is_malformed() {
        let buf = [0u8; 1];
        let mut cur = Cursor::new(&buf);
        cur.read_u8().unwrap();
        assert!(matches!(cur.read_u8(), Err(Error::Malformed(_))));
    }

    #[test]
    fn fixed_point_roundtrip_matches_scenario() {
        // pack_fixed(3.5, unsigned, int_bits=4, frac_bits=4) wire value is 0x38 (56).
        let wire = quantize_fixed(3.5, false, 4, 4);
        assert_eq!(wire, 56);
        let back = dequantize_fixed(wire, false, 4, 4);
        assert!((back - 3.5).abs() < 2f64.powi(-4));
    }

    #[test]
    fn base64_roundtrip() {
        let data = b"second life grid protocol";
        let encoded = base64_encode(data);
        let decoded = base64_decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn unix_seconds_roundtrip() {
        let t = std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000);
        let secs = unix_seconds_f64(t);
        let back = system_time_from_unix_seconds(secs);
        assert_eq!(
            back.duration_since(std::time::UNIX_EPOCH).unwrap().as_secs(),
            1_700_000_000
        );
    }
}
