// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Wire traits and primitive field types shared by every generated message
//! and block.
//!
//! [`WireCodec`] is implemented once per primitive type and, via
//! `#[derive(SlBlock)]`, once per block struct by chaining its fields in
//! declaration order. [`SlMessage`] is the message-level counterpart,
//! produced by `#[derive(SlMessage)]`; it additionally knows how to split
//! itself across MTU boundaries and validate capacity before encoding.

use crate::error::{Error, Result};
use crate::primitive::Cursor;

/// Budget, in bytes, available to a message body before the appended-ack
/// tail and datagram header are accounted for by the circuit engine. Equal
/// to the wire MTU; the circuit engine subtracts header and ack overhead
/// separately when it decides whether a packet needs to be split further.
pub const BODY_BUDGET: usize = 1200;

/// A value that can be written to and read from a byte-oriented wire in a
/// fixed, self-delimiting way.
pub trait WireCodec: Sized {
    fn wire_len(&self) -> usize;
    fn write_wire(&self, out: &mut Vec<u8>);
    fn read_wire(cur: &mut Cursor<'_>) -> Result<Self>;
}

/// A complete protocol message: an ordered sequence of blocks.
pub trait SlMessage: Sized {
    /// Serialized body length in bytes, excluding the datagram header.
    fn length(&self) -> usize;
    /// Serialize the whole message into a single buffer.
    fn to_bytes(&self) -> Vec<u8>;
    /// Check declared capacities (e.g. a `Var1` block exceeding 255
    /// elements) before any bytes are produced.
    fn validate(&self) -> Result<()>;
    /// Serialize into one or more fragments, each individually within
    /// [`BODY_BUDGET`]. Messages with no `Variable`-multiplicity block
    /// always return a single fragment.
    fn to_bytes_multiple(&self) -> Vec<Vec<u8>>;
    /// Reconstruct a message from its body bytes (header already stripped).
    fn from_bytes(bytes: &[u8]) -> Result<Self>;
}

macro_rules! impl_wire_scalar {
    ($type:ty, $size:expr, $read:ident) => {
        impl WireCodec for $type {
            fn wire_len(&self) -> usize {
                $size
            }
            fn write_wire(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
            fn read_wire(cur: &mut Cursor<'_>) -> Result<Self> {
                cur.$read()
            }
        }
    };
}

impl_wire_scalar!(u8, 1, read_u8);
impl_wire_scalar!(i8, 1, read_i8);
impl_wire_scalar!(u16, 2, read_u16_le);
impl_wire_scalar!(i16, 2, read_i16_le);
impl_wire_scalar!(u32, 4, read_u32_le);
impl_wire_scalar!(i32, 4, read_i32_le);
impl_wire_scalar!(u64, 8, read_u64_le);
impl_wire_scalar!(f32, 4, read_f32_le);
impl_wire_scalar!(f64, 8, read_f64_le);

impl WireCodec for bool {
    fn wire_len(&self) -> usize {
        1
    }
    fn write_wire(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }
    fn read_wire(cur: &mut Cursor<'_>) -> Result<Self> {
        Ok(cur.read_u8()? != 0)
    }
}

/// Big-endian port field, distinct from every other little-endian integer
/// on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IpPort(pub u16);

impl WireCodec for IpPort {
    fn wire_len(&self) -> usize {
        2
    }
    fn write_wire(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0.to_be_bytes());
    }
    fn read_wire(cur: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self(cur.read_u16_be()?))
    }
}

/// Opaque 4-byte address field. Not byte-swapped: carried in the order the
/// host socket library presents it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IpAddrField(pub [u8; 4]);

impl WireCodec for IpAddrField {
    fn wire_len(&self) -> usize {
        4
    }
    fn write_wire(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0);
    }
    fn read_wire(cur: &mut Cursor<'_>) -> Result<Self> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(cur.read_bytes(4)?);
        Ok(Self(buf))
    }
}

impl WireCodec for uuid::Uuid {
    fn wire_len(&self) -> usize {
        16
    }
    fn write_wire(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }
    fn read_wire(cur: &mut Cursor<'_>) -> Result<Self> {
        let bytes = cur.read_bytes(16)?;
        let mut buf = [0u8; 16];
        buf.copy_from_slice(bytes);
        Ok(uuid::Uuid::from_bytes(buf))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl WireCodec for Vector3 {
    fn wire_len(&self) -> usize {
        12
    }
    fn write_wire(&self, out: &mut Vec<u8>) {
        self.x.write_wire(out);
        self.y.write_wire(out);
        self.z.write_wire(out);
    }
    fn read_wire(cur: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            x: f32::read_wire(cur)?,
            y: f32::read_wire(cur)?,
            z: f32::read_wire(cur)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl WireCodec for Vector3d {
    fn wire_len(&self) -> usize {
        24
    }
    fn write_wire(&self, out: &mut Vec<u8>) {
        self.x.write_wire(out);
        self.y.write_wire(out);
        self.z.write_wire(out);
    }
    fn read_wire(cur: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            x: f64::read_wire(cur)?,
            y: f64::read_wire(cur)?,
            z: f64::read_wire(cur)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl WireCodec for Vector4 {
    fn wire_len(&self) -> usize {
        16
    }
    fn write_wire(&self, out: &mut Vec<u8>) {
        self.x.write_wire(out);
        self.y.write_wire(out);
        self.z.write_wire(out);
        self.w.write_wire(out);
    }
    fn read_wire(cur: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            x: f32::read_wire(cur)?,
            y: f32::read_wire(cur)?,
            z: f32::read_wire(cur)?,
            w: f32::read_wire(cur)?,
        })
    }
}

/// Packs only X, Y, Z; W is reconstructed on decode as
/// `+sqrt(max(0, 1 - x^2 - y^2 - z^2))`. Never re-derive the sign: the wire
/// convention always yields a non-negative W.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl WireCodec for Quaternion {
    fn wire_len(&self) -> usize {
        12
    }
    fn write_wire(&self, out: &mut Vec<u8>) {
        self.x.write_wire(out);
        self.y.write_wire(out);
        self.z.write_wire(out);
    }
    fn read_wire(cur: &mut Cursor<'_>) -> Result<Self> {
        let x = f32::read_wire(cur)?;
        let y = f32::read_wire(cur)?;
        let z = f32::read_wire(cur)?;
        let w_sq = 1.0 - x * x - y * y - z * z;
        let w = w_sq.max(0.0).sqrt();
        Ok(Self { x, y, z, w })
    }
}

/// Exact-length raw byte field (`Fixed[n]` in the descriptor table).
#[derive(Debug, Clone, PartialEq)]
pub struct Fixed<const N: usize>(pub [u8; N]);

impl<const N: usize> Default for Fixed<N> {
    fn default() -> Self {
        Self([0u8; N])
    }
}

impl<const N: usize> WireCodec for Fixed<N> {
    fn wire_len(&self) -> usize {
        N
    }
    fn write_wire(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0);
    }
    fn read_wire(cur: &mut Cursor<'_>) -> Result<Self> {
        let bytes = cur.read_bytes(N)?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }
}

/// Length-prefixed byte field within a block, one-byte prefix (0..255).
/// Distinct from [`crate::message::Var1`], which wraps a `Vec` of whole
/// *blocks* at the message level rather than raw bytes within one block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VarBytes1(pub Vec<u8>);

impl WireCodec for VarBytes1 {
    fn wire_len(&self) -> usize {
        1 + self.0.len()
    }
    fn write_wire(&self, out: &mut Vec<u8>) {
        out.push(self.0.len().min(u8::MAX as usize) as u8);
        out.extend_from_slice(&self.0);
    }
    fn read_wire(cur: &mut Cursor<'_>) -> Result<Self> {
        let len = cur.read_u8()? as usize;
        Ok(Self(cur.read_bytes(len)?.to_vec()))
    }
}

/// Length-prefixed byte field within a block, two-byte little-endian prefix
/// (0..65535).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VarBytes2(pub Vec<u8>);

impl WireCodec for VarBytes2 {
    fn wire_len(&self) -> usize {
        2 + self.0.len()
    }
    fn write_wire(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.0.len().min(u16::MAX as usize) as u16).to_le_bytes());
        out.extend_from_slice(&self.0);
    }
    fn read_wire(cur: &mut Cursor<'_>) -> Result<Self> {
        let len = cur.read_u16_le()? as usize;
        Ok(Self(cur.read_bytes(len)?.to_vec()))
    }
}

impl<T: WireCodec, const N: usize> WireCodec for [T; N] {
    fn wire_len(&self) -> usize {
        self.iter().map(WireCodec::wire_len).sum()
    }
    fn write_wire(&self, out: &mut Vec<u8>) {
        for item in self {
            item.write_wire(out);
        }
    }
    fn read_wire(cur: &mut Cursor<'_>) -> Result<Self> {
        let mut items: Vec<T> = Vec::with_capacity(N);
        for _ in 0..N {
            items.push(T::read_wire(cur)?);
        }
        items
            .try_into()
            .map_err(|_| Error::Malformed("fixed-length array field truncated".into()))
    }
}

/// Message-level block-multiplicity wrapper with a 1-byte runtime count
/// prefix (0..255). Detected by name in `#[derive(SlMessage)]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Var1<T>(pub Vec<T>);

/// Message-level block-multiplicity wrapper with a 2-byte little-endian
/// runtime count prefix (0..65535). Detected by name in
/// `#[derive(SlMessage)]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Var2<T>(pub Vec<T>);
