// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The message descriptor's runtime counterpart: wire primitives, the
//! generated per-message codecs, and the packet-type catalogue.

pub mod packet_type;
pub mod types;
pub mod wire;

pub use packet_type::{decode_body, Frequency, Message, PacketType};
pub use wire::{
    Fixed, IpAddrField, IpPort, Quaternion, SlMessage, Var1, Var2, VarBytes1, VarBytes2, Vector3,
    Vector3d, Vector4, WireCodec, BODY_BUDGET,
};
