// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-datagram header codec (C6): flags, sequence, extra bytes, message id,
//! and the appended-ack tail.
//!
//! Layout on the wire:
//! `[flags:1][sequence:4 BE][extra_len:1][extra bytes][message id][payload][ack tail]`.
//! The ack tail is present only when the appended-acks flag is set.

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::message::{Frequency, PacketType};

bitflags! {
    /// The datagram's single flags byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HeaderFlags: u8 {
        const ZEROCODED = 0x80;
        const RELIABLE = 0x40;
        const RESENT = 0x20;
        const APPENDED_ACKS = 0x10;
    }
}

pub const FLAG_ZEROCODED: u8 = HeaderFlags::ZEROCODED.bits();
pub const FLAG_RELIABLE: u8 = HeaderFlags::RELIABLE.bits();
pub const FLAG_RESENT: u8 = HeaderFlags::RESENT.bits();
pub const FLAG_APPENDED_ACKS: u8 = HeaderFlags::APPENDED_ACKS.bits();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub reliable: bool,
    pub resent: bool,
    pub zerocoded: bool,
    pub sequence: u32,
    pub extra: Vec<u8>,
    pub packet_type: PacketType,
    pub appended_acks: Vec<u32>,
}

impl Header {
    pub fn new(packet_type: PacketType, sequence: u32) -> Self {
        Self {
            reliable: false,
            resent: false,
            zerocoded: false,
            sequence,
            extra: Vec::new(),
            packet_type,
            appended_acks: Vec::new(),
        }
    }

    fn flags(&self) -> HeaderFlags {
        let mut flags = HeaderFlags::empty();
        flags.set(HeaderFlags::ZEROCODED, self.zerocoded);
        flags.set(HeaderFlags::RELIABLE, self.reliable);
        flags.set(HeaderFlags::RESENT, self.resent);
        flags.set(HeaderFlags::APPENDED_ACKS, !self.appended_acks.is_empty());
        flags
    }

    /// Encode the header, a (possibly already zero-coded) payload, and the
    /// appended-ack tail into one datagram. Both `extra` and
    /// `appended_acks` are counted by a single wire byte, so more than 255
    /// of either is an error rather than a silent truncation that would
    /// desync `decode`'s boundary math from the bytes actually written.
    pub fn encode(&self, payload: &[u8]) -> Result<Vec<u8>> {
        if self.extra.len() > u8::MAX as usize {
            return Err(Error::Malformed(format!("extra header bytes ({}) exceed 255", self.extra.len())));
        }
        if self.appended_acks.len() > u8::MAX as usize {
            return Err(Error::Malformed(format!(
                "appended acks ({}) exceed 255 per datagram",
                self.appended_acks.len()
            )));
        }
        let mut out = Vec::with_capacity(10 + self.extra.len() + payload.len() + self.appended_acks.len() * 4 + 1);
        out.push(self.flags().bits());
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out.push(self.extra.len() as u8);
        out.extend_from_slice(&self.extra);
        encode_message_id(&mut out, self.packet_type);
        out.extend_from_slice(payload);
        if !self.appended_acks.is_empty() {
            for ack in &self.appended_acks {
                out.extend_from_slice(&ack.to_be_bytes());
            }
            out.push(self.appended_acks.len() as u8);
        }
        Ok(out)
    }

    /// Decode a header and return it alongside the remaining payload
    /// region (zero-coded or not, as indicated by `zerocoded`).
    pub fn decode(bytes: &[u8]) -> Result<(Header, &[u8])> {
        if bytes.len() < 6 {
            return Err(Error::Malformed("datagram shorter than fixed header".into()));
        }
        let flags = HeaderFlags::from_bits_truncate(bytes[0]);
        let sequence = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        let extra_len = bytes[5] as usize;
        let mut pos = 6usize;
        if bytes.len() < pos + extra_len {
            return Err(Error::Malformed("truncated extra header bytes".into()));
        }
        let extra = bytes[pos..pos + extra_len].to_vec();
        pos += extra_len;

        let (frequency, id, id_width) = decode_message_id(bytes, pos)?;
        pos += id_width;

        let packet_type = PacketType::from_wire(frequency, id).ok_or_else(|| {
            Error::Malformed(format!("unknown packet type {frequency:?}/{id}"))
        })?;

        let appended_acks_present = flags.contains(HeaderFlags::APPENDED_ACKS);
        let (payload_end, appended_acks) = if appended_acks_present {
            if bytes.is_empty() {
                return Err(Error::Malformed("appended-acks flag set on empty datagram".into()));
            }
            let count = *bytes.last().unwrap() as usize;
            let tail_len = 1 + count * 4;
            if bytes.len() < pos + tail_len {
                return Err(Error::Malformed("truncated appended-ack tail".into()));
            }
            let ack_start = bytes.len() - tail_len;
            let mut acks = Vec::with_capacity(count);
            for chunk in bytes[ack_start..bytes.len() - 1].chunks_exact(4) {
                acks.push(u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
            }
            (ack_start, acks)
        } else {
            (bytes.len(), Vec::new())
        };

        if payload_end < pos {
            return Err(Error::Malformed("ack tail overlaps message id".into()));
        }

        let header = Header {
            reliable: flags.contains(HeaderFlags::RELIABLE),
            resent: flags.contains(HeaderFlags::RESENT),
            zerocoded: flags.contains(HeaderFlags::ZEROCODED),
            sequence,
            extra,
            packet_type,
            appended_acks,
        };
        Ok((header, &bytes[pos..payload_end]))
    }
}

fn encode_message_id(out: &mut Vec<u8>, packet_type: PacketType) {
    let id = packet_type.id();
    match packet_type.frequency() {
        Frequency::High => out.push(id as u8),
        Frequency::Medium => {
            out.push(0xFF);
            out.push(id as u8);
        }
        Frequency::Low => {
            out.push(0xFF);
            out.push(0xFF);
            out.extend_from_slice(&id.to_be_bytes());
        }
        Frequency::Fixed => {
            out.push(0xFF);
            out.push(0xFF);
            out.push(0xFF);
            out.push(id as u8);
        }
    }
}

fn decode_message_id(bytes: &[u8], pos: usize) -> Result<(Frequency, u16, usize)> {
    let byte_at = |offset: usize| -> Result<u8> {
        bytes
            .get(pos + offset)
            .copied()
            .ok_or_else(|| Error::Malformed("truncated message id".into()))
    };

    if byte_at(0)? != 0xFF {
        return Ok((Frequency::High, u16::from(byte_at(0)?), 1));
    }
    if byte_at(1)? != 0xFF {
        return Ok((Frequency::Medium, u16::from(byte_at(1)?), 2));
    }
    if byte_at(2)? != 0xFF {
        let id = u16::from_be_bytes([byte_at(2)?, byte_at(3)?]);
        return Ok((Frequency::Low, id, 4));
    }
    Ok((Frequency::Fixed, u16::from(byte_at(3)?), 4))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip_no_acks() {
        let mut header = Header::new(PacketType::AgentUpdate, 42);
        header.reliable = true;
        let payload = [1u8, 2, 3, 4];
        let bytes = header.encode(&payload).unwrap();
        let (decoded, body) = Header::decode(&bytes).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(body, payload);
    }

    #[test]
    fn header_roundtrip_low_frequency_with_acks() {
        let mut header = Header::new(PacketType::RegionHandshake, 7);
        header.appended_acks = vec![1, 2, 3];
        let payload = [9u8; 16];
        let bytes = header.encode(&payload).unwrap();
        let (decoded, body) = Header::decode(&bytes).unwrap();
        assert_eq!(decoded.appended_acks, vec![1, 2, 3]);
        assert_eq!(body, payload);
        assert_eq!(decoded.packet_type, PacketType::RegionHandshake);
    }

    #[test]
    fn header_roundtrip_fixed_and_medium_ids() {
        for pt in [PacketType::AgentThrottle, PacketType::LogoutDemand] {
            let header = Header::new(pt, 1);
            let bytes = header.encode(&[]).unwrap();
            let (decoded, body) = Header::decode(&bytes).unwrap();
            assert_eq!(decoded.packet_type, pt);
            assert!(body.is_empty());
        }
    }

    #[test]
    fn encode_rejects_more_than_255_appended_acks() {
        let mut header = Header::new(PacketType::PacketAck, 1);
        header.appended_acks = (0..256).collect();
        assert!(matches!(header.encode(&[]), Err(Error::Malformed(_))));
    }

    #[test]
    fn unknown_packet_id_is_malformed() {
        let header = Header::new(PacketType::AgentUpdate, 1);
        let mut bytes = header.encode(&[]).unwrap();
        // Corrupt the High-frequency id byte to one with no catalogue entry.
        let id_pos = bytes.len() - 1;
        bytes[id_pos] = 0xEE;
        assert!(matches!(Header::decode(&bytes), Err(Error::Malformed(_))));
    }
}
