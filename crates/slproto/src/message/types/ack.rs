// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Explicit acknowledgement message.
//!
//! Used by the circuit engine's ack-flush channel 2 (batch threshold) and
//! channel 3 (periodic flush); channel 1 (piggyback) instead writes
//! directly into the datagram header, see [`crate::header`].

use crate::message::wire::{SlMessage, Var1, WireCodec};
use slproto_codegen::{SlBlock, SlMessage};

#[derive(Debug, Clone, PartialEq, SlBlock)]
pub struct PacketsBlock {
    pub id: u32,
}

#[derive(Debug, Clone, PartialEq, SlMessage)]
pub struct PacketAck {
    pub packets: Var1<PacketsBlock>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_ack_roundtrip() {
        let msg = PacketAck {
            packets: Var1(vec![
                PacketsBlock { id: 1 },
                PacketsBlock { id: 2 },
                PacketsBlock { id: 3 },
            ]),
        };
        let bytes = msg.to_bytes();
        assert_eq!(bytes.len(), msg.length());
        assert_eq!(bytes[0], 3);
        assert_eq!(PacketAck::from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn packet_ack_splits_when_oversized() {
        let packets: Vec<_> = (0..400u32).map(|id| PacketsBlock { id }).collect();
        let msg = PacketAck {
            packets: Var1(packets.clone()),
        };
        let fragments = msg.to_bytes_multiple();
        assert!(fragments.len() > 1);
        for fragment in &fragments {
            assert!(fragment.len() <= crate::message::wire::BODY_BUDGET);
        }
        let mut rebuilt = Vec::new();
        for fragment in &fragments {
            let decoded = PacketAck::from_bytes(fragment).unwrap();
            rebuilt.extend(decoded.packets.0);
        }
        assert_eq!(rebuilt, packets);
    }
}
