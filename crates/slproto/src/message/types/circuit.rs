// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Handshake, simulator-bridging and moderation messages.

use crate::message::wire::{IpAddrField, IpPort, SlMessage, VarBytes2, WireCodec};
use slproto_codegen::{SlBlock, SlMessage};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, SlBlock)]
pub struct CircuitCodeBlock {
    pub code: u32,
    pub session_id: Uuid,
    pub agent_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, SlMessage)]
pub struct UseCircuitCode {
    pub circuit_code: CircuitCodeBlock,
}

#[derive(Debug, Clone, PartialEq, SlBlock)]
pub struct CompleteAgentMovementData {
    pub agent_id: Uuid,
    pub session_id: Uuid,
    pub circuit_code: u32,
}

#[derive(Debug, Clone, PartialEq, SlMessage)]
pub struct CompleteAgentMovement {
    pub agent_data: CompleteAgentMovementData,
}

#[derive(Debug, Clone, PartialEq, SlBlock)]
pub struct RegionInfoBlock {
    pub region_flags: u32,
    pub sim_access: u8,
    pub sim_name: VarBytes2,
    pub sim_owner: Uuid,
    pub is_estate_manager: bool,
    pub water_height: f32,
    pub billable_factor: f32,
    pub cache_id: Uuid,
    pub terrain_base: [Uuid; 4],
    pub terrain_detail: [Uuid; 4],
    pub terrain_start_height: [f32; 4],
    pub terrain_height_range: [f32; 4],
}

#[derive(Debug, Clone, PartialEq, SlBlock)]
pub struct RegionInfo2Block {
    pub region_id: Uuid,
    pub cpu_class: i32,
    pub cpu_ratio: i32,
    pub colo_name: VarBytes2,
    pub product_sku: VarBytes2,
    pub product_name: VarBytes2,
}

#[derive(Debug, Clone, PartialEq, SlMessage)]
pub struct RegionHandshake {
    pub region_info: RegionInfoBlock,
    pub region_info2: RegionInfo2Block,
}

#[derive(Debug, Clone, PartialEq, SlBlock)]
pub struct RegionHandshakeReplyAgentData {
    pub agent_id: Uuid,
    pub session_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, SlBlock)]
pub struct RegionHandshakeReplyRegionInfo {
    pub flags: u32,
}

#[derive(Debug, Clone, PartialEq, SlMessage)]
pub struct RegionHandshakeReply {
    pub agent_data: RegionHandshakeReplyAgentData,
    pub region_info: RegionHandshakeReplyRegionInfo,
}

#[derive(Debug, Clone, PartialEq, SlBlock)]
pub struct EnableSimulatorInfo {
    pub handle: u64,
    pub ip: IpAddrField,
    pub port: IpPort,
}

#[derive(Debug, Clone, PartialEq, SlMessage)]
pub struct EnableSimulator {
    pub simulator_info: EnableSimulatorInfo,
}

/// Carries no blocks: the handshake downgrade is signaled by the packet
/// type tag alone.
#[derive(Debug, Clone, PartialEq, SlMessage)]
pub struct DisableSimulator {}

#[derive(Debug, Clone, PartialEq, SlBlock)]
pub struct KickUserTargetBlock {
    pub agent_id: Uuid,
    pub session_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, SlBlock)]
pub struct KickUserInfoBlock {
    pub reason: VarBytes2,
}

#[derive(Debug, Clone, PartialEq, SlMessage)]
pub struct KickUser {
    pub target_block: KickUserTargetBlock,
    pub user_info: KickUserInfoBlock,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn use_circuit_code_roundtrip() {
        let msg = UseCircuitCode {
            circuit_code: CircuitCodeBlock {
                code: 0xDEAD_BEEF,
                session_id: Uuid::from_u128(1),
                agent_id: Uuid::from_u128(2),
            },
        };
        let bytes = msg.to_bytes();
        assert_eq!(bytes.len(), msg.length());
        assert_eq!(UseCircuitCode::from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn region_handshake_roundtrip_with_arrays() {
        let msg = RegionHandshake {
            region_info: RegionInfoBlock {
                region_flags: 7,
                sim_access: 13,
                sim_name: VarBytes2(b"Test Region".to_vec()),
                sim_owner: Uuid::from_u128(3),
                is_estate_manager: true,
                water_height: 20.0,
                billable_factor: 1.0,
                cache_id: Uuid::from_u128(4),
                terrain_base: [Uuid::nil(); 4],
                terrain_detail: [Uuid::nil(); 4],
                terrain_start_height: [0.0; 4],
                terrain_height_range: [60.0; 4],
            },
            region_info2: RegionInfo2Block {
                region_id: Uuid::from_u128(5),
                cpu_class: 1,
                cpu_ratio: 1,
                colo_name: VarBytes2(Vec::new()),
                product_sku: VarBytes2(Vec::new()),
                product_name: VarBytes2(b"mainland".to_vec()),
            },
        };
        let bytes = msg.to_bytes();
        assert_eq!(bytes.len(), msg.length());
        assert_eq!(RegionHandshake::from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn disable_simulator_has_empty_body() {
        let msg = DisableSimulator {};
        assert_eq!(msg.length(), 0);
        assert_eq!(msg.to_bytes(), Vec::<u8>::new());
        assert_eq!(DisableSimulator::from_bytes(&[]).unwrap(), msg);
    }
}
