// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame agent state and throttle negotiation messages.

use crate::message::wire::{Quaternion, SlMessage, VarBytes1, Vector3, WireCodec};
use slproto_codegen::{SlBlock, SlMessage};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, SlBlock)]
pub struct AgentUpdateData {
    pub agent_id: Uuid,
    pub session_id: Uuid,
    pub body_rotation: Quaternion,
    pub head_rotation: Quaternion,
    pub state: u8,
    pub camera_center: Vector3,
    pub camera_at_axis: Vector3,
    pub camera_left_axis: Vector3,
    pub camera_up_axis: Vector3,
    pub far: f32,
    pub control_flags: u32,
    pub flags: u8,
}

#[derive(Debug, Clone, PartialEq, SlMessage)]
pub struct AgentUpdate {
    pub agent_data: AgentUpdateData,
}

#[derive(Debug, Clone, PartialEq, SlBlock)]
pub struct ThrottleAgentData {
    pub agent_id: Uuid,
    pub session_id: Uuid,
    pub circuit_code: u32,
}

#[derive(Debug, Clone, PartialEq, SlBlock)]
pub struct ThrottleBlock {
    pub generation_counter: u32,
    /// 28 bytes: seven little-endian f32 channel rates, see
    /// [`crate::circuit::throttle`].
    pub throttles: VarBytes1,
}

#[derive(Debug, Clone, PartialEq, SlMessage)]
pub struct AgentThrottle {
    pub agent_data: ThrottleAgentData,
    pub throttle: ThrottleBlock,
}

#[derive(Debug, Clone, PartialEq, SlBlock)]
pub struct HeightWidthAgentData {
    pub agent_id: Uuid,
    pub session_id: Uuid,
    pub circuit_code: u32,
}

#[derive(Debug, Clone, PartialEq, SlBlock)]
pub struct HeightWidthBlock {
    pub gen_counter: u32,
    pub height: u16,
    pub width: u16,
}

#[derive(Debug, Clone, PartialEq, SlMessage)]
pub struct AgentHeightWidth {
    pub agent_data: HeightWidthAgentData,
    pub height_width_block: HeightWidthBlock,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::throttle::ThrottleVector;

    #[test]
    fn agent_update_roundtrip_reconstructs_quaternion_w() {
        let msg = AgentUpdate {
            agent_data: AgentUpdateData {
                agent_id: Uuid::from_u128(1),
                session_id: Uuid::from_u128(2),
                body_rotation: Quaternion {
                    x: 0.5,
                    y: 0.5,
                    z: 0.5,
                    w: 0.0,
                },
                head_rotation: Quaternion {
                    x: 0.0,
                    y: 0.0,
                    z: 0.0,
                    w: 0.0,
                },
                state: 0,
                camera_center: Vector3 {
                    x: 1.0,
                    y: 2.0,
                    z: 3.0,
                },
                camera_at_axis: Vector3::default(),
                camera_left_axis: Vector3::default(),
                camera_up_axis: Vector3::default(),
                far: 64.0,
                control_flags: 0,
                flags: 0,
            },
        };
        let bytes = msg.to_bytes();
        assert_eq!(bytes.len(), msg.length());
        let back = AgentUpdate::from_bytes(&bytes).unwrap();
        assert!((back.agent_data.body_rotation.w - 0.5).abs() < 1e-6);
        assert!((back.agent_data.head_rotation.w - 1.0).abs() < 1e-6);
    }

    #[test]
    fn agent_throttle_scenario_channel_split() {
        let vector = ThrottleVector::from_total(1_536_000.0);
        let msg = AgentThrottle {
            agent_data: ThrottleAgentData {
                agent_id: Uuid::nil(),
                session_id: Uuid::nil(),
                circuit_code: 1,
            },
            throttle: ThrottleBlock {
                generation_counter: 0,
                throttles: VarBytes1(vector.to_wire_bytes().to_vec()),
            },
        };
        let bytes = msg.to_bytes();
        assert_eq!(bytes.len(), msg.length());
        let back = AgentThrottle::from_bytes(&bytes).unwrap();
        assert_eq!(back.throttle.throttles.0.len(), 28);
        assert_eq!(&back.throttle.throttles.0[0..4], &153_600f32.to_le_bytes());
    }
}
