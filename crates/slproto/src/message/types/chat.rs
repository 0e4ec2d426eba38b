// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Local chat messages.

use crate::message::wire::{SlMessage, VarBytes2, Vector3, WireCodec};
use slproto_codegen::{SlBlock, SlMessage};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, SlBlock)]
pub struct ChatFromViewerAgentData {
    pub agent_id: Uuid,
    pub session_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, SlBlock)]
pub struct ChatFromViewerChatData {
    pub message: VarBytes2,
    pub chat_type: u8,
    pub channel: i32,
}

#[derive(Debug, Clone, PartialEq, SlMessage)]
pub struct ChatFromViewer {
    pub agent_data: ChatFromViewerAgentData,
    pub chat_data: ChatFromViewerChatData,
}

#[derive(Debug, Clone, PartialEq, SlBlock)]
pub struct ChatFromSimulatorData {
    pub from_name: VarBytes2,
    pub source_id: Uuid,
    pub owner_id: Uuid,
    pub source_type: u8,
    pub chat_type: u8,
    pub audible: u8,
    pub position: Vector3,
    pub message: VarBytes2,
}

#[derive(Debug, Clone, PartialEq, SlMessage)]
pub struct ChatFromSimulator {
    pub chat_data: ChatFromSimulatorData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_from_viewer_roundtrip() {
        let msg = ChatFromViewer {
            agent_data: ChatFromViewerAgentData {
                agent_id: Uuid::from_u128(10),
                session_id: Uuid::from_u128(11),
            },
            chat_data: ChatFromViewerChatData {
                message: VarBytes2(b"hello grid".to_vec()),
                chat_type: 1,
                channel: 0,
            },
        };
        let bytes = msg.to_bytes();
        assert_eq!(bytes.len(), msg.length());
        assert_eq!(ChatFromViewer::from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn chat_from_simulator_long_message_roundtrip() {
        let message = vec![b'x'; 2000];
        let msg = ChatFromSimulator {
            chat_data: ChatFromSimulatorData {
                from_name: VarBytes2(b"An Object".to_vec()),
                source_id: Uuid::from_u128(1),
                owner_id: Uuid::from_u128(2),
                source_type: 2,
                chat_type: 1,
                audible: 1,
                position: Vector3 {
                    x: 1.0,
                    y: 2.0,
                    z: 3.0,
                },
                message: VarBytes2(message),
            },
        };
        let bytes = msg.to_bytes();
        assert_eq!(bytes.len(), msg.length());
        assert_eq!(ChatFromSimulator::from_bytes(&bytes).unwrap(), msg);
    }
}
