// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Concrete message and block definitions. Each submodule groups messages
//! by collaborator (movement, handshake, chat, liveness, session teardown)
//! the way the catalogue's own grouping does.

pub mod ack;
pub mod agent;
pub mod chat;
pub mod circuit;
pub mod ping;
pub mod session;

pub use ack::{PacketAck, PacketsBlock};
pub use agent::{
    AgentHeightWidth, AgentThrottle, AgentUpdate, AgentUpdateData, HeightWidthAgentData,
    HeightWidthBlock, ThrottleAgentData, ThrottleBlock,
};
pub use chat::{
    ChatFromSimulator, ChatFromSimulatorData, ChatFromViewer, ChatFromViewerAgentData,
    ChatFromViewerChatData,
};
pub use circuit::{
    CircuitCodeBlock, CompleteAgentMovement, CompleteAgentMovementData, DisableSimulator,
    EnableSimulator, EnableSimulatorInfo, KickUser, KickUserInfoBlock, KickUserTargetBlock,
    RegionHandshake, RegionHandshakeReply, RegionHandshakeReplyAgentData,
    RegionHandshakeReplyRegionInfo, RegionInfoBlock, RegionInfo2Block, UseCircuitCode,
};
pub use ping::{CompletePingCheck, CompletePingCheckBlock, StartPingCheck, StartPingCheckBlock};
pub use session::{InventoryItemBlock, LogoutAgentData, LogoutDemand, LogoutReply, LogoutRequest};
