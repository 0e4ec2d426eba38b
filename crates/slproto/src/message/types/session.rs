// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cooperative shutdown messages, see [`crate::circuit::engine`].

use crate::message::wire::{SlMessage, Var1, WireCodec};
use slproto_codegen::{SlBlock, SlMessage};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, SlBlock)]
pub struct LogoutAgentData {
    pub agent_id: Uuid,
    pub session_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, SlMessage)]
pub struct LogoutRequest {
    pub agent_data: LogoutAgentData,
}

#[derive(Debug, Clone, PartialEq, SlBlock)]
pub struct InventoryItemBlock {
    pub item_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, SlMessage)]
pub struct LogoutReply {
    pub agent_data: LogoutAgentData,
    pub inventory_data: Var1<InventoryItemBlock>,
}

/// Non-negotiable close: no blocks, signaled by packet type alone.
#[derive(Debug, Clone, PartialEq, SlMessage)]
pub struct LogoutDemand {}
