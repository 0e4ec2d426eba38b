// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Liveness probe messages.

use crate::message::wire::{SlMessage, WireCodec};
use slproto_codegen::{SlBlock, SlMessage};

#[derive(Debug, Clone, PartialEq, SlBlock)]
pub struct StartPingCheckBlock {
    pub ping_id: u8,
    pub oldest_unacked: u32,
}

#[derive(Debug, Clone, PartialEq, SlMessage)]
pub struct StartPingCheck {
    pub ping_id: StartPingCheckBlock,
}

#[derive(Debug, Clone, PartialEq, SlBlock)]
pub struct CompletePingCheckBlock {
    pub ping_id: u8,
}

#[derive(Debug, Clone, PartialEq, SlMessage)]
pub struct CompletePingCheck {
    pub ping_id: CompletePingCheckBlock,
}
