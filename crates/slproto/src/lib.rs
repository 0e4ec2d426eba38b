// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Client-side implementation of the Second Life / OpenSimulator virtual
//! world UDP protocol: the message descriptor and generated codec, the
//! bit-packed layer codec, the OSD structured-data model with its four
//! serializations, and the UDP circuit engine that drives reliability,
//! deduplication, throttling and liveness over a live connection.
//!
//! `#[derive(SlBlock)]` and `#[derive(SlMessage)]` (re-exported from
//! `slproto-codegen`) generate wire code against absolute `::slproto::...`
//! paths, so this crate registers itself under its own name even when used
//! from within its own tree.
extern crate self as slproto;

pub mod bitpack;
pub mod circuit;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod header;
pub mod message;
pub mod osd;
pub mod primitive;
pub mod zerocode;

pub use circuit::{CircuitHandle, Engine};
pub use config::Config;
pub use dispatch::Dispatcher;
pub use error::{Error, Result};
pub use message::{Message, PacketType};
pub use osd::OsdValue;

pub use slproto_codegen::{SlBlock, SlMessage};
