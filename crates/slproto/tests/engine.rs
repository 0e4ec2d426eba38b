// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end exercises of the circuit engine's public surface: a real
//! handshake between two in-process engines over loopback UDP, and
//! duplicate-detection against a hand-crafted datagram.

use std::net::UdpSocket;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use slproto::circuit::{CircuitStatus, Engine};
use slproto::config::Config;
use slproto::header::Header;
use slproto::zerocode;
use slproto::message::types::{
    ChatFromViewer, ChatFromViewerAgentData, ChatFromViewerChatData, RegionHandshake,
    RegionInfo2Block, RegionInfoBlock,
};
use slproto::message::{decode_body, Message, PacketType, SlMessage, VarBytes2};
use uuid::Uuid;

fn await_until(mut check: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    check()
}

fn bare_region_handshake() -> RegionHandshake {
    RegionHandshake {
        region_info: RegionInfoBlock {
            region_flags: 0,
            sim_access: 0,
            sim_name: VarBytes2(b"Test Region".to_vec()),
            sim_owner: Uuid::nil(),
            is_estate_manager: false,
            water_height: 20.0,
            billable_factor: 1.0,
            cache_id: Uuid::nil(),
            terrain_base: [Uuid::nil(); 4],
            terrain_detail: [Uuid::nil(); 4],
            terrain_start_height: [0.0; 4],
            terrain_height_range: [60.0; 4],
        },
        region_info2: RegionInfo2Block {
            region_id: Uuid::nil(),
            cpu_class: 1,
            cpu_ratio: 1,
            colo_name: VarBytes2(Vec::new()),
            product_sku: VarBytes2(Vec::new()),
            product_name: VarBytes2(Vec::new()),
        },
    }
}

/// Two engines stand in for a viewer and a simulator. The "simulator" side
/// has no handshake logic of its own (this crate is the client half), so
/// the test plays that role: on receiving `UseCircuitCode` it sends back
/// `RegionHandshake`, exactly as a real simulator would.
#[test]
fn full_handshake_reaches_connected_on_both_sides() {
    let sim = Engine::bind("127.0.0.1:0".parse().unwrap(), Config::default()).unwrap();
    let viewer = Engine::bind("127.0.0.1:0".parse().unwrap(), Config::default()).unwrap();

    let sim_addr = sim.local_addr().unwrap();
    let viewer_addr = viewer.local_addr().unwrap();

    // Give the simulator stand-in a circuit entry for the viewer so its
    // inbound thread doesn't drop the handshake datagrams, and let it
    // react to UseCircuitCode the way a real simulator would.
    let sim_for_reply = sim.clone();
    sim.dispatcher().on_message(
        PacketType::UseCircuitCode,
        Arc::new(move |_msg: &Message| {
            let _ = sim_for_reply.send(
                viewer_addr,
                Message::RegionHandshake(bare_region_handshake()),
                true,
            );
        }),
    );
    slproto::circuit::Engine::connect(&sim, viewer_addr, 1, Uuid::nil(), Uuid::nil()).unwrap();

    let session_id = Uuid::from_u128(42);
    let agent_id = Uuid::from_u128(7);
    let handle =
        slproto::circuit::Engine::connect(&viewer, sim_addr, 99, session_id, agent_id).unwrap();

    let reached_connected = await_until(
        || handle.status() == Some(CircuitStatus::Connected),
        Duration::from_secs(2),
    );
    assert!(reached_connected, "viewer circuit never reached Connected");

    viewer.shutdown();
    sim.shutdown();
}

/// A reliable packet replayed twice dispatches exactly one callback, and
/// both copies are acknowledged.
#[test]
fn duplicate_inbound_packet_dispatches_once_and_acks_both() {
    let engine = Engine::bind("127.0.0.1:0".parse().unwrap(), Config::default()).unwrap();
    let engine_addr = engine.local_addr().unwrap();

    let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
    peer.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
    let peer_addr = peer.local_addr().unwrap();

    // Register a circuit for `peer_addr` so the engine doesn't drop its
    // datagrams; drain the handshake packets this send triggers.
    slproto::circuit::Engine::connect(&engine, peer_addr, 1, Uuid::nil(), Uuid::nil()).unwrap();
    drain_for(&peer, Duration::from_millis(200));

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    engine.dispatcher().on_message(
        PacketType::ChatFromViewer,
        Arc::new(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }),
    );

    let chat = ChatFromViewer {
        agent_data: ChatFromViewerAgentData {
            agent_id: Uuid::nil(),
            session_id: Uuid::nil(),
        },
        chat_data: ChatFromViewerChatData {
            message: VarBytes2(b"hello".to_vec()),
            chat_type: 1,
            channel: 0,
        },
    };
    let mut header = Header::new(PacketType::ChatFromViewer, 500);
    header.reliable = true;
    let datagram = header.encode(&chat.to_bytes()).unwrap();

    peer.send_to(&datagram, engine_addr).unwrap();
    peer.send_to(&datagram, engine_addr).unwrap();

    let dispatched_once = await_until(|| calls.load(Ordering::SeqCst) == 1, Duration::from_secs(1));
    assert!(dispatched_once, "expected exactly one dispatch, got {}", calls.load(Ordering::SeqCst));

    // The periodic ack flush (default 500ms) or the batch threshold will
    // eventually surface both acknowledgements, possibly coalesced into
    // one PacketAck packet.
    let total_acks = count_acks_for(&peer, 500, Duration::from_millis(1500));
    assert_eq!(total_acks, 2, "both the original and the duplicate must be acked");

    engine.shutdown();
}

fn drain_for(socket: &UdpSocket, duration: Duration) {
    let deadline = Instant::now() + duration;
    let mut buf = [0u8; 2048];
    while Instant::now() < deadline {
        match socket.recv_from(&mut buf) {
            Ok(_) => continue,
            Err(_) => break,
        }
    }
}

fn count_acks_for(socket: &UdpSocket, target_sequence: u32, timeout: Duration) -> usize {
    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; 2048];
    let mut total = 0usize;
    while Instant::now() < deadline {
        match socket.recv_from(&mut buf) {
            Ok((len, _)) => {
                if let Ok((header, payload)) = Header::decode(&buf[..len]) {
                    if header.packet_type == PacketType::PacketAck {
                        let body = if header.zerocoded {
                            zerocode::decode(payload).unwrap_or_default()
                        } else {
                            payload.to_vec()
                        };
                        if let Ok(Message::PacketAck(ack)) = decode_body(header.packet_type, &body) {
                            total += ack
                                .packets
                                .0
                                .iter()
                                .filter(|p| p.id == target_sequence)
                                .count();
                        }
                    }
                }
            }
            Err(_) => continue,
        }
        if total >= 2 {
            break;
        }
    }
    total
}
