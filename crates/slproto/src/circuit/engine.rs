// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The circuit engine (C8): owns the UDP socket, one [`CircuitState`] per
//! connected simulator, and the two background threads that drive
//! reliability - an inbound receive/dispatch loop and a maintenance timer
//! that retransmits, flushes acks, and pings.
//!
//! Lock ordering, where both are needed: the circuit-set map lock before
//! any individual circuit's state lock. No code path acquires them in the
//! opposite order.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use mio::net::UdpSocket as MioUdpSocket;
use mio::{Events, Interest, Poll, Token};
use parking_lot::Mutex;

use crate::circuit::state::{CircuitState, CircuitStatus};
use crate::config::{Config, SharedConfig};
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::header::Header;
use crate::message::types::*;
use crate::message::{Message, PacketType, Quaternion, Vector3};
use crate::zerocode;

const SOCKET_TOKEN: Token = Token(0);
const MAX_DATAGRAM: usize = 2048;
const ACK_PIGGYBACK_MAX: usize = 255;
const PING_WINDOW: Duration = Duration::from_secs(5);
/// Cadence for the periodic `AgentUpdate` gated by
/// `Config::send_agent_updates`. The spec leaves the interval
/// unspecified; this keeps a connected circuit's last-known state fresh
/// without competing with the resend channel's bandwidth budget.
const AGENT_UPDATE_INTERVAL: Duration = Duration::from_secs(1);
/// Channel (2) of the three-channel ack-flush priority order: an explicit
/// ack packet is sent as soon as the pending queue grows past this many
/// entries, rather than waiting for the periodic flush.
const ACK_BATCH_THRESHOLD: usize = 10;

/// Thin handle to one active or handshaking circuit, returned by
/// [`Engine::connect`]. Cloning is cheap; every clone addresses the same
/// underlying circuit.
#[derive(Clone)]
pub struct CircuitHandle {
    remote: SocketAddr,
    engine: Arc<Engine>,
}

impl CircuitHandle {
    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn status(&self) -> Option<CircuitStatus> {
        self.engine
            .circuits
            .get(&self.remote)
            .map(|entry| entry.lock().status)
    }

    pub fn send(&self, message: Message, reliable: bool) -> Result<()> {
        self.engine.send(self.remote, message, reliable)
    }

    pub fn disconnect(&self) -> Result<()> {
        self.engine.disconnect(self.remote)
    }
}

pub struct Engine {
    socket: Arc<Mutex<MioUdpSocket>>,
    circuits: Arc<DashMap<SocketAddr, Arc<Mutex<CircuitState>>>>,
    dispatcher: Arc<Dispatcher>,
    config: SharedConfig,
    shutdown: Arc<AtomicBool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    /// Set once by `bind` so code reached only through `&self` (the
    /// inbound thread's dispatch path) can still open new circuits, which
    /// requires owning an `Arc<Engine>`.
    self_weak: Mutex<Weak<Engine>>,
}

impl Engine {
    /// Bind a UDP socket on `local_addr` and spawn the inbound and
    /// maintenance background threads.
    pub fn bind(local_addr: SocketAddr, config: Config) -> Result<Arc<Self>> {
        let std_socket = std::net::UdpSocket::bind(local_addr)?;
        std_socket.set_nonblocking(true)?;
        let socket = MioUdpSocket::from_std(std_socket);

        let engine = Arc::new(Self {
            socket: Arc::new(Mutex::new(socket)),
            circuits: Arc::new(DashMap::new()),
            dispatcher: Arc::new(Dispatcher::new()),
            config: SharedConfig::new(config),
            shutdown: Arc::new(AtomicBool::new(false)),
            threads: Mutex::new(Vec::new()),
            self_weak: Mutex::new(Weak::new()),
        });
        *engine.self_weak.lock() = Arc::downgrade(&engine);

        let inbound = spawn_inbound_thread(engine.clone())?;
        let maintenance = spawn_maintenance_thread(engine.clone());
        *engine.threads.lock() = vec![inbound, maintenance];

        Ok(engine)
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// The address the underlying socket is bound to. Useful when `bind`
    /// was given port 0 and the OS assigned one.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.lock().local_addr()?)
    }

    pub fn config(&self) -> Config {
        self.config.load()
    }

    pub fn set_config(&self, config: Config) {
        self.config.store(config);
    }

    /// Begin a handshake with `remote`. Sends `UseCircuitCode` reliably
    /// and registers the circuit as `Handshaking`; the caller learns of
    /// completion through a `RegionHandshake` callback or by polling
    /// [`CircuitHandle::status`].
    ///
    /// Takes `engine: &Arc<Engine>` rather than a `self: &Arc<Self>`
    /// receiver so the returned handle can hold its own owning `Arc`
    /// without relying on an unstable arbitrary-self-type.
    pub fn connect(
        engine: &Arc<Self>,
        remote: SocketAddr,
        circuit_code: u32,
        session_id: uuid::Uuid,
        agent_id: uuid::Uuid,
    ) -> Result<CircuitHandle> {
        if !engine.config.load().multiple_sims && !engine.circuits.is_empty() {
            return Err(Error::CapacityExceeded("multiple_sims is disabled".into()));
        }
        let max_attempts = engine.config.load().max_resend_attempts;
        let state = Arc::new(Mutex::new(CircuitState::with_max_attempts(Instant::now(), max_attempts)));
        let throttle = {
            let mut state = state.lock();
            state.begin_handshake();
            state.agent_id = agent_id;
            state.session_id = session_id;
            state.circuit_code = circuit_code;
            state.throttle
        };
        engine.circuits.insert(remote, state);

        let use_circuit_code = Message::UseCircuitCode(UseCircuitCode {
            circuit_code: CircuitCodeBlock {
                code: circuit_code,
                session_id,
                agent_id,
            },
        });
        engine.send(remote, use_circuit_code, true)?;

        if engine.config.load().send_agent_throttle {
            let agent_throttle = Message::AgentThrottle(AgentThrottle {
                agent_data: ThrottleAgentData {
                    agent_id,
                    session_id,
                    circuit_code,
                },
                throttle: ThrottleBlock {
                    generation_counter: 0,
                    throttles: crate::message::VarBytes1(throttle.to_wire_bytes().to_vec()),
                },
            });
            engine.send(remote, agent_throttle, true)?;
        }

        let complete_movement = Message::CompleteAgentMovement(CompleteAgentMovement {
            agent_data: CompleteAgentMovementData {
                agent_id,
                session_id,
                circuit_code,
            },
        });
        engine.send(remote, complete_movement, true)?;

        Ok(CircuitHandle {
            remote,
            engine: engine.clone(),
        })
    }

    /// Send one message, reliably or not. Oversized bodies are split per
    /// [`Message::to_bytes_multiple`] and sent as independent datagrams,
    /// each with its own sequence number.
    pub fn send(&self, remote: SocketAddr, message: Message, reliable: bool) -> Result<()> {
        message.validate()?;
        let circuit = self
            .circuits
            .get(&remote)
            .ok_or(Error::NotConnected)?
            .clone();
        let packet_type = message.packet_type();
        // Drain once, up front: acks ride on the first fragment only (§4.2,
        // "appended-acks flag is cleared on every fragment after the
        // first"). Draining inside `send_raw` per call would let acks
        // inserted by another thread between fragments leak onto later
        // fragments, since the circuit lock is released between sends.
        let mut acks = circuit.lock().acks_owed.drain_up_to(ACK_PIGGYBACK_MAX);
        for body in message.to_bytes_multiple() {
            let fragment_acks = std::mem::take(&mut acks);
            self.send_raw(&circuit, remote, packet_type, &body, reliable, fragment_acks)?;
        }
        Ok(())
    }

    fn send_raw(
        &self,
        circuit: &Arc<Mutex<CircuitState>>,
        remote: SocketAddr,
        packet_type: PacketType,
        body: &[u8],
        reliable: bool,
        appended_acks: Vec<u32>,
    ) -> Result<()> {
        let now = Instant::now();
        let mut state = circuit.lock();
        let sequence = state.next_sequence();
        let mut header = Header::new(packet_type, sequence);
        header.reliable = reliable;
        header.zerocoded = true;
        header.appended_acks = appended_acks;

        let payload = zerocode::encode(body);
        let datagram = header.encode(&payload)?;

        if reliable {
            state
                .outgoing
                .insert(sequence, datagram.clone(), packet_type, now);
        }
        drop(state);

        self.socket.lock().send_to(&datagram, remote)?;
        Ok(())
    }

    /// Unregister and tear down a circuit's reliability state without
    /// negotiating a logout. Used for local give-up after a confirmed
    /// disconnect or an exhausted handshake.
    pub fn unregister(&self, remote: SocketAddr) {
        self.circuits.remove(&remote);
    }

    /// Ask the simulator to end the session. The circuit moves to
    /// `Draining`; the maintenance thread removes it once `LogoutReply`
    /// arrives or `logout_timeout` elapses.
    pub fn disconnect(&self, remote: SocketAddr) -> Result<()> {
        let circuit = self.circuits.get(&remote).ok_or(Error::NotConnected)?.clone();
        let (agent_id, session_id) = {
            let mut state = circuit.lock();
            state.begin_draining();
            (state.agent_id, state.session_id)
        };
        self.send(
            remote,
            Message::LogoutRequest(LogoutRequest {
                agent_data: LogoutAgentData {
                    agent_id,
                    session_id,
                },
            }),
            true,
        )
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for handle in self.threads.lock().drain(..) {
            let _ = handle.join();
        }
    }

    /// Process one already-received datagram: decode the header, dedup,
    /// decode the body, record or drop appended acks, and dispatch.
    fn handle_datagram(&self, remote: SocketAddr, bytes: &[u8]) {
        let (header, payload) = match Header::decode(bytes) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("dropping malformed datagram from {remote}: {e}");
                return;
            }
        };

        let circuit = match self.circuits.get(&remote) {
            Some(entry) => entry.clone(),
            None => {
                log::debug!("dropping datagram from unregistered circuit {remote}");
                return;
            }
        };

        let body = if header.zerocoded {
            match zerocode::decode(payload) {
                Ok(b) => b,
                Err(e) => {
                    log::warn!("dropping un-decodable zero-coded datagram from {remote}: {e}");
                    return;
                }
            }
        } else {
            payload.to_vec()
        };

        {
            let mut state = circuit.lock();
            state.touch(Instant::now());
            for ack in &header.appended_acks {
                state.outgoing.ack(*ack);
            }
        }

        if header.packet_type == PacketType::PacketAck {
            if let Ok(Message::PacketAck(ack)) = crate::message::decode_body(header.packet_type, &body) {
                let mut state = circuit.lock();
                for block in ack.packets.0 {
                    state.outgoing.ack(block.id);
                }
            }
            return;
        }

        let is_duplicate = {
            let mut state = circuit.lock();
            state.dedup.check_and_insert(header.sequence)
        };
        let mut owed_batch = None;
        if header.reliable {
            let mut state = circuit.lock();
            state.acks_owed.push(header.sequence);
            if state.acks_owed.len() > ACK_BATCH_THRESHOLD {
                owed_batch = Some(state.acks_owed.drain_all());
            }
        }
        if let Some(batch) = owed_batch {
            self.flush_acks(remote, batch);
        }
        if is_duplicate {
            return;
        }

        let message = match crate::message::decode_body(header.packet_type, &body) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("dropping {:?} with invalid body from {remote}: {e}", header.packet_type);
                return;
            }
        };

        self.apply_lifecycle_transition(&circuit, remote, &message);
        self.dispatcher.dispatch_message(&message);
    }

    fn apply_lifecycle_transition(&self, circuit: &Arc<Mutex<CircuitState>>, remote: SocketAddr, message: &Message) {
        match message {
            Message::RegionHandshake(_) => {
                let (agent_id, session_id) = {
                    let mut state = circuit.lock();
                    state.mark_connected();
                    (state.agent_id, state.session_id)
                };
                let reply = Message::RegionHandshakeReply(RegionHandshakeReply {
                    agent_data: RegionHandshakeReplyAgentData {
                        agent_id,
                        session_id,
                    },
                    region_info: RegionHandshakeReplyRegionInfo { flags: 0 },
                });
                let _ = self.send(remote, reply, true);
            }
            Message::LogoutReply(_) => {
                self.circuits.remove(&remote);
            }
            Message::KickUser(_) => {
                circuit.lock().mark_disconnected();
                self.circuits.remove(&remote);
            }
            Message::CompletePingCheck(reply) => {
                circuit.lock().ping.complete(reply.ping_id.ping_id, Instant::now());
            }
            Message::EnableSimulator(enable) => {
                self.handle_enable_simulator(circuit, enable);
            }
            _ => {}
        }
    }

    /// Per §4.7: `EnableSimulator` from the current simulator opens a new
    /// circuit in `Handshaking` to the announced endpoint without
    /// disturbing the circuit it arrived on. Only acted on when
    /// `multiple_sims` is enabled.
    fn handle_enable_simulator(&self, origin: &Arc<Mutex<CircuitState>>, enable: &EnableSimulator) {
        if !self.config.load().multiple_sims {
            return;
        }
        let Some(engine) = self.self_weak.lock().upgrade() else {
            return;
        };
        let (agent_id, session_id) = {
            let state = origin.lock();
            (state.agent_id, state.session_id)
        };
        let info = &enable.simulator_info;
        let ip = std::net::Ipv4Addr::from(info.ip.0);
        let new_remote = SocketAddr::from((ip, info.port.0));
        if self.circuits.contains_key(&new_remote) {
            return;
        }
        let circuit_code = info.handle as u32;
        if let Err(e) = Self::connect(&engine, new_remote, circuit_code, session_id, agent_id) {
            log::warn!("failed to open circuit to announced simulator {new_remote}: {e}");
        }
    }

    /// One maintenance tick: retransmit overdue reliable packets, flush
    /// stale acks, drive the ping window, and drop circuits that have
    /// gone silent past `simulator_timeout`.
    fn maintenance_tick(&self) {
        let config = self.config.load();
        let now = Instant::now();
        let mut dead = Vec::new();

        for entry in self.circuits.iter() {
            let remote = *entry.key();
            let circuit = entry.value().clone();
            let mut resends = Vec::new();
            let mut exhausted = Vec::new();
            let mut acks_to_flush = Vec::new();
            let mut should_ping = false;
            let mut agent_update = None;

            {
                let mut state = circuit.lock();
                if now.saturating_duration_since(state.last_activity) > config.simulator_timeout {
                    dead.push(remote);
                    continue;
                }
                let rto = config.resend_timeout().max(state.ping.last_lag() * 2);
                for outcome in state.outgoing.due_for_retransmit(now, rto) {
                    match outcome {
                        crate::circuit::outgoing::RetransmitOutcome::Resend(seq, bytes) => {
                            resends.push((seq, bytes))
                        }
                        crate::circuit::outgoing::RetransmitOutcome::Exhausted(seq, pt) => {
                            exhausted.push((seq, pt))
                        }
                    }
                }
                if !state.acks_owed.is_empty()
                    && now.saturating_duration_since(state.last_ack_flush) >= config.ack_flush_interval()
                {
                    acks_to_flush = state.acks_owed.drain_all();
                    state.last_ack_flush = now;
                }
                if state.ping.is_confirmed_disconnect() {
                    dead.push(remote);
                    continue;
                }
                should_ping = state.is_connected();
                if config.send_agent_updates
                    && state.is_connected()
                    && now.saturating_duration_since(state.last_agent_update) >= AGENT_UPDATE_INTERVAL
                {
                    state.last_agent_update = now;
                    agent_update = Some((state.agent_id, state.session_id));
                }
            }

            for (_, bytes) in &resends {
                let mut resent = bytes.clone();
                resent[0] |= crate::header::FLAG_RESENT;
                let _ = self.socket.lock().send_to(&resent, remote);
            }
            for (seq, packet_type) in &exhausted {
                log::warn!("giving up on {packet_type:?} seq {seq} to {remote} after max attempts");
            }
            if !acks_to_flush.is_empty() {
                self.flush_acks(remote, acks_to_flush);
            }
            if should_ping {
                self.send_ping(&circuit, remote);
            }
            if let Some((agent_id, session_id)) = agent_update {
                let message = Message::AgentUpdate(AgentUpdate {
                    agent_data: AgentUpdateData {
                        agent_id,
                        session_id,
                        body_rotation: Quaternion::default(),
                        head_rotation: Quaternion::default(),
                        state: 0,
                        camera_center: Vector3::default(),
                        camera_at_axis: Vector3::default(),
                        camera_left_axis: Vector3::default(),
                        camera_up_axis: Vector3::default(),
                        far: 0.0,
                        control_flags: 0,
                        flags: 0,
                    },
                });
                let _ = self.send(remote, message, false);
            }
        }

        for remote in dead {
            log::info!("circuit to {remote} timed out or confirmed disconnected");
            self.circuits.remove(&remote);
        }
    }

    fn flush_acks(&self, remote: SocketAddr, acks: Vec<u32>) {
        for chunk in acks.chunks(ACK_PIGGYBACK_MAX) {
            let packets = chunk.iter().map(|id| PacketsBlock { id: *id }).collect();
            let message = Message::PacketAck(PacketAck {
                packets: crate::message::Var1(packets),
            });
            let _ = self.send(remote, message, false);
        }
    }

    /// Called once per maintenance tick. Starts a new ping window if none
    /// is outstanding, or marks the current one missed once `PING_WINDOW`
    /// has elapsed without a reply.
    fn send_ping(&self, circuit: &Arc<Mutex<CircuitState>>, remote: SocketAddr) {
        let now = Instant::now();
        let mut state = circuit.lock();
        if state.ping.has_outstanding() {
            if !state.ping.window_elapsed(now, PING_WINDOW) {
                return;
            }
            state.ping.mark_window_missed();
            if state.ping.is_disconnect_candidate() {
                drop(state);
                self.dispatcher.dispatch_event("ping_window_missed", &[]);
                return;
            }
        }
        let ping_id = state.ping.start(now);
        drop(state);
        let message = Message::StartPingCheck(StartPingCheck {
            ping_id: StartPingCheckBlock {
                ping_id,
                oldest_unacked: 0,
            },
        });
        let _ = self.send(remote, message, false);
    }
}

fn spawn_inbound_thread(engine: Arc<Engine>) -> Result<JoinHandle<()>> {
    let mut poll = Poll::new()?;
    {
        let mut socket = engine.socket.lock();
        poll.registry()
            .register(&mut *socket, SOCKET_TOKEN, Interest::READABLE)?;
    }
    let shutdown = engine.shutdown.clone();
    Ok(std::thread::spawn(move || {
        let mut events = Events::with_capacity(128);
        let mut buf = [0u8; MAX_DATAGRAM];
        while !shutdown.load(Ordering::SeqCst) {
            if let Err(e) = poll.poll(&mut events, Some(Duration::from_millis(200))) {
                log::warn!("poll error on inbound circuit thread: {e}");
                continue;
            }
            for event in events.iter() {
                if event.token() != SOCKET_TOKEN {
                    continue;
                }
                loop {
                    let received = engine.socket.lock().recv_from(&mut buf);
                    match received {
                        Ok((len, remote)) => engine.handle_datagram(remote, &buf[..len]),
                        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                        Err(e) => {
                            log::warn!("recv error on inbound circuit thread: {e}");
                            break;
                        }
                    }
                }
            }
        }
    }))
}

fn spawn_maintenance_thread(engine: Arc<Engine>) -> JoinHandle<()> {
    let shutdown = engine.shutdown.clone();
    std::thread::spawn(move || {
        while !shutdown.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(200));
            engine.maintenance_tick();
        }
    })
}
