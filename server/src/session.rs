//! Match session: turns decoded client messages and clock ticks into outgoing
//! packets.
//!
//! The session performs no IO. The network layer feeds it datagrams and asks it
//! to tick, then delivers whatever [`GameMessage`]s it returns.

use crate::client_manager::{ClientManager, Registration};
use crate::game::Simulation;
use crate::status::ServerStatus;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::Rng;
use shared::{ClientPacket, ServerPacket, Snapshot};
use std::net::SocketAddr;

/// Messages produced by the session for the network layer
#[derive(Debug, Clone, PartialEq)]
pub enum GameMessage {
    SendPacket {
        packet: ServerPacket,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: ServerPacket,
    },
}

/// Lobby, match and restart handshake for the two seats
#[derive(Debug)]
pub struct Session<R = StdRng> {
    clients: ClientManager,
    simulation: Simulation<R>,
    tick: u32,
    started: bool,
}

impl Session<StdRng> {
    pub fn new() -> Self {
        Self::with_simulation(Simulation::new())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_simulation(Simulation::seeded(seed))
    }
}

impl Default for Session<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> Session<R> {
    pub fn with_simulation(simulation: Simulation<R>) -> Self {
        Self {
            clients: ClientManager::new(),
            simulation,
            tick: 0,
            started: false,
        }
    }

    /// Decodes and handles one raw datagram. Malformed datagrams are dropped.
    pub fn handle_datagram(&mut self, data: &[u8], addr: SocketAddr) -> Option<GameMessage> {
        match ClientPacket::decode(data) {
            Ok(packet) => self.handle_packet(packet, addr),
            Err(e) => {
                debug!("Dropping datagram from {}: {}", addr, e);
                None
            }
        }
    }

    pub fn handle_packet(&mut self, packet: ClientPacket, addr: SocketAddr) -> Option<GameMessage> {
        if packet == ClientPacket::Connect {
            return Some(self.handle_connect(addr));
        }

        // Only seated clients may do anything else.
        let Some(index) = self.clients.find_client_by_addr(addr) else {
            debug!("Ignoring {:?} from unregistered endpoint {}", packet, addr);
            return None;
        };

        match packet {
            ClientPacket::Connect => None,

            ClientPacket::Ready => {
                let all_ready = self.clients.mark_ready(addr).unwrap_or(false);
                if all_ready && !self.started {
                    self.start_match();
                    Some(GameMessage::BroadcastPacket {
                        packet: ServerPacket::Start,
                    })
                } else {
                    None
                }
            }

            ClientPacket::ResetAck => {
                if self.simulation.is_terminated() {
                    self.clients.mark_reset_ready(addr);
                } else {
                    debug!("Ignoring RESET from client {} before match end", index + 1);
                }
                None
            }

            ClientPacket::Input { jump, crouch } => {
                if self.started && !self.simulation.is_terminated() {
                    self.clients.accumulate_input(index, jump, crouch);
                }
                None
            }
        }
    }

    fn handle_connect(&mut self, addr: SocketAddr) -> GameMessage {
        let packet = match self.clients.register_or_ack(addr) {
            Registration::Accepted(_) | Registration::AlreadyConnected(_) => ServerPacket::Accepted,
            Registration::Full => {
                warn!("Rejecting {}: server full", addr);
                ServerPacket::Full
            }
        };
        GameMessage::SendPacket { packet, addr }
    }

    fn start_match(&mut self) {
        self.started = true;
        self.simulation.reset();
        self.tick = 0;
        self.clients.clear_reset_flags();
        self.clients.clear_inputs();
        info!("Both players ready, match started");
    }

    fn restart_match(&mut self) {
        self.simulation.reset();
        self.tick = 0;
        self.clients.clear_reset_flags();
        self.clients.clear_inputs();
        info!("Both players acknowledged, match restarted");
    }

    /// Runs one fixed step and returns the snapshot broadcast.
    ///
    /// Returns None until the match has started.
    pub fn tick(&mut self, dt: f32) -> Option<GameMessage> {
        if !self.started {
            return None;
        }

        let [p1, p2] = self.clients.take_inputs();
        if !self.simulation.is_terminated() {
            self.simulation
                .advance(dt, p1.jump, p1.crouch, p2.jump, p2.crouch);
        }

        if self.simulation.is_terminated() && self.clients.all_reset_ready() {
            self.restart_match();
        } else {
            self.tick = self.tick.wrapping_add(1);
        }

        Some(GameMessage::BroadcastPacket {
            packet: ServerPacket::Snapshot(self.snapshot()),
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.simulation.state();
        Snapshot {
            tick: self.tick,
            score: state.score,
            velocity: state.velocity,
            started: self.started,
            terminated: state.terminated,
            end_message: state.end_message.clone(),
            reset_ack_count: self.clients.reset_ack_count() as u8,
            players: [state.players[0].snapshot(), state.players[1].snapshot()],
            obstacles: state.obstacles.iter().map(|o| o.snapshot()).collect(),
        }
    }

    pub fn status(&self) -> ServerStatus {
        ServerStatus {
            tick: self.tick,
            client_count: self.clients.len(),
            started: self.started,
            match_state: self.simulation.state().clone(),
        }
    }

    pub fn client_addrs(&self) -> Vec<SocketAddr> {
        self.clients.get_client_addrs()
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }

    pub fn simulation(&self) -> &Simulation<R> {
        &self.simulation
    }

    pub fn simulation_mut(&mut self) -> &mut Simulation<R> {
        &mut self.simulation
    }

    pub fn tick_count(&self) -> u32 {
        self.tick
    }

    pub fn is_started(&self) -> bool {
        self.started
    }
}
