use crate::bot::Autopilot;
use log::{debug, error, info, warn};
use shared::{ClientPacket, ServerPacket, Snapshot, MAX_DATAGRAM_SIZE, SERVER_PORT, TICK_MS};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::{interval, MissedTickBehavior};

/// How often unanswered handshake messages are repeated
pub const HANDSHAKE_RESEND: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server address {0}")]
    InvalidAddress(String),
    #[error("server is full")]
    ServerFull,
    #[error("network error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub server_addr: String,
    /// Acknowledge finished matches so the server can restart
    pub acknowledge_resets: bool,
    /// Stop after this many finished matches, 0 plays forever
    pub max_matches: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{}", SERVER_PORT),
            acknowledge_resets: true,
            max_matches: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for `OK`
    Connecting,
    /// Seated, waiting for the match to start
    Lobby,
    /// Receiving snapshots
    Playing,
}

/// Protocol state of one bot, free of any IO
#[derive(Debug)]
pub struct BotState {
    phase: Phase,
    autopilot: Autopilot,
    acknowledge_resets: bool,
    max_matches: u32,
    matches_finished: u32,
    latest: Option<Snapshot>,
}

impl BotState {
    pub fn new(options: &ClientOptions) -> Self {
        Self {
            phase: Phase::Connecting,
            autopilot: Autopilot::new(),
            acknowledge_resets: options.acknowledge_resets,
            max_matches: options.max_matches,
            matches_finished: 0,
            latest: None,
        }
    }

    /// Applies one server message and returns the reply to send, if any
    pub fn handle_packet(
        &mut self,
        packet: ServerPacket,
    ) -> Result<Option<ClientPacket>, ClientError> {
        match packet {
            ServerPacket::Accepted => {
                if self.phase == Phase::Connecting {
                    info!("Connected, sending ready");
                    self.phase = Phase::Lobby;
                    return Ok(Some(ClientPacket::Ready));
                }
                Ok(None)
            }
            ServerPacket::Full => {
                if self.phase == Phase::Connecting {
                    return Err(ClientError::ServerFull);
                }
                Ok(None)
            }
            ServerPacket::Start => {
                if self.phase != Phase::Playing {
                    info!("Match started");
                    self.phase = Phase::Playing;
                }
                Ok(None)
            }
            ServerPacket::Snapshot(snapshot) => Ok(self.handle_snapshot(snapshot)),
        }
    }

    fn handle_snapshot(&mut self, snapshot: Snapshot) -> Option<ClientPacket> {
        if self.phase != Phase::Playing {
            if !snapshot.started {
                return None;
            }
            // Start message was lost.
            debug!("Snapshot before start message, joining match");
            self.phase = Phase::Playing;
        }

        let was_terminated = self.latest.as_ref().map_or(false, |s| s.terminated);
        let just_ended = snapshot.terminated && !was_terminated;

        if just_ended {
            self.matches_finished += 1;
            info!(
                "Match {} over with score {}: {}",
                self.matches_finished, snapshot.score, snapshot.end_message
            );
        } else if was_terminated && !snapshot.terminated {
            info!("Match restarted");
        }

        self.latest = Some(snapshot);

        if just_ended && self.wants_reset() {
            Some(ClientPacket::ResetAck)
        } else {
            None
        }
    }

    /// Input for the next tick while a match is running
    pub fn next_input(&self) -> Option<ClientPacket> {
        if self.phase != Phase::Playing {
            return None;
        }
        let snapshot = self.latest.as_ref().filter(|s| !s.terminated)?;
        let action = self.autopilot.decide(snapshot);
        Some(ClientPacket::Input {
            jump: action.jump,
            crouch: action.crouch,
        })
    }

    /// Handshake message to repeat until the server moves on
    pub fn pending_handshake(&self) -> Option<ClientPacket> {
        match self.phase {
            Phase::Connecting => Some(ClientPacket::Connect),
            Phase::Lobby => Some(ClientPacket::Ready),
            Phase::Playing => {
                let terminated = self.latest.as_ref().map_or(false, |s| s.terminated);
                if terminated && self.wants_reset() {
                    Some(ClientPacket::ResetAck)
                } else {
                    None
                }
            }
        }
    }

    fn wants_reset(&self) -> bool {
        self.acknowledge_resets && !self.is_finished()
    }

    /// True once the requested number of matches has been played
    pub fn is_finished(&self) -> bool {
        self.max_matches > 0 && self.matches_finished >= self.max_matches
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn matches_finished(&self) -> u32 {
        self.matches_finished
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.latest.as_ref()
    }
}

/// Headless bot client
pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    state: BotState,
}

impl Client {
    pub async fn new(options: ClientOptions) -> Result<Self, ClientError> {
        let server_addr = options
            .server_addr
            .parse()
            .map_err(|_| ClientError::InvalidAddress(options.server_addr.clone()))?;
        let bind_addr = match server_addr {
            SocketAddr::V4(_) => "0.0.0.0:0",
            SocketAddr::V6(_) => "[::]:0",
        };
        let socket = UdpSocket::bind(bind_addr).await?;

        Ok(Client {
            socket,
            server_addr,
            state: BotState::new(&options),
        })
    }

    pub fn state(&self) -> &BotState {
        &self.state
    }

    async fn send_packet(&self, packet: ClientPacket) -> Result<(), ClientError> {
        self.socket
            .send_to(packet.encode().as_bytes(), self.server_addr)
            .await?;
        Ok(())
    }

    /// Plays until the requested number of matches is done
    pub async fn run(&mut self) -> Result<(), ClientError> {
        info!("Connecting to {}", self.server_addr);

        let mut input_interval = interval(Duration::from_millis(TICK_MS));
        input_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut handshake_interval = interval(HANDSHAKE_RESEND);
        handshake_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

        while !self.state.is_finished() {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, addr)) => {
                            if addr != self.server_addr {
                                debug!("Ignoring datagram from {}", addr);
                                continue;
                            }
                            match ServerPacket::decode(&buffer[..len]) {
                                Ok(packet) => {
                                    if let Some(reply) = self.state.handle_packet(packet)? {
                                        self.send_packet(reply).await?;
                                    }
                                }
                                Err(e) => warn!("Failed to decode server message: {}", e),
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = input_interval.tick() => {
                    if let Some(input) = self.state.next_input() {
                        if let Err(e) = self.send_packet(input).await {
                            error!("Error sending input: {}", e);
                        }
                    }
                },

                _ = handshake_interval.tick() => {
                    if let Some(packet) = self.state.pending_handshake() {
                        self.send_packet(packet).await?;
                    }
                },
            }
        }

        info!(
            "Finished after {} matches",
            self.state.matches_finished()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(max_matches: u32) -> ClientOptions {
        ClientOptions {
            max_matches,
            ..ClientOptions::default()
        }
    }

    fn snapshot(tick: u32, terminated: bool) -> ServerPacket {
        ServerPacket::Snapshot(Snapshot {
            tick,
            started: true,
            terminated,
            ..Snapshot::default()
        })
    }

    #[test]
    fn test_handshake_sequence() {
        let mut state = BotState::new(&options(0));
        assert_eq!(state.pending_handshake(), Some(ClientPacket::Connect));

        let reply = state.handle_packet(ServerPacket::Accepted).unwrap();
        assert_eq!(reply, Some(ClientPacket::Ready));
        assert_eq!(state.phase(), Phase::Lobby);
        assert_eq!(state.pending_handshake(), Some(ClientPacket::Ready));

        // Duplicate OK does not re-send ready.
        assert_eq!(state.handle_packet(ServerPacket::Accepted).unwrap(), None);

        state.handle_packet(ServerPacket::Start).unwrap();
        assert_eq!(state.phase(), Phase::Playing);
        assert_eq!(state.pending_handshake(), None);
    }

    #[test]
    fn test_full_server_is_an_error() {
        let mut state = BotState::new(&options(0));
        assert!(matches!(
            state.handle_packet(ServerPacket::Full),
            Err(ClientError::ServerFull)
        ));
    }

    #[test]
    fn test_snapshot_joins_match_when_start_is_lost() {
        let mut state = BotState::new(&options(0));
        state.handle_packet(ServerPacket::Accepted).unwrap();
        state.handle_packet(snapshot(3, false)).unwrap();
        assert_eq!(state.phase(), Phase::Playing);
        assert!(matches!(
            state.next_input(),
            Some(ClientPacket::Input { .. })
        ));
    }

    #[test]
    fn test_no_input_before_playing() {
        let state = BotState::new(&options(0));
        assert_eq!(state.next_input(), None);
    }

    #[test]
    fn test_reset_sent_once_per_match_end() {
        let mut state = BotState::new(&options(0));
        state.handle_packet(ServerPacket::Accepted).unwrap();
        state.handle_packet(ServerPacket::Start).unwrap();
        state.handle_packet(snapshot(1, false)).unwrap();

        let reply = state.handle_packet(snapshot(2, true)).unwrap();
        assert_eq!(reply, Some(ClientPacket::ResetAck));
        assert_eq!(state.matches_finished(), 1);
        assert_eq!(state.next_input(), None);

        assert_eq!(state.handle_packet(snapshot(3, true)).unwrap(), None);
        assert_eq!(state.pending_handshake(), Some(ClientPacket::ResetAck));

        state.handle_packet(snapshot(0, false)).unwrap();
        assert_eq!(state.pending_handshake(), None);
        assert_eq!(state.matches_finished(), 1);
    }

    #[test]
    fn test_no_reset_when_disabled() {
        let mut state = BotState::new(&ClientOptions {
            acknowledge_resets: false,
            ..ClientOptions::default()
        });
        state.handle_packet(ServerPacket::Accepted).unwrap();
        state.handle_packet(ServerPacket::Start).unwrap();
        assert_eq!(state.handle_packet(snapshot(5, true)).unwrap(), None);
        assert_eq!(state.pending_handshake(), None);
    }

    #[test]
    fn test_finishes_after_match_limit() {
        let mut state = BotState::new(&options(1));
        state.handle_packet(ServerPacket::Accepted).unwrap();
        state.handle_packet(ServerPacket::Start).unwrap();
        assert!(!state.is_finished());

        assert_eq!(state.handle_packet(snapshot(9, true)).unwrap(), None);
        assert!(state.is_finished());
    }

    #[test]
    fn test_invalid_server_address() {
        let result = tokio_test::block_on(Client::new(ClientOptions {
            server_addr: "nowhere".to_string(),
            ..ClientOptions::default()
        }));
        assert!(matches!(result, Err(ClientError::InvalidAddress(_))));
    }
}
