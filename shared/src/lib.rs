//! Wire protocol and game constants shared by the runner server and its clients.

pub mod protocol;

pub use protocol::{
    ClientPacket, ObstacleKind, ObstacleSnapshot, PlayerSnapshot, ProtocolError, ServerPacket,
    Snapshot,
};

// Network
pub const SERVER_PORT: u16 = 8999;
pub const MAX_CLIENTS: usize = 2;
pub const TICK_MS: u64 = 16;
pub const RECV_TIMEOUT_MS: u64 = 5;
pub const MAX_DATAGRAM_SIZE: usize = 512;

// World, y axis points up
pub const GRAVITY: f32 = -800.0;
pub const JUMP_VELOCITY: f32 = 400.0;
pub const GROUND_Y: f32 = 60.0;
pub const WORLD_WIDTH: f32 = 1200.0;

// Scrolling
pub const INITIAL_SPEED: f32 = 260.0;
pub const SPEED_INCREASE: f32 = 10.0;
pub const SCORE_FACTOR: f32 = 0.4;

// Players share one lane
pub const PLAYER_X: f32 = 50.0;
pub const PLAYER_WIDTH: f32 = 50.0;
pub const PLAYER_HEIGHT: f32 = 60.0;
pub const PLAYER_CROUCH_HEIGHT: f32 = 30.0;

/// Fraction of width (x) and height (y) trimmed from each side of a body
/// before collision testing.
pub const HITBOX_MARGIN_X: f32 = 0.15;
pub const HITBOX_MARGIN_Y: f32 = 0.10;

// Obstacles
pub const GROUND_HAZARD_WIDTH: f32 = 30.0;
pub const GROUND_HAZARD_MIN_HEIGHT: f32 = 30.0;
pub const GROUND_HAZARD_MAX_HEIGHT: f32 = 50.0;
pub const FLYER_WIDTH: f32 = 50.0;
pub const FLYER_HEIGHT: f32 = 25.0;
pub const FLYER_ALTITUDES: [f32; 3] = [80.0, 110.0, 140.0];

/// Fixed text announced when a match ends.
pub const DRAW_MESSAGE: &str = "EMPATE!";
pub const PLAYER_ONE_WINS_MESSAGE: &str = "JUGADOR 1 GANA!";
pub const PLAYER_TWO_WINS_MESSAGE: &str = "JUGADOR 2 GANA!";

/// Score for a given scroll velocity. Depends on nothing but the velocity.
pub fn score_for_speed(speed: f32) -> u32 {
    ((speed - INITIAL_SPEED) * SCORE_FACTOR).max(0.0) as u32
}
