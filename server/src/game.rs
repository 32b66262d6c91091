//! Authoritative match simulation.
//!
//! One [`Simulation`] owns the [`MatchState`] of the running match and advances it
//! by exactly one fixed step per call to [`Simulation::advance`]. Obstacle
//! selection draws from an injected random source so a seeded generator
//! replays the same spawn sequence.

use crate::physics::{integrate_vertical, Rect};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    score_for_speed, ObstacleKind, ObstacleSnapshot, PlayerSnapshot, DRAW_MESSAGE,
    FLYER_ALTITUDES, FLYER_HEIGHT, FLYER_WIDTH, GROUND_HAZARD_MAX_HEIGHT,
    GROUND_HAZARD_MIN_HEIGHT, GROUND_HAZARD_WIDTH, GROUND_Y, INITIAL_SPEED, JUMP_VELOCITY,
    PLAYER_CROUCH_HEIGHT, PLAYER_HEIGHT, PLAYER_ONE_WINS_MESSAGE, PLAYER_TWO_WINS_MESSAGE,
    PLAYER_WIDTH, PLAYER_X, SPEED_INCREASE, WORLD_WIDTH,
};

const INITIAL_SPAWN_INTERVAL: f32 = 1.8;
const MIN_SPAWN_INTERVAL: f32 = 1.0;
/// Seconds removed from the spawn interval per 500 units/s gained.
const SPAWN_INTERVAL_SLOPE: f32 = 0.3;
const GROUND_HAZARD_CHANCE: f64 = 0.7;
const GROUND_HAZARD_VARIANTS: u8 = 5;
const FLYER_VARIANTS: u8 = 3;
const ANIMATION_INTERVAL: f32 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub y: f32,
    pub vel_y: f32,
    pub grounded: bool,
    pub crouching: bool,
    pub alive: bool,
    /// Sprite frame, alternates between 0 and 1 while running.
    pub frame: u8,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            y: GROUND_Y,
            vel_y: 0.0,
            grounded: true,
            crouching: false,
            alive: true,
            frame: 0,
        }
    }
}

impl PlayerState {
    pub fn height(&self) -> f32 {
        if self.crouching {
            PLAYER_CROUCH_HEIGHT
        } else {
            PLAYER_HEIGHT
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(PLAYER_X, self.y, PLAYER_WIDTH, self.height())
    }

    /// Applies one step of input and gravity. Dead players do not move.
    fn step(&mut self, dt: f32, jump: bool, crouch: bool) {
        if !self.alive {
            return;
        }

        if jump && self.grounded && !self.crouching {
            self.vel_y = JUMP_VELOCITY;
            self.grounded = false;
        }

        // Crouching is only possible on the ground.
        self.crouching = self.grounded && crouch;

        let motion = integrate_vertical(self.y, self.vel_y, dt);
        self.y = motion.y;
        self.vel_y = motion.velocity;
        self.grounded = motion.grounded;
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            y: self.y,
            grounded: self.grounded,
            crouching: self.crouching,
            alive: self.alive,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle {
    pub kind: ObstacleKind,
    pub variant: u8,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Obstacle {
    pub fn ground_hazard(x: f32, height: f32, variant: u8) -> Self {
        Self {
            kind: ObstacleKind::GroundHazard,
            variant,
            x,
            y: GROUND_Y,
            width: GROUND_HAZARD_WIDTH,
            height,
        }
    }

    pub fn flyer(x: f32, altitude: f32, variant: u8) -> Self {
        Self {
            kind: ObstacleKind::Flyer,
            variant,
            x,
            y: altitude,
            width: FLYER_WIDTH,
            height: FLYER_HEIGHT,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// True once the obstacle has fully scrolled past the left edge.
    pub fn is_off_screen(&self) -> bool {
        self.x + self.width < 0.0
    }

    pub fn snapshot(&self) -> ObstacleSnapshot {
        ObstacleSnapshot {
            kind: self.kind,
            variant: self.variant,
            x: self.x,
            y: self.y,
        }
    }
}

/// Everything a snapshot or the debug view needs to know about a match.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchState {
    pub velocity: f32,
    pub score: u32,
    pub terminated: bool,
    pub end_message: String,
    pub obstacles: Vec<Obstacle>,
    pub players: [PlayerState; 2],
}

impl Default for MatchState {
    fn default() -> Self {
        Self {
            velocity: INITIAL_SPEED,
            score: 0,
            terminated: false,
            end_message: String::new(),
            obstacles: Vec::new(),
            players: [PlayerState::default(), PlayerState::default()],
        }
    }
}

/// Fixed-step simulation of one match.
#[derive(Debug)]
pub struct Simulation<R = StdRng> {
    state: MatchState,
    spawn_timer: f32,
    spawn_interval: f32,
    animation_timer: f32,
    rng: R,
}

impl Simulation<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Simulation whose spawn sequence is fully determined by `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for Simulation<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> Simulation<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            state: MatchState::default(),
            spawn_timer: 0.0,
            spawn_interval: INITIAL_SPAWN_INTERVAL,
            animation_timer: 0.0,
            rng,
        }
    }

    /// Advances the match by one step of `dt` seconds.
    ///
    /// `*_jump` are edge signals consumed by this step, `*_crouch` are held
    /// states. Does nothing once the match has terminated.
    pub fn advance(
        &mut self,
        dt: f32,
        p1_jump: bool,
        p1_crouch: bool,
        p2_jump: bool,
        p2_crouch: bool,
    ) {
        if self.state.terminated {
            return;
        }

        self.state.players[0].step(dt, p1_jump, p1_crouch);
        self.state.players[1].step(dt, p2_jump, p2_crouch);

        self.state.velocity += SPEED_INCREASE * dt;
        self.state.score = score_for_speed(self.state.velocity);

        self.spawn_timer += dt;
        if self.spawn_timer >= self.spawn_interval {
            self.spawn_obstacle();
            self.spawn_timer = 0.0;
            self.spawn_interval = spawn_interval_for(self.state.velocity);
        }

        let distance = self.state.velocity * dt;
        for obstacle in &mut self.state.obstacles {
            obstacle.x -= distance;
        }
        self.state.obstacles.retain(|obstacle| !obstacle.is_off_screen());

        self.detect_collisions();
        self.check_termination();
        self.animate(dt);
    }

    /// Restores the initial configuration of a fresh match.
    pub fn reset(&mut self) {
        self.state = MatchState::default();
        self.spawn_timer = 0.0;
        self.spawn_interval = INITIAL_SPAWN_INTERVAL;
        self.animation_timer = 0.0;
    }

    /// Places an obstacle directly, bypassing the spawn timer.
    pub fn push_obstacle(&mut self, obstacle: Obstacle) {
        self.state.obstacles.push(obstacle);
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn players(&self) -> &[PlayerState; 2] {
        &self.state.players
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.state.obstacles
    }

    pub fn velocity(&self) -> f32 {
        self.state.velocity
    }

    pub fn score(&self) -> u32 {
        self.state.score
    }

    pub fn is_terminated(&self) -> bool {
        self.state.terminated
    }

    pub fn end_message(&self) -> &str {
        &self.state.end_message
    }

    pub fn spawn_interval(&self) -> f32 {
        self.spawn_interval
    }

    fn spawn_obstacle(&mut self) {
        let obstacle = if self.rng.gen_bool(GROUND_HAZARD_CHANCE) {
            let height = self
                .rng
                .gen_range(GROUND_HAZARD_MIN_HEIGHT..=GROUND_HAZARD_MAX_HEIGHT);
            let variant = self.rng.gen_range(0..GROUND_HAZARD_VARIANTS);
            Obstacle::ground_hazard(WORLD_WIDTH, height, variant)
        } else {
            let altitude = FLYER_ALTITUDES[self.rng.gen_range(0..FLYER_ALTITUDES.len())];
            let variant = self.rng.gen_range(0..FLYER_VARIANTS);
            Obstacle::flyer(WORLD_WIDTH, altitude, variant)
        };

        self.state.obstacles.push(obstacle);
    }

    fn detect_collisions(&mut self) {
        let obstacles = &self.state.obstacles;
        for player in self.state.players.iter_mut().filter(|p| p.alive) {
            let hitbox = player.bounds().hitbox();
            if obstacles
                .iter()
                .any(|obstacle| hitbox.overlaps(&obstacle.bounds().hitbox()))
            {
                player.alive = false;
            }
        }
    }

    fn check_termination(&mut self) {
        let [p1, p2] = &self.state.players;
        let message = match (p1.alive, p2.alive) {
            (false, false) => DRAW_MESSAGE,
            (false, true) => PLAYER_TWO_WINS_MESSAGE,
            (true, false) => PLAYER_ONE_WINS_MESSAGE,
            (true, true) => return,
        };

        self.state.terminated = true;
        self.state.end_message = message.to_string();
        info!(
            "Match over with score {}: {}",
            self.state.score, self.state.end_message
        );
    }

    fn animate(&mut self, dt: f32) {
        self.animation_timer += dt;
        if self.animation_timer < ANIMATION_INTERVAL {
            return;
        }

        for player in &mut self.state.players {
            if player.alive && player.grounded {
                player.frame = (player.frame + 1) % 2;
            }
        }
        self.animation_timer = 0.0;
    }
}

/// Spawn interval once the match has reached `velocity`. Shrinks as the
/// match speeds up, never below the minimum.
pub fn spawn_interval_for(velocity: f32) -> f32 {
    let gained = (velocity - INITIAL_SPEED).max(0.0) / 500.0;
    (INITIAL_SPAWN_INTERVAL - gained * SPAWN_INTERVAL_SLOPE).max(MIN_SPAWN_INTERVAL)
}
