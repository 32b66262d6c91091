//! Autopilot that plays from snapshots alone.
//!
//! Both characters stand at the same x position and see the same obstacles, so
//! the decision does not depend on which seat the client holds. Jumps sent while
//! airborne and crouches sent mid-air are ignored by the server.

use shared::{
    ObstacleKind, ObstacleSnapshot, Snapshot, FLYER_HEIGHT, FLYER_WIDTH, GROUND_HAZARD_WIDTH,
    GROUND_Y, HITBOX_MARGIN_X, HITBOX_MARGIN_Y, PLAYER_CROUCH_HEIGHT, PLAYER_HEIGHT,
    PLAYER_WIDTH, PLAYER_X,
};

/// Seconds of look-ahead before an obstacle reaches the player.
pub const DEFAULT_LEAD_TIME: f32 = 0.3;

/// Input to report for the next tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Action {
    pub jump: bool,
    pub crouch: bool,
}

impl Action {
    pub const IDLE: Action = Action {
        jump: false,
        crouch: false,
    };
    pub const JUMP: Action = Action {
        jump: true,
        crouch: false,
    };
    pub const CROUCH: Action = Action {
        jump: false,
        crouch: true,
    };
}

#[derive(Debug, Clone, Copy)]
pub struct Autopilot {
    lead_time: f32,
}

impl Default for Autopilot {
    fn default() -> Self {
        Self::new()
    }
}

impl Autopilot {
    pub fn new() -> Self {
        Self::with_lead_time(DEFAULT_LEAD_TIME)
    }

    pub fn with_lead_time(lead_time: f32) -> Self {
        Self { lead_time }
    }

    /// Picks the input for the nearest obstacle that is about to reach the
    /// player. Idle when nothing is close or the match is not running.
    pub fn decide(&self, snapshot: &Snapshot) -> Action {
        if !snapshot.started || snapshot.terminated {
            return Action::IDLE;
        }

        let (player_left, player_right) = hitbox_span(PLAYER_X, PLAYER_WIDTH);
        let lead = snapshot.velocity.max(0.0) * self.lead_time;

        let threat = snapshot
            .obstacles
            .iter()
            .filter(|obstacle| {
                let (left, right) = hitbox_span(obstacle.x, obstacle_width(obstacle));
                right > player_left && left - player_right <= lead
            })
            .min_by(|a, b| a.x.total_cmp(&b.x));

        match threat {
            Some(obstacle) => response_to(obstacle),
            None => Action::IDLE,
        }
    }
}

fn response_to(obstacle: &ObstacleSnapshot) -> Action {
    match obstacle.kind {
        ObstacleKind::GroundHazard => Action::JUMP,
        ObstacleKind::Flyer => {
            let bottom = obstacle.y + FLYER_HEIGHT * HITBOX_MARGIN_Y;
            if bottom >= standing_top(PLAYER_HEIGHT) {
                Action::IDLE
            } else if bottom >= standing_top(PLAYER_CROUCH_HEIGHT) {
                Action::CROUCH
            } else {
                Action::JUMP
            }
        }
    }
}

fn obstacle_width(obstacle: &ObstacleSnapshot) -> f32 {
    match obstacle.kind {
        ObstacleKind::GroundHazard => GROUND_HAZARD_WIDTH,
        ObstacleKind::Flyer => FLYER_WIDTH,
    }
}

/// Horizontal extent of a hitbox
fn hitbox_span(x: f32, width: f32) -> (f32, f32) {
    let margin = width * HITBOX_MARGIN_X;
    (x + margin, x + width - margin)
}

/// Top of the hitbox of a grounded player of the given height
fn standing_top(height: f32) -> f32 {
    GROUND_Y + height * (1.0 - HITBOX_MARGIN_Y)
}
