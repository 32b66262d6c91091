use shared::{GRAVITY, GROUND_Y, HITBOX_MARGIN_X, HITBOX_MARGIN_Y};

///Axis-aligned rectangle anchored at its bottom-left corner.
/// Positive y is up.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y + self.height
    }

    ///Returns the rectangle shrunk inward by the given fraction of its
    /// width and height on every side.
    pub fn shrink(&self, fraction_x: f32, fraction_y: f32) -> Rect {
        let dx = self.width * fraction_x;
        let dy = self.height * fraction_y;
        Rect {
            x: self.x + dx,
            y: self.y + dy,
            width: self.width - dx * 2.0,
            height: self.height - dy * 2.0,
        }
    }

    ///The forgiving box used for every collision test.
    pub fn hitbox(&self) -> Rect {
        self.shrink(HITBOX_MARGIN_X, HITBOX_MARGIN_Y)
    }

    ///Strict overlap test, touching edges do not count.
    pub fn overlaps(&self, other: &Rect) -> bool {
        !(self.right() <= other.x
            || other.right() <= self.x
            || self.top() <= other.y
            || other.top() <= self.y)
    }
}

///Result of one vertical integration step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalMotion {
    pub y: f32,
    pub velocity: f32,
    pub grounded: bool,
}

///Integrates gravity into velocity, then velocity into position.
/// Anything reaching the ground is clamped onto it and stopped.
pub fn integrate_vertical(y: f32, velocity: f32, dt: f32) -> VerticalMotion {
    let velocity = velocity + GRAVITY * dt;
    let y = y + velocity * dt;

    if y <= GROUND_Y {
        VerticalMotion {
            y: GROUND_Y,
            velocity: 0.0,
            grounded: true,
        }
    } else {
        VerticalMotion {
            y,
            velocity,
            grounded: false,
        }
    }
}
