use crate::bird::Bird;
use crate::pipes::ObstacleStream;

/// Axis-aligned rectangle with `(x, y)` at its top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    /// Half-open overlap: rectangles that only share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left() < other.right()
            && other.left() < self.right()
            && self.top() < other.bottom()
            && other.top() < self.bottom()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// Left the screen through the top or bottom edge.
    Boundary,
    /// Overlapped an obstacle of a live pair.
    Collision,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Alive,
    Terminal(Termination),
}

impl Verdict {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Verdict::Terminal(_))
    }
}

/// Decides whether `bird` ended its run this frame. Boundary exit wins over a simultaneous
/// collision.
pub fn judge(bird: &Bird, stream: &ObstacleStream, screen_height: f32) -> Verdict {
    let body = bird.bounds();
    if body.top() <= 0.0 || body.bottom() >= screen_height {
        return Verdict::Terminal(Termination::Boundary);
    }
    let hit = stream
        .pairs()
        .any(|pair| body.intersects(&pair.top()) || body.intersects(&pair.bottom()));
    if hit {
        Verdict::Terminal(Termination::Collision)
    } else {
        Verdict::Alive
    }
}
