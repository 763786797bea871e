//! Turns world state into what a policy sees.
//!
//! The population learner receives a small continuous vector. The tabular learner receives a
//! bucketed `(x, y)` pair that always indexes inside the value table.

use crate::bird::Bird;
use crate::pipes::{ObstaclePair, ObstacleStream};

/// Width of the continuous observation.
pub const FEATURES: usize = 4;

pub const X_BUCKETS: usize = 20;
pub const Y_BUCKETS: usize = 16;
/// Screen units per bucket on both axes.
pub const BUCKET_SIZE: f32 = 40.0;

/// The pair the population learner aims for: pair 0 until the bird has passed its trailing
/// edge, then pair 1 when there is one.
pub fn target_pair<'a>(bird: &Bird, stream: &'a ObstacleStream) -> Option<&'a ObstaclePair> {
    let first = stream.get(0)?;
    if stream.len() > 1 && bird.x > first.right() {
        stream.get(1)
    } else {
        Some(first)
    }
}

/// `[y, |y - gap top|, |y - gap bottom|, flaps]`, with zeros for the obstacle features while no
/// pair exists.
pub fn population_features(bird: &Bird, stream: &ObstacleStream) -> [f32; FEATURES] {
    let (to_top, to_bottom) = match target_pair(bird, stream) {
        Some(pair) => ((bird.y - pair.gap_top).abs(), (bird.y - pair.gap_bottom()).abs()),
        None => (0.0, 0.0),
    };
    [bird.y, to_top, to_bottom, bird.flaps as f32]
}

/// Bucket coordinates into the value table. Construction clamps, so every value of this type
/// is a valid index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TableState {
    x: usize,
    y: usize,
}

impl TableState {
    pub fn new(x: i64, y: i64) -> Self {
        Self {
            x: x.clamp(0, X_BUCKETS as i64 - 1) as usize,
            y: y.clamp(0, Y_BUCKETS as i64 - 1) as usize,
        }
    }

    pub fn x(&self) -> usize {
        self.x
    }

    pub fn y(&self) -> usize {
        self.y
    }
}

/// Discretises the bird's offset to the bottom obstacle of the nearest pair. With no pair the
/// obstacle is taken to sit at the origin.
pub fn table_state(
    bird: &Bird,
    stream: &ObstacleStream,
    screen_width: f32,
    screen_height: f32,
) -> TableState {
    let (pipe_x, pipe_y) = stream
        .nearest()
        .map(|pair| (pair.x, pair.gap_bottom()))
        .unwrap_or((0.0, 0.0));

    let x = pipe_x.min(screen_width);
    let x_bucket = (x / BUCKET_SIZE).floor() as i64 - 1;

    let mut dy = pipe_y - bird.y;
    if dy < 0.0 {
        dy += screen_height;
    }
    let y_bucket = (dy / BUCKET_SIZE).floor() as i64;

    TableState::new(x_bucket, y_bucket)
}
