use std::collections::VecDeque;

use log::trace;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::SimConfig;
use crate::judge::Rect;

/// A top and a bottom obstacle around one gap. Both obstacles are derived from the single
/// stored `x`, so they can never drift apart.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObstaclePair {
    /// Left edge shared by both obstacles.
    pub x: f32,
    /// Upper edge of the gap, which is also the bottom of the top obstacle.
    pub gap_top: f32,
    width: f32,
    gap: f32,
    length: f32,
}

impl ObstaclePair {
    pub fn new(x: f32, gap_top: f32, cfg: &SimConfig) -> Self {
        Self {
            x,
            gap_top,
            width: cfg.pipe_width,
            gap: cfg.pipe_gap,
            length: cfg.pipe_length,
        }
    }

    pub fn top(&self) -> Rect {
        Rect::new(self.x, self.gap_top - self.length, self.width, self.length)
    }

    pub fn bottom(&self) -> Rect {
        Rect::new(self.x, self.gap_bottom(), self.width, self.length)
    }

    pub fn gap_bottom(&self) -> f32 {
        self.gap_top + self.gap
    }

    pub fn gap_center(&self) -> f32 {
        self.gap_top + self.gap / 2.0
    }

    /// Trailing edge.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn translate(&mut self, dx: f32) {
        self.x += dx;
    }
}

/// Spawns pairs on a fixed frame interval, scrolls them left and culls them in spawn order.
/// Index 0 is always the nearest pair.
pub struct ObstacleStream {
    pairs: VecDeque<ObstaclePair>,
    rng: SmallRng,
    template: SimConfig,
    spawn_every: u32,
    frames_since_spawn: u32,
    score: u32,
    spawned: u64,
}

impl ObstacleStream {
    pub fn new(cfg: &SimConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self {
            pairs: VecDeque::new(),
            rng,
            template: cfg.clone(),
            spawn_every: cfg.spawn_every_frames(),
            frames_since_spawn: 0,
            score: 0,
            spawned: 0,
        }
    }

    /// One simulation frame: spawn if due, scroll, then cull from the front. Returns how many
    /// pairs left the screen; the score has already been credited for them.
    pub fn advance(&mut self) -> u32 {
        self.frames_since_spawn += 1;
        if self.frames_since_spawn >= self.spawn_every {
            self.frames_since_spawn = 0;
            self.spawn_now();
        }

        let dx = -self.template.pipe_speed;
        for pair in self.pairs.iter_mut() {
            pair.translate(dx);
        }

        let mut removed = 0;
        while self.pairs.front().is_some_and(|pair| pair.right() < 0.0) {
            self.pairs.pop_front();
            removed += 1;
        }
        self.score += removed;
        removed
    }

    /// Spawns a pair at the right edge with a random gap, independent of the timer.
    pub fn spawn_now(&mut self) {
        let (lo, hi) = self.template.gap_range();
        let gap_top = self.rng.gen_range(lo..=hi) as f32;
        let x = self.template.screen_width as f32;
        self.push_pair(ObstaclePair::new(x, gap_top, &self.template));
        trace!("spawned pair #{} with gap at {gap_top}", self.spawned);
    }

    /// Appends a hand-built pair behind the existing ones.
    pub fn push_pair(&mut self, pair: ObstaclePair) {
        self.pairs.push_back(pair);
        self.spawned += 1;
    }

    pub fn pairs(&self) -> impl Iterator<Item = &ObstaclePair> {
        self.pairs.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ObstaclePair> {
        self.pairs.get(index)
    }

    pub fn nearest(&self) -> Option<&ObstaclePair> {
        self.pairs.front()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn spawned(&self) -> u64 {
        self.spawned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (SimConfig, ObstacleStream) {
        let cfg = SimConfig { seed: Some(42), ..SimConfig::default() };
        let stream = ObstacleStream::new(&cfg, cfg.seed);
        (cfg, stream)
    }

    #[test]
    fn first_spawn_waits_for_the_interval() {
        let (_, mut stream) = seeded();
        for _ in 0..89 {
            stream.advance();
        }
        assert!(stream.is_empty());
        stream.advance();
        assert_eq!(stream.len(), 1);
        // spawned at the edge and scrolled once in the same frame
        assert_eq!(stream.nearest().unwrap().x, 795.0);
    }

    #[test]
    fn spawned_gaps_stay_within_margins() {
        let (_, mut stream) = seeded();
        for _ in 0..500 {
            stream.spawn_now();
        }
        for pair in stream.pairs() {
            assert!((100.0..=400.0).contains(&pair.gap_top), "gap {}", pair.gap_top);
            assert_eq!(pair.gap_bottom() - pair.gap_top, 150.0);
        }
    }

    #[test]
    fn both_obstacles_share_x_forever() {
        let (_, mut stream) = seeded();
        for _ in 0..2_000 {
            stream.advance();
            for pair in stream.pairs() {
                assert_eq!(pair.top().x.to_bits(), pair.bottom().x.to_bits());
            }
        }
    }

    #[test]
    fn pair_position_after_250_translations() {
        let cfg = SimConfig::default();
        let mut pair = ObstaclePair::new(800.0, 300.0, &cfg);
        for _ in 0..250 {
            pair.translate(-cfg.pipe_speed);
        }
        assert_eq!(pair.x, -450.0);
    }

    #[test]
    fn pair_is_culled_once_its_trailing_edge_leaves() {
        let (cfg, mut stream) = seeded();
        stream.push_pair(ObstaclePair::new(800.0, 300.0, &cfg));

        let mut culled_at = None;
        for frame in 1..=250 {
            if stream.advance() > 0 && culled_at.is_none() {
                culled_at = Some(frame);
            }
        }

        // x + 80 < 0 first holds at x = -85, after 177 steps
        assert_eq!(culled_at, Some(177));
        assert!(stream.pairs().all(|pair| pair.x > -80.0));
        assert!(stream.score() >= 1);
    }

    #[test]
    fn removal_is_fifo_and_scores_once_per_pair() {
        let (cfg, mut stream) = seeded();
        for (i, x) in [10.0, 60.0, 110.0].into_iter().enumerate() {
            stream.push_pair(ObstaclePair::new(x, 100.0 + i as f32, &cfg));
        }

        let mut removed_gaps = Vec::new();
        let mut last_score = 0;
        for _ in 0..60 {
            let before: Vec<f32> = stream.pairs().map(|p| p.gap_top).collect();
            let removed = stream.advance() as usize;
            removed_gaps.extend_from_slice(&before[..removed]);
            assert_eq!(stream.score() - last_score, removed as u32);
            last_score = stream.score();
        }

        assert_eq!(removed_gaps, vec![100.0, 101.0, 102.0]);
        assert_eq!(stream.score(), 3);
    }

    #[test]
    fn same_seed_same_course() {
        let cfg = SimConfig::default();
        let mut a = ObstacleStream::new(&cfg, Some(9));
        let mut b = ObstacleStream::new(&cfg, Some(9));
        for _ in 0..10 {
            a.spawn_now();
            b.spawn_now();
        }
        let gaps_a: Vec<f32> = a.pairs().map(|p| p.gap_top).collect();
        let gaps_b: Vec<f32> = b.pairs().map(|p| p.gap_top).collect();
        assert_eq!(gaps_a, gaps_b);
    }
}
