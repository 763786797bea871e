use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// World constants. Lengths are in screen units, one unit per pixel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub screen_width: u32,
    pub screen_height: u32,
    pub gravity: f32,
    pub flap_impulse: f32,
    pub bird_x: f32,
    pub bird_width: f32,
    pub bird_height: f32,
    pub pipe_width: f32,
    pub pipe_length: f32,
    pub pipe_gap: f32,
    pub pipe_speed: f32,
    /// Smallest gap top edge a spawned pair may get.
    pub gap_margin_top: u32,
    /// Distance from the bottom of the screen to the largest gap top edge.
    pub gap_margin_bottom: u32,
    pub spawn_interval_ms: u32,
    pub frame_rate: u32,
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            screen_width: 800,
            screen_height: 600,
            gravity: 0.4,
            flap_impulse: -7.0,
            bird_x: 50.0,
            bird_width: 40.0,
            bird_height: 30.0,
            pipe_width: 80.0,
            pipe_length: 800.0,
            pipe_gap: 150.0,
            pipe_speed: 5.0,
            gap_margin_top: 100,
            gap_margin_bottom: 200,
            spawn_interval_ms: 1500,
            frame_rate: 60,
            seed: None,
        }
    }
}

impl SimConfig {
    /// Frames between two obstacle spawns, rounded to the nearest frame.
    pub fn spawn_every_frames(&self) -> u32 {
        let frames = (u64::from(self.spawn_interval_ms) * u64::from(self.frame_rate) + 500) / 1000;
        frames.max(1) as u32
    }

    /// Inclusive range the gap's top edge is drawn from.
    pub fn gap_range(&self) -> (i32, i32) {
        let lo = self.gap_margin_top as i32;
        let hi = self.screen_height as i32 - self.gap_margin_bottom as i32;
        (lo, hi)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.screen_width == 0 || self.screen_height == 0 {
            return Err(ConfigError::Invalid("screen dimensions must be non-zero".into()));
        }
        if self.frame_rate == 0 {
            return Err(ConfigError::Invalid("frame_rate must be non-zero".into()));
        }
        let (lo, hi) = self.gap_range();
        if lo > hi {
            return Err(ConfigError::Invalid(format!(
                "gap range is empty: {lo}..={hi} on a screen {} high",
                self.screen_height
            )));
        }
        if self.pipe_speed <= 0.0 {
            return Err(ConfigError::Invalid("pipe_speed must be positive".into()));
        }
        Ok(())
    }
}

/// Reward shaping and search settings for the neuro-evolution run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeatConfig {
    pub population: usize,
    pub generations: u32,
    pub survival_reward: f64,
    pub elimination_penalty: f64,
    pub flap_threshold: f32,
    pub hidden: usize,
    pub elite: usize,
    pub mutation_rate: f32,
    pub mutation_power: f32,
    /// Cap on frames per generation; survivors are finalised without penalty when reached.
    pub max_frames: Option<u64>,
}

impl Default for NeatConfig {
    fn default() -> Self {
        Self {
            population: 50,
            generations: 50,
            survival_reward: 0.1,
            elimination_penalty: 5.0,
            flap_threshold: 0.5,
            hidden: 6,
            elite: 5,
            mutation_rate: 0.3,
            mutation_power: 0.5,
            max_frames: Some(36_000),
        }
    }
}

impl NeatConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population == 0 {
            return Err(ConfigError::Invalid("population must be non-zero".into()));
        }
        if self.hidden == 0 {
            return Err(ConfigError::Invalid("hidden layer must be non-zero".into()));
        }
        if self.elite == 0 || self.elite > self.population {
            return Err(ConfigError::Invalid(format!(
                "elite must be in 1..={}, got {}",
                self.population, self.elite
            )));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(ConfigError::Invalid("mutation_rate must be within 0..=1".into()));
        }
        Ok(())
    }
}

/// Temporal-difference settings for the tabular learner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QLearnConfig {
    /// Weight of the new estimate; the old value keeps `1 - learning_rate`.
    pub learning_rate: f32,
    pub step_reward: f32,
    pub terminal_reward: f32,
    pub episodes: Option<u32>,
    pub max_steps_per_episode: Option<u64>,
}

impl Default for QLearnConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.6,
            step_reward: 15.0,
            terminal_reward: -1500.0,
            episodes: None,
            max_steps_per_episode: None,
        }
    }
}

impl QLearnConfig {
    /// Step cap applied to unattended runs that were not given one.
    pub const UNATTENDED_STEP_CAP: u64 = 36_000;

    /// Copy with `max_steps_per_episode` set, so every episode is guaranteed to end.
    pub fn with_step_cap(&self) -> Self {
        Self {
            max_steps_per_episode: Some(
                self.max_steps_per_episode.unwrap_or(Self::UNATTENDED_STEP_CAP),
            ),
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.learning_rate) {
            return Err(ConfigError::Invalid("learning_rate must be within 0..=1".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sim: SimConfig,
    pub neat: NeatConfig,
    pub qlearn: QLearnConfig,
}

impl Config {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sim.validate()?;
        self.neat.validate()?;
        self.qlearn.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_world() {
        let sim = SimConfig::default();
        assert_eq!(sim.spawn_every_frames(), 90);
        assert_eq!(sim.gap_range(), (100, 400));
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let raw = r#"{ "sim": { "seed": 7 }, "neat": { "population": 12 } }"#;
        let cfg: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.sim.seed, Some(7));
        assert_eq!(cfg.sim.screen_height, 600);
        assert_eq!(cfg.neat.population, 12);
        assert_eq!(cfg.qlearn.step_reward, 15.0);
    }

    #[test]
    fn empty_gap_range_is_rejected() {
        let sim = SimConfig { screen_height: 250, ..SimConfig::default() };
        assert!(matches!(sim.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn step_cap_fills_in_only_when_missing() {
        let open = QLearnConfig::default();
        assert_eq!(open.with_step_cap().max_steps_per_episode, Some(36_000));
        let capped = QLearnConfig { max_steps_per_episode: Some(5), ..open };
        assert_eq!(capped.with_step_cap(), capped);
    }

    #[test]
    fn elite_larger_than_population_is_rejected() {
        let neat = NeatConfig { population: 3, elite: 4, ..NeatConfig::default() };
        assert!(neat.validate().is_err());
    }
}
