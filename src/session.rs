//! What the frontend drives: one of manual play, an evolution run or a learning run, plus the
//! discrete commands it can receive and the scene it hands to the renderer.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use log::info;

use crate::bird::{Bird, Kinematics};
use crate::config::SimConfig;
use crate::error::{EvaluationError, TableError};
use crate::evolution::{Evolution, GenerationSummary};
use crate::judge::{Rect, Termination, Verdict, judge};
use crate::pipes::{ObstaclePair, ObstacleStream};
use crate::policy::FeedForwardGenome;
use crate::population::Generation;
use crate::qlearn::{EpisodeSummary, QLearner};
use crate::qtable::QTable;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Flap,
    Quit,
    Save,
    Faster,
    Slower,
}

/// Simulation steps per rendered frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pace {
    steps_per_frame: u32,
}

impl Pace {
    pub const MAX_STEPS_PER_FRAME: u32 = 10_000;

    pub fn new() -> Self {
        Self { steps_per_frame: 1 }
    }

    pub fn steps_per_frame(&self) -> u32 {
        self.steps_per_frame
    }

    pub fn faster(&mut self) {
        self.steps_per_frame = self
            .steps_per_frame
            .saturating_mul(2)
            .min(Self::MAX_STEPS_PER_FRAME);
    }

    pub fn slower(&mut self) {
        self.steps_per_frame = (self.steps_per_frame / 2).max(1);
    }
}

impl Default for Pace {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BirdSprite {
    pub bounds: Rect,
    pub rising: bool,
    pub alpha: u8,
}

/// Everything the renderer needs for one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    pub birds: Vec<BirdSprite>,
    pub pipes: Vec<ObstaclePair>,
    pub hud: Vec<String>,
    pub banner: Option<String>,
    /// Score of each finished generation or episode, oldest first.
    pub chart: Vec<u32>,
}

fn sprite(bird: &Bird, alpha: u8) -> BirdSprite {
    BirdSprite {
        bounds: bird.bounds(),
        rising: bird.is_rising(),
        alpha,
    }
}

/// A human-controlled round. A flap after game over starts a new round.
pub struct PlayRound {
    bird: Bird,
    stream: ObstacleStream,
    kinematics: Kinematics,
    sim: SimConfig,
    over: Option<Termination>,
    high_score: u32,
    rounds: u32,
}

impl PlayRound {
    pub fn new(sim: SimConfig) -> Self {
        Self {
            bird: Bird::spawn(&sim),
            stream: ObstacleStream::new(&sim, sim.seed),
            kinematics: Kinematics::new(&sim),
            sim,
            over: None,
            high_score: 0,
            rounds: 1,
        }
    }

    pub fn is_over(&self) -> bool {
        self.over.is_some()
    }

    pub fn score(&self) -> u32 {
        self.stream.score()
    }

    pub fn bird(&self) -> &Bird {
        &self.bird
    }

    pub fn step(&mut self) {
        if self.over.is_some() {
            return;
        }
        self.kinematics.advance(&mut self.bird);
        self.stream.advance();
        let verdict = judge(&self.bird, &self.stream, self.sim.screen_height as f32);
        if let Verdict::Terminal(termination) = verdict {
            self.bird.alive = false;
            self.over = Some(termination);
            self.high_score = self.high_score.max(self.stream.score());
            info!("round {} over ({termination:?}): score {}", self.rounds, self.stream.score());
        }
    }

    pub fn flap(&mut self) {
        if self.over.is_some() {
            self.restart();
        } else {
            self.kinematics.apply_action(&mut self.bird);
        }
    }

    fn restart(&mut self) {
        self.rounds += 1;
        let seed = self.sim.seed.map(|s| s.wrapping_add(u64::from(self.rounds)));
        self.bird = Bird::spawn(&self.sim);
        self.stream = ObstacleStream::new(&self.sim, seed);
        self.over = None;
    }

    fn scene(&self) -> Scene {
        Scene {
            birds: vec![sprite(&self.bird, 255)],
            pipes: self.stream.pairs().copied().collect(),
            hud: vec![
                format!("SCORE: {}", self.stream.score()),
                format!("BEST: {}", self.high_score),
            ],
            banner: self.over.map(|_| "GAME OVER  SPACE TO RETRY".to_string()),
            chart: Vec::new(),
        }
    }
}

/// Evolution shown one generation at a time.
pub struct EvolveRun {
    evolution: Evolution,
    current: Option<Generation<FeedForwardGenome>>,
    generations: u32,
    last: Option<GenerationSummary>,
    history: Vec<u32>,
}

impl EvolveRun {
    pub fn new(mut evolution: Evolution, generations: u32) -> Result<Self, EvaluationError> {
        let current = if generations > 0 { Some(evolution.next_generation()?) } else { None };
        Ok(Self {
            evolution,
            current,
            generations,
            last: None,
            history: Vec::new(),
        })
    }

    pub fn evolution(&self) -> &Evolution {
        &self.evolution
    }

    pub fn last_summary(&self) -> Option<&GenerationSummary> {
        self.last.as_ref()
    }

    pub fn is_done(&self) -> bool {
        self.current.is_none()
    }

    pub fn step(&mut self) -> Result<(), EvaluationError> {
        let Some(generation) = self.current.as_mut() else {
            return Ok(());
        };
        generation.step()?;
        if !generation.is_finished() {
            return Ok(());
        }
        let score = generation.score();
        if let Some(done) = self.current.take() {
            self.last = Some(self.evolution.conclude(done.finish(), score));
            self.history.push(score);
        }
        if self.evolution.generation() < self.generations {
            self.current = Some(self.evolution.next_generation()?);
        }
        Ok(())
    }

    pub fn flap(&mut self) {
        if let Some(generation) = self.current.as_mut() {
            generation.manual_flap();
        }
    }

    fn scene(&self) -> Scene {
        let mut hud = vec![
            format!("GEN: {}/{}", self.evolution.generation(), self.generations),
            format!("HIGH SCORE: {}", self.evolution.high_score()),
        ];
        if let Some(last) = &self.last {
            hud.push(format!("LAST BEST: {:.1}", last.best_fitness));
        }
        match &self.current {
            Some(generation) => {
                hud.insert(0, format!("SCORE: {}", generation.score()));
                hud.push(format!("ALIVE: {}", generation.alive()));
                Scene {
                    birds: generation.birds().map(|b| sprite(b, 96)).collect(),
                    pipes: generation.stream().pairs().copied().collect(),
                    hud,
                    banner: None,
                    chart: self.history.clone(),
                }
            }
            None => Scene {
                hud,
                banner: Some("EVOLUTION FINISHED".to_string()),
                chart: self.history.clone(),
                ..Scene::default()
            },
        }
    }
}

/// The tabular learner running episode after episode.
pub struct LearnRun {
    learner: QLearner,
    episodes: Option<u32>,
    last: Option<EpisodeSummary>,
    history: Vec<u32>,
}

impl LearnRun {
    pub fn new(learner: QLearner, episodes: Option<u32>) -> Self {
        Self {
            learner,
            episodes,
            last: None,
            history: Vec::new(),
        }
    }

    pub fn learner(&self) -> &QLearner {
        &self.learner
    }

    pub fn is_done(&self) -> bool {
        self.episodes
            .is_some_and(|limit| self.learner.episode() >= u64::from(limit))
    }

    pub fn step(&mut self) {
        if self.is_done() {
            return;
        }
        if let Some(summary) = self.learner.step() {
            self.history.push(summary.score);
            self.last = Some(summary);
        }
    }

    fn scene(&self) -> Scene {
        let mut hud = vec![
            format!("SCORE: {}", self.learner.score()),
            format!("HIGH SCORE: {}", self.learner.high_score()),
            format!("EPISODE: {}", self.learner.episode() + 1),
        ];
        if let Some(last) = &self.last {
            hud.push(format!("LAST: {} IN {} STEPS", last.score, last.steps));
        }
        Scene {
            birds: vec![sprite(self.learner.bird(), 255)],
            pipes: self.learner.stream().pairs().copied().collect(),
            hud,
            banner: self.is_done().then(|| "TRAINING FINISHED".to_string()),
            chart: self.history.clone(),
        }
    }
}

pub enum Session {
    Play(PlayRound),
    Evolve(EvolveRun),
    Learn(LearnRun),
}

impl Session {
    pub fn step(&mut self) -> Result<(), EvaluationError> {
        match self {
            Session::Play(round) => round.step(),
            Session::Evolve(run) => run.step()?,
            Session::Learn(run) => run.step(),
        }
        Ok(())
    }

    pub fn flap(&mut self) {
        match self {
            Session::Play(round) => round.flap(),
            Session::Evolve(run) => run.flap(),
            Session::Learn(run) => run.learner.manual_flap(),
        }
    }

    /// Manual play never finishes on its own.
    pub fn is_done(&self) -> bool {
        match self {
            Session::Play(_) => false,
            Session::Evolve(run) => run.is_done(),
            Session::Learn(run) => run.is_done(),
        }
    }

    pub fn scene(&self) -> Scene {
        match self {
            Session::Play(round) => round.scene(),
            Session::Evolve(run) => run.scene(),
            Session::Learn(run) => run.scene(),
        }
    }

    pub fn table(&self) -> Option<&QTable> {
        match self {
            Session::Learn(run) => Some(run.learner.table()),
            _ => None,
        }
    }

    /// Writes the value table to `dir/q_table_<unix secs>.bin`. Sessions without a table return
    /// `Ok(None)`.
    pub fn save_table(&self, dir: &Path) -> Result<Option<PathBuf>, TableError> {
        let Some(table) = self.table() else {
            return Ok(None);
        };
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let path = dir.join(format!("q_table_{secs}.bin"));
        table.save(&path)?;
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::config::{NeatConfig, QLearnConfig};

    fn sim() -> SimConfig {
        SimConfig { seed: Some(99), ..SimConfig::default() }
    }

    #[test]
    fn pace_doubles_and_halves_within_bounds() {
        let mut pace = Pace::new();
        pace.slower();
        assert_eq!(pace.steps_per_frame(), 1);
        for _ in 0..20 {
            pace.faster();
        }
        assert_eq!(pace.steps_per_frame(), Pace::MAX_STEPS_PER_FRAME);
        pace.slower();
        assert_eq!(pace.steps_per_frame(), 5_000);
    }

    #[test]
    fn play_round_ends_on_the_floor_and_flap_restarts() {
        let mut session = Session::Play(PlayRound::new(sim()));
        // without flapping the bird falls out within a couple of seconds
        for _ in 0..120 {
            session.step().unwrap();
        }
        let Session::Play(round) = &session else { unreachable!() };
        assert!(round.is_over());
        assert!(session.scene().banner.is_some());

        session.flap();
        let Session::Play(round) = &session else { unreachable!() };
        assert!(!round.is_over());
        assert_eq!(round.bird().y, 300.0);
        assert_eq!(round.score(), 0);
    }

    #[test]
    fn evolve_run_stops_after_the_requested_generations() {
        let neat = NeatConfig {
            population: 6,
            elite: 2,
            max_frames: Some(300),
            ..NeatConfig::default()
        };
        let run = EvolveRun::new(Evolution::new(sim(), neat), 2).unwrap();
        let mut session = Session::Evolve(run);
        let mut guard = 0;
        while !session.is_done() {
            session.step().unwrap();
            guard += 1;
            assert!(guard < 10_000);
        }
        let Session::Evolve(run) = &session else { unreachable!() };
        assert_eq!(run.evolution().generation(), 2);
        assert_eq!(run.last_summary().map(|s| s.generation), Some(2));
    }

    #[test]
    fn learn_run_saves_a_timestamped_table() {
        let learner = QLearner::new(QTable::new(), sim(), QLearnConfig::default());
        let mut session = Session::Learn(LearnRun::new(learner, Some(1)));
        while !session.is_done() {
            session.step().unwrap();
        }

        let dir = tempdir().unwrap();
        let path = session.save_table(dir.path()).unwrap().unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("q_table_") && name.ends_with(".bin"), "{name}");

        let Session::Learn(run) = &session else { unreachable!() };
        assert_eq!(&QTable::load(&path).unwrap(), run.learner().table());
    }

    #[test]
    fn only_learning_sessions_have_a_table() {
        let dir = tempdir().unwrap();
        let session = Session::Play(PlayRound::new(sim()));
        assert_eq!(session.save_table(dir.path()).unwrap(), None);
    }

    #[test]
    fn evolve_scene_draws_every_alive_bird() {
        let neat = NeatConfig { population: 5, elite: 1, ..NeatConfig::default() };
        let session = Session::Evolve(EvolveRun::new(Evolution::new(sim(), neat), 1).unwrap());
        let scene = session.scene();
        assert_eq!(scene.birds.len(), 5);
        assert!(scene.birds.iter().all(|b| b.alpha < 255));
    }
}
