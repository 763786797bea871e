//! Single-agent temporal-difference learner over the bucketed state space.

use log::{debug, info};

use crate::bird::{Bird, Kinematics};
use crate::config::{QLearnConfig, SimConfig};
use crate::judge::{Termination, Verdict, judge};
use crate::observe::{TableState, table_state};
use crate::pipes::ObstacleStream;
use crate::qtable::{Action, QTable};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EpisodeSummary {
    pub episode: u64,
    pub score: u32,
    pub steps: u64,
    pub high_score: u32,
    /// `None` when the episode was cut by the step cap.
    pub termination: Option<Termination>,
}

pub struct QLearner {
    table: QTable,
    bird: Bird,
    stream: ObstacleStream,
    kinematics: Kinematics,
    sim: SimConfig,
    cfg: QLearnConfig,
    episode: u64,
    steps: u64,
    high_score: u32,
    pending_flap: bool,
}

impl QLearner {
    pub fn new(table: QTable, sim: SimConfig, cfg: QLearnConfig) -> Self {
        let stream = ObstacleStream::new(&sim, episode_seed(&sim, 0));
        Self {
            table,
            bird: Bird::spawn(&sim),
            stream,
            kinematics: Kinematics::new(&sim),
            sim,
            cfg,
            episode: 0,
            steps: 0,
            high_score: 0,
            pending_flap: false,
        }
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }

    pub fn into_table(self) -> QTable {
        self.table
    }

    pub fn bird(&self) -> &Bird {
        &self.bird
    }

    pub fn stream(&self) -> &ObstacleStream {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut ObstacleStream {
        &mut self.stream
    }

    /// Episodes finished so far.
    pub fn episode(&self) -> u64 {
        self.episode
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn high_score(&self) -> u32 {
        self.high_score
    }

    pub fn score(&self) -> u32 {
        self.stream.score()
    }

    /// Forces a flap on the next step regardless of the greedy choice.
    pub fn manual_flap(&mut self) {
        self.pending_flap = true;
    }

    fn encode(&self) -> TableState {
        table_state(
            &self.bird,
            &self.stream,
            self.sim.screen_width as f32,
            self.sim.screen_height as f32,
        )
    }

    /// Advances one frame and learns from it. Returns a summary when the episode ended; the next
    /// episode has already started with the same table by then.
    pub fn step(&mut self) -> Option<EpisodeSummary> {
        let prev = self.encode();
        let mut action = self.table.greedy(prev);
        if std::mem::take(&mut self.pending_flap) {
            action = Action::Flap;
        }

        if action == Action::Flap {
            self.kinematics.apply_action(&mut self.bird);
        }
        self.stream.advance();
        self.kinematics.advance(&mut self.bird);
        let verdict = judge(&self.bird, &self.stream, self.sim.screen_height as f32);
        self.steps += 1;

        let next = self.encode();
        let lr = self.cfg.learning_rate;
        if verdict.is_terminal() {
            self.table.update(prev, action, self.cfg.terminal_reward, next, lr);
        }
        self.table.update(prev, action, self.cfg.step_reward, next, lr);

        match verdict {
            Verdict::Terminal(termination) => Some(self.end_episode(Some(termination))),
            Verdict::Alive => match self.cfg.max_steps_per_episode {
                Some(cap) if self.steps >= cap => Some(self.end_episode(None)),
                _ => None,
            },
        }
    }

    fn end_episode(&mut self, termination: Option<Termination>) -> EpisodeSummary {
        self.episode += 1;
        let score = self.stream.score();
        if score > self.high_score {
            self.high_score = score;
        }
        let summary = EpisodeSummary {
            episode: self.episode,
            score,
            steps: self.steps,
            high_score: self.high_score,
            termination,
        };
        info!(
            "episode {} over after {} steps: score {}, high score {}",
            summary.episode, summary.steps, score, self.high_score
        );
        if termination.is_none() {
            debug!("episode {} hit the step cap", summary.episode);
        }

        self.bird = Bird::spawn(&self.sim);
        self.stream = ObstacleStream::new(&self.sim, episode_seed(&self.sim, self.episode));
        self.steps = 0;
        summary
    }

    /// Runs `episodes` whole episodes headless and returns their summaries.
    pub fn run_episodes(&mut self, episodes: u32) -> Vec<EpisodeSummary> {
        let mut summaries = Vec::with_capacity(episodes as usize);
        while summaries.len() < episodes as usize {
            if let Some(summary) = self.step() {
                summaries.push(summary);
            }
        }
        summaries
    }
}

/// Each episode gets its own course; seeded runs stay reproducible.
fn episode_seed(sim: &SimConfig, episode: u64) -> Option<u64> {
    sim.seed.map(|seed| seed.wrapping_add(episode))
}
