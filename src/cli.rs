use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;

use flappy_learning::config::Config;

#[derive(Parser, Debug)]
#[command(name = "flappy-learning")]
#[command(about = "Flappy-bird world for neuro-evolution and tabular Q-learning")]
pub struct Cli {
    /// JSON file with `sim`, `neat` and `qlearn` sections; missing fields keep their defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Seed for obstacle gaps and genome initialisation
    #[arg(long, global = true)]
    pub seed: Option<u64>,
    /// Run without a window, as fast as possible
    #[arg(long, global = true, default_value_t = false)]
    pub headless: bool,
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
    #[command(subcommand)]
    pub command: Mode,
}

#[derive(Subcommand, Debug)]
pub enum Mode {
    /// Play by hand: space flaps
    Play,
    /// Evolve a population of feed-forward policies
    Neat {
        #[arg(long)]
        generations: Option<u32>,
        #[arg(long)]
        population: Option<usize>,
    },
    /// Train the tabular agent
    Qlearn {
        /// Table to resume from (.bin or .json)
        #[arg(long)]
        load: Option<PathBuf>,
        /// Where to write the table when the run ends
        #[arg(long)]
        save: Option<PathBuf>,
        /// Stop after this many episodes; unbounded in a window
        #[arg(long)]
        episodes: Option<u32>,
        /// Directory for tables written with the save key
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl Cli {
    /// Folds the command-line overrides into a loaded config.
    pub fn apply(&self, cfg: &mut Config) {
        if let Some(seed) = self.seed {
            cfg.sim.seed = Some(seed);
        }
        match &self.command {
            Mode::Play => {}
            Mode::Neat { generations, population } => {
                if let Some(g) = generations {
                    cfg.neat.generations = *g;
                }
                if let Some(p) = population {
                    cfg.neat.population = *p;
                    cfg.neat.elite = cfg.neat.elite.min(*p);
                }
            }
            Mode::Qlearn { episodes, .. } => {
                if episodes.is_some() {
                    cfg.qlearn.episodes = *episodes;
                }
            }
        }
    }
}
