mod cli;
mod input;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{error, info, warn};
use pixels::{Pixels, SurfaceTexture};
use winit::dpi::LogicalSize;
use winit::event::Event;
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;
use winit_input_helper::WinitInputHelper;

use flappy_learning::config::{Config, QLearnConfig};
use flappy_learning::draw::render_frame;
use flappy_learning::evolution::Evolution;
use flappy_learning::logging::init_logging;
use flappy_learning::qlearn::QLearner;
use flappy_learning::qtable::QTable;
use flappy_learning::session::{Command, EvolveRun, LearnRun, Pace, PlayRound, Session};

use crate::cli::{Cli, Mode};
use crate::input::poll_input;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.into());

    let mut cfg = match &cli.config {
        Some(path) => Config::from_json_file(path).context("loading configuration")?,
        None => Config::default(),
    };
    cli.apply(&mut cfg);
    cfg.validate().context("checking configuration")?;

    if cli.headless {
        run_headless(&cli.command, &cfg)
    } else {
        let session = build_session(&cli.command, &cfg)?;
        run_window(session, &cli.command, &cfg)
    }
}

fn initial_table(load: Option<&Path>) -> QTable {
    match load {
        Some(path) => QTable::load_or_default(path),
        None => QTable::new(),
    }
}

fn build_session(mode: &Mode, cfg: &Config) -> Result<Session> {
    Ok(match mode {
        Mode::Play => Session::Play(PlayRound::new(cfg.sim.clone())),
        Mode::Neat { .. } => {
            let evolution = Evolution::new(cfg.sim.clone(), cfg.neat.clone());
            let run = EvolveRun::new(evolution, cfg.neat.generations)
                .context("starting evolution")?;
            Session::Evolve(run)
        }
        Mode::Qlearn { load, .. } => {
            let table = initial_table(load.as_deref());
            let learner = QLearner::new(table, cfg.sim.clone(), cfg.qlearn.clone());
            Session::Learn(LearnRun::new(learner, cfg.qlearn.episodes))
        }
    })
}

fn run_headless(mode: &Mode, cfg: &Config) -> Result<()> {
    match mode {
        Mode::Play => bail!("manual play needs a window; drop --headless"),
        Mode::Neat { .. } => {
            let mut evolution = Evolution::new(cfg.sim.clone(), cfg.neat.clone());
            let started = Instant::now();
            let last = evolution.run(cfg.neat.generations).context("evaluating generation")?;
            let best_fitness = if last.is_some() { evolution.best_fitness() } else { 0.0 };
            info!(
                "evolution finished after {} generations in {:.1?}: \
                 high score {}, best fitness {best_fitness:.1}",
                evolution.generation(),
                started.elapsed(),
                evolution.high_score(),
            );
        }
        Mode::Qlearn { load, save, .. } => {
            let Some(episodes) = cfg.qlearn.episodes else {
                bail!("headless training needs --episodes");
            };
            if cfg.qlearn.max_steps_per_episode.is_none() {
                warn!(
                    "no max_steps_per_episode set; capping episodes at {} steps",
                    QLearnConfig::UNATTENDED_STEP_CAP
                );
            }
            let table = initial_table(load.as_deref());
            let mut learner = QLearner::new(table, cfg.sim.clone(), cfg.qlearn.with_step_cap());
            let summaries = learner.run_episodes(episodes);
            let total: f64 = summaries.iter().map(|s| f64::from(s.score)).sum();
            let mean = total / summaries.len().max(1) as f64;
            info!(
                "trained {} episodes: high score {}, mean score {mean:.2}",
                summaries.len(),
                learner.high_score()
            );
            if let Some(path) = save {
                learner.table().save(path).context("saving value table")?;
            }
        }
    }
    Ok(())
}

/// Writes the table named by `--save` on the way out, if there is one.
fn save_on_exit(session: &Session, save: Option<&PathBuf>) {
    if let (Some(path), Some(table)) = (save, session.table()) {
        if let Err(e) = table.save(path) {
            error!("could not save value table: {e}");
        }
    }
}

fn run_window(mut session: Session, mode: &Mode, cfg: &Config) -> Result<()> {
    let (width, height) = (cfg.sim.screen_width, cfg.sim.screen_height);
    let (save, out_dir) = match mode {
        Mode::Qlearn { save, out_dir, .. } => (save.clone(), out_dir.clone()),
        _ => (None, PathBuf::from(".")),
    };
    let title = match mode {
        Mode::Play => "Flappy Bird",
        Mode::Neat { .. } => "Flappy Bird - neuro-evolution",
        Mode::Qlearn { .. } => "Flappy Bird - Q-learning",
    };

    let event_loop = EventLoop::new();
    let mut input = WinitInputHelper::new();
    let window = WindowBuilder::new()
        .with_title(title)
        .with_inner_size(LogicalSize::new(width, height))
        .with_resizable(false)
        .build(&event_loop)
        .context("creating window")?;

    let mut pixels = {
        let window_size = window.inner_size();
        let surface_texture = SurfaceTexture::new(window_size.width, window_size.height, &window);
        Pixels::new(width, height, surface_texture).context("creating framebuffer")?
    };

    let tick = Duration::from_secs_f64(1.0 / f64::from(cfg.sim.frame_rate));
    let mut last_update = Instant::now();
    let mut pace = Pace::new();
    let mut announced_done = false;

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        if let Event::RedrawRequested(_) = event {
            render_frame(pixels.frame_mut(), width, height, &session.scene());
            if let Err(e) = pixels.render() {
                error!("render failed: {e}");
                *control_flow = ControlFlow::Exit;
                return;
            }
        }

        if input.update(&event) {
            for command in poll_input(&input) {
                match command {
                    Command::Quit => {
                        save_on_exit(&session, save.as_ref());
                        *control_flow = ControlFlow::Exit;
                        return;
                    }
                    Command::Flap => session.flap(),
                    Command::Save => match session.save_table(&out_dir) {
                        Ok(Some(path)) => info!("value table written to {}", path.display()),
                        Ok(None) => warn!("this mode has no value table to save"),
                        Err(e) => error!("could not save value table: {e}"),
                    },
                    Command::Faster => pace.faster(),
                    Command::Slower => pace.slower(),
                }
            }

            if last_update.elapsed() >= tick {
                last_update = Instant::now();
                for _ in 0..pace.steps_per_frame() {
                    if let Err(e) = session.step() {
                        error!("{e}");
                        *control_flow = ControlFlow::Exit;
                        return;
                    }
                    if session.is_done() {
                        break;
                    }
                }
                if session.is_done() && !announced_done {
                    announced_done = true;
                    info!("run finished; press escape to close");
                    save_on_exit(&session, save.as_ref());
                }
            }

            window.request_redraw();
        }
    });
}
