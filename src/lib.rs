//! Flappy-bird world used as a test harness for two learners: a neuro-evolution population
//! and a tabular Q-learning agent.

pub mod bird;
pub mod config;
pub mod draw;
pub mod error;
pub mod evolution;
pub mod judge;
pub mod logging;
pub mod observe;
pub mod pipes;
pub mod policy;
pub mod population;
pub mod qlearn;
pub mod qtable;
pub mod session;
