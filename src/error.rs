use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::policy::GenomeId;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failure inside a policy's forward evaluation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PolicyError {
    #[error("observation has {actual} features, policy expects {expected}")]
    InputWidth { expected: usize, actual: usize },
    #[error("policy produced a non-finite action signal")]
    NonFinite,
    #[error("malformed genome: {0}")]
    MalformedGenome(String),
}

/// Fatal errors raised while evaluating a generation. The core never tries to recover a broken
/// genome mid-generation.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("policy for genome {genome} failed: {source}")]
    Policy {
        genome: GenomeId,
        #[source]
        source: PolicyError,
    },
    #[error("genome {0} was entered twice into one generation")]
    DuplicateGenome(GenomeId),
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("table file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode table: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("failed to decode table: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("table json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("table entry [{x}][{y}][{action}] is not finite")]
    NonFinite { x: usize, y: usize, action: usize },
}
