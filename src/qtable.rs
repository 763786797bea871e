//! Dense action-value table over the bucketed state space, with file persistence.

use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::TableError;
use crate::observe::{TableState, X_BUCKETS, Y_BUCKETS};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    NoFlap = 0,
    Flap = 1,
}

impl Action {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// `values[x][y][action]`. Every entry starts at zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QTable {
    values: [[[f32; 2]; Y_BUCKETS]; X_BUCKETS],
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, state: TableState, action: Action) -> f32 {
        self.values[state.x()][state.y()][action.index()]
    }

    pub fn set(&mut self, state: TableState, action: Action, value: f32) {
        self.values[state.x()][state.y()][action.index()] = value;
    }

    pub fn best_value(&self, state: TableState) -> f32 {
        let [a, b] = self.values[state.x()][state.y()];
        a.max(b)
    }

    /// Flaps only when flapping is strictly better; ties keep gliding.
    pub fn greedy(&self, state: TableState) -> Action {
        if self.get(state, Action::Flap) > self.get(state, Action::NoFlap) {
            Action::Flap
        } else {
            Action::NoFlap
        }
    }

    /// `Q(s, a) <- (1 - lr) * Q(s, a) + lr * (reward + max Q(s', .))`. No discount is applied.
    pub fn update(
        &mut self,
        prev: TableState,
        action: Action,
        reward: f32,
        next: TableState,
        lr: f32,
    ) {
        let target = reward + self.best_value(next);
        let old = self.get(prev, action);
        self.set(prev, action, (1.0 - lr) * old + lr * target);
    }

    pub fn check_finite(&self) -> Result<(), TableError> {
        for (x, column) in self.values.iter().enumerate() {
            for (y, cell) in column.iter().enumerate() {
                if let Some(action) = cell.iter().position(|v| !v.is_finite()) {
                    return Err(TableError::NonFinite { x, y, action });
                }
            }
        }
        Ok(())
    }

    /// Writes bincode, or pretty JSON when the path ends in `.json`.
    pub fn save(&self, path: &Path) -> Result<(), TableError> {
        let bytes = if is_json(path) {
            serde_json::to_vec_pretty(self)?
        } else {
            bincode::serde::encode_to_vec(self, bincode::config::standard())?
        };
        fs::write(path, bytes).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("saved value table to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, TableError> {
        let bytes = fs::read(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table: QTable = if is_json(path) {
            serde_json::from_slice(&bytes)?
        } else {
            let (table, _) =
                bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
            table
        };
        table.check_finite()?;
        Ok(table)
    }

    /// Loads `path`, falling back to an all-zero table with a warning when the file is missing
    /// or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(table) => {
                info!("loaded value table from {}", path.display());
                table
            }
            Err(e) => {
                warn!("starting from an empty value table: {e}");
                Self::default()
            }
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
