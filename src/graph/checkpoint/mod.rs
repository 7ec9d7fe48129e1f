// SPDX-License-Identifier: MIT

//! Checkpoint persistence
//!
//! A checkpoint at step `k` holds the state after `k` completed steps and the
//! frontier scheduled for step `k + 1`. Step 0 is the initial state together
//! with the entry frontier. Checkpoints are immutable once written.

mod file;
mod memory;

pub use file::FileCheckpointStore;
pub use memory::MemoryCheckpointStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::GraphError;
use super::state::State;

/// Snapshot of a run between two steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: String,
    pub step: usize,
    pub state: State,
    pub frontier: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(run_id: impl Into<String>, step: usize, state: State, frontier: Vec<String>) -> Self {
        Self {
            run_id: run_id.into(),
            step,
            state,
            frontier,
            created_at: Utc::now(),
        }
    }

    /// A checkpoint with an empty frontier belongs to a finished run
    pub fn is_terminal(&self) -> bool {
        self.frontier.is_empty()
    }
}

/// Storage backend for checkpoints
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist a checkpoint; writing an existing (run, step) pair fails
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), GraphError>;

    /// Latest checkpoint of a run
    async fn load(&self, run_id: &str) -> Result<Option<Checkpoint>, GraphError>;

    /// All checkpoints of a run, ascending by step
    async fn list(&self, run_id: &str) -> Result<Vec<Checkpoint>, GraphError>;
}
