// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{Checkpoint, CheckpointStore};
use crate::graph::error::GraphError;

/// In-process checkpoint store
#[derive(Clone, Default)]
pub struct MemoryCheckpointStore {
    runs: Arc<RwLock<HashMap<String, Vec<Checkpoint>>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), GraphError> {
        let mut runs = self.runs.write().await;
        let history = runs.entry(checkpoint.run_id.clone()).or_default();
        if history.iter().any(|cp| cp.step == checkpoint.step) {
            return Err(GraphError::checkpoint(format!(
                "checkpoint {} of run '{}' already exists",
                checkpoint.step, checkpoint.run_id
            )));
        }
        history.push(checkpoint.clone());
        history.sort_by_key(|cp| cp.step);
        Ok(())
    }

    async fn load(&self, run_id: &str) -> Result<Option<Checkpoint>, GraphError> {
        let runs = self.runs.read().await;
        Ok(runs.get(run_id).and_then(|history| history.last().cloned()))
    }

    async fn list(&self, run_id: &str) -> Result<Vec<Checkpoint>, GraphError> {
        let runs = self.runs.read().await;
        Ok(runs.get(run_id).cloned().unwrap_or_default())
    }
}
