// SPDX-License-Identifier: MIT

//! Filesystem checkpoint store: one JSON document per checkpoint under
//! `<root>/<run_id>/<step>.json`, published atomically

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{Checkpoint, CheckpointStore};
use crate::graph::error::GraphError;

pub struct FileCheckpointStore {
    root: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run_dir(&self, run_id: &str) -> Result<PathBuf, GraphError> {
        let valid = !run_id.is_empty()
            && run_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && run_id != "."
            && run_id != "..";
        if !valid {
            return Err(GraphError::checkpoint(format!("invalid run id '{}'", run_id)));
        }
        Ok(self.root.join(run_id))
    }

    /// Steps stored for a run, ascending
    async fn steps(&self, run_id: &str) -> Result<Vec<usize>, GraphError> {
        let dir = self.run_dir(run_id)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut steps = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(step) = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| s.parse::<usize>().ok())
                {
                    steps.push(step);
                }
            }
        }
        steps.sort_unstable();
        Ok(steps)
    }

    /// Read one checkpoint. A file that does not parse is moved aside to
    /// `<name>.corrupt` so its step can be written again, and `None` is
    /// returned.
    async fn read_valid(&self, run_id: &str, step: usize) -> Result<Option<Checkpoint>, GraphError> {
        let path = self.run_dir(run_id)?.join(file_name(step));
        let content = fs::read(&path).await?;
        let problem = match serde_json::from_slice::<Checkpoint>(&content) {
            Ok(checkpoint) if checkpoint.step == step && checkpoint.run_id == run_id => {
                return Ok(Some(checkpoint))
            }
            Ok(_) => "belongs to another run or step".to_string(),
            Err(e) => e.to_string(),
        };

        log::warn!("Moving aside unreadable checkpoint {}: {}", path.display(), problem);
        let mut aside = path.clone().into_os_string();
        aside.push(".corrupt");
        fs::rename(&path, PathBuf::from(aside)).await?;
        Ok(None)
    }
}

fn file_name(step: usize) -> String {
    format!("{:08}.json", step)
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    /// Write to a temp file in the run directory, sync it, then hard-link it
    /// into place. A crash mid-write leaves only a `.tmp` file, which
    /// `load` and `list` never read.
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), GraphError> {
        let dir = self.run_dir(&checkpoint.run_id)?;
        fs::create_dir_all(&dir).await?;

        let path = dir.join(file_name(checkpoint.step));
        let temp = dir.join(format!(
            "{}.{}.tmp",
            file_name(checkpoint.step),
            uuid::Uuid::new_v4()
        ));
        let body = serde_json::to_vec_pretty(checkpoint)?;

        let mut file = fs::File::create(&temp).await?;
        let written = async {
            file.write_all(&body).await?;
            file.sync_all().await
        }
        .await;
        drop(file);
        let linked = match written {
            Ok(()) => fs::hard_link(&temp, &path).await,
            Err(e) => Err(e),
        };
        let _ = fs::remove_file(&temp).await;

        match linked {
            Ok(()) => {
                log::debug!("Wrote checkpoint {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(GraphError::checkpoint(format!(
                "checkpoint {} of run '{}' already exists",
                checkpoint.step, checkpoint.run_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Latest readable checkpoint
    async fn load(&self, run_id: &str) -> Result<Option<Checkpoint>, GraphError> {
        for step in self.steps(run_id).await?.into_iter().rev() {
            if let Some(checkpoint) = self.read_valid(run_id, step).await? {
                return Ok(Some(checkpoint));
            }
        }
        Ok(None)
    }

    async fn list(&self, run_id: &str) -> Result<Vec<Checkpoint>, GraphError> {
        let mut checkpoints = Vec::new();
        for step in self.steps(run_id).await? {
            if let Some(checkpoint) = self.read_valid(run_id, step).await? {
                checkpoints.push(checkpoint);
            }
        }
        Ok(checkpoints)
    }
}
