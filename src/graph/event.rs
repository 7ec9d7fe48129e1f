// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

/// Progress events emitted while a run executes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        run_id: String,
        graph: String,
        resumed_from: Option<usize>,
    },
    StepStarted {
        step: usize,
        frontier: Vec<String>,
    },
    NodeRetrying {
        step: usize,
        node: String,
        attempt: u32,
        error: String,
    },
    NodeCompleted {
        step: usize,
        node: String,
        attempts: u32,
    },
    StepCompleted {
        step: usize,
        next: Vec<String>,
    },
    CheckpointSaved {
        step: usize,
    },
    RunFinished {
        status: String,
        steps: usize,
    },
    RunFailed {
        step: usize,
        node: Option<String>,
        error: String,
    },
}
