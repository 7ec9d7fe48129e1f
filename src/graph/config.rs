// SPDX-License-Identifier: MIT

//! Run configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::GraphError;
use super::retry::RetryPolicy;

/// Settings for a single workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Maximum number of steps before the run fails with `StepLimitExceeded`
    pub max_steps: usize,
    /// Maximum number of node invocations in flight within a step
    pub concurrency_limit: usize,
    /// Write a checkpoint after every step
    pub checkpoint_enabled: bool,
    /// Default retry policy for nodes without their own
    #[serde(rename = "retry")]
    pub retry_policy: RetryPolicy,
    /// Default per-attempt node deadline in milliseconds
    pub node_timeout_ms: Option<u64>,
    /// Run identifier; generated when absent
    pub run_id: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_steps: 25,
            concurrency_limit: 8,
            checkpoint_enabled: false,
            retry_policy: RetryPolicy::default(),
            node_timeout_ms: None,
            run_id: None,
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn with_checkpoints(mut self, enabled: bool) -> Self {
        self.checkpoint_enabled = enabled;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn node_timeout(&self) -> Option<Duration> {
        self.node_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), GraphError> {
        if self.max_steps == 0 {
            return Err(GraphError::config("max_steps must be at least 1"));
        }
        if self.concurrency_limit == 0 {
            return Err(GraphError::config("concurrency_limit must be at least 1"));
        }
        if self.node_timeout_ms == Some(0) {
            return Err(GraphError::config("node_timeout_ms must be positive"));
        }
        Ok(())
    }
}
