// SPDX-License-Identifier: MIT

//! Typed error handling for the graph engine
//!
//! `GraphError` covers every failure the engine can raise. A failed run is
//! reported as a `WorkflowFailed`, which wraps the triggering `GraphError`
//! with the diagnostics needed to inspect or resume the run.

use std::time::Duration;
use thiserror::Error;

use super::checkpoint::Checkpoint;

/// Errors raised while building or running a workflow graph
#[derive(Debug, Error)]
pub enum GraphError {
    /// The graph topology or schema is invalid (raised before any node runs)
    #[error("Graph validation failed: {0}")]
    GraphValidation(String),

    /// A node's underlying action failed
    #[error("Node '{node}' failed: {message}")]
    NodeExecution { node: String, message: String },

    /// A node exceeded its configured deadline
    #[error("Node '{node}' timed out after {timeout:?}")]
    NodeTimeout { node: String, timeout: Duration },

    /// A routing decision named a target outside the edge's allow-list
    #[error("Invalid route from '{from}' to '{target}' (allowed: {allowed:?})")]
    InvalidRoute {
        from: String,
        target: String,
        allowed: Vec<String>,
    },

    /// The run did not terminate within the configured step bound
    #[error("Step limit of {limit} exceeded")]
    StepLimitExceeded { limit: usize },

    /// An update does not match the declared shape of a state field
    #[error("Reducer mismatch on field '{field}': expected {expected}, got {found}")]
    ReducerMismatch {
        field: String,
        expected: String,
        found: String,
    },

    /// Checkpoint persistence failed
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// A condition expression could not be parsed
    #[error("Condition error: {0}")]
    Condition(String),

    /// Invalid configuration or workflow definition
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl GraphError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::GraphValidation(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn checkpoint(message: impl Into<String>) -> Self {
        Self::Checkpoint(message.into())
    }

    pub fn node_execution(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NodeExecution {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Transient node failures are retried; everything else is fatal
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NodeExecution { .. } | Self::NodeTimeout { .. })
    }

    /// Stable name of the error kind, used in diagnostics and event payloads
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GraphValidation(_) => "graph_validation",
            Self::NodeExecution { .. } => "node_execution",
            Self::NodeTimeout { .. } => "node_timeout",
            Self::InvalidRoute { .. } => "invalid_route",
            Self::StepLimitExceeded { .. } => "step_limit_exceeded",
            Self::ReducerMismatch { .. } => "reducer_mismatch",
            Self::Checkpoint(_) => "checkpoint",
            Self::Condition(_) => "condition",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Yaml(_) => "yaml",
        }
    }
}

/// Terminal failure of a workflow run
#[derive(Debug, Error)]
#[error("Workflow '{run_id}' failed at step {step}: {error}")]
pub struct WorkflowFailed {
    /// Run that failed
    pub run_id: String,
    /// Step during which the failure happened (0 = before the first step)
    pub step: usize,
    /// Failing node, when the error is node-scoped
    pub node: Option<String>,
    /// Attempts made for the failing node (0 when not node-scoped)
    pub attempts: u32,
    /// The triggering error
    #[source]
    pub error: GraphError,
    /// Last checkpoint written before the failure, if persistence was enabled
    pub last_checkpoint: Option<Checkpoint>,
}

impl WorkflowFailed {
    /// Diagnostic payload for logs and HTTP responses
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "status": "failed",
            "run_id": self.run_id,
            "kind": self.error.kind(),
            "error": self.error.to_string(),
            "node": self.node,
            "step": self.step,
            "attempts": self.attempts,
            "last_checkpoint_step": self.last_checkpoint.as_ref().map(|cp| cp.step),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(GraphError::node_execution("a", "boom").is_retryable());
        assert!(GraphError::NodeTimeout {
            node: "a".to_string(),
            timeout: Duration::from_millis(5),
        }
        .is_retryable());
        assert!(!GraphError::StepLimitExceeded { limit: 3 }.is_retryable());
        assert!(!GraphError::InvalidRoute {
            from: "a".to_string(),
            target: "z".to_string(),
            allowed: vec!["b".to_string()],
        }
        .is_retryable());
    }

    #[test]
    fn test_failure_json_carries_diagnostics() {
        let failure = WorkflowFailed {
            run_id: "run-1".to_string(),
            step: 2,
            node: Some("x".to_string()),
            attempts: 2,
            error: GraphError::node_execution("x", "boom"),
            last_checkpoint: None,
        };

        let json = failure.to_json();
        assert_eq!(json["kind"], "node_execution");
        assert_eq!(json["node"], "x");
        assert_eq!(json["attempts"], 2);
        assert_eq!(json["step"], 2);
        assert!(failure.to_string().contains("run-1"));
    }
}
