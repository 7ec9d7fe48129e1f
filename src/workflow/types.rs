// SPDX-License-Identifier: MIT

//! Workflow definition types
//!
//! These mirror the YAML document layout one to one; `normalizer` and
//! `builder` turn them into a compiled graph.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::graph::config::RunConfig;
use crate::graph::node::ExecutionMode;
use crate::graph::retry::RetryPolicy;
use crate::graph::state::StateSchema;

/// A workflow document
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Per-field types, reducers and defaults
    #[serde(default)]
    pub state: StateSchema,
    /// Run settings; CLI flags and requests override these
    #[serde(default)]
    pub config: RunConfig,
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    /// Shorthand for `START -> a -> b -> ... -> END`
    #[serde(default)]
    pub sequence: Vec<String>,
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
}

/// A node in the workflow graph
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeDefinition {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
    /// Per-attempt deadline in milliseconds
    pub timeout_ms: Option<u64>,
    /// Overrides the run's retry policy
    pub retry: Option<RetryPolicy>,
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default = "default_idempotent")]
    pub idempotent: bool,
}

fn default_idempotent() -> bool {
    true
}

/// Built-in node kinds
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeKind {
    /// Returns a fixed partial update, optionally with a control signal
    Update {
        #[serde(default)]
        update: Map<String, Value>,
        goto: Option<String>,
        #[serde(default)]
        end: bool,
    },
    /// Runs a local process with the state on stdin
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        /// State field receiving non-JSON stdout (default `<id>_output`)
        output: Option<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
    /// POSTs the state to a webhook
    Http {
        url: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Update { .. } => "update",
            NodeKind::Command { .. } => "command",
            NodeKind::Http { .. } => "http",
        }
    }
}

/// An edge: either `to` (unconditional) or `routes` (conditional)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EdgeDefinition {
    pub from: String,
    pub to: Option<String>,
    #[serde(default)]
    pub routes: Vec<RouteDefinition>,
}

/// One branch of a conditional edge; a branch without `when` always matches
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteDefinition {
    pub when: Option<String>,
    pub to: String,
}
