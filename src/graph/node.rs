// SPDX-License-Identifier: MIT

//! Node invocation contract and registry
//!
//! A node receives a read-only snapshot of the full state and returns either
//! a partial update, a control signal, or both. Nodes never write to the
//! state directly; the executor merges what they return.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::error::GraphError;
use super::retry::RetryPolicy;
use super::state::{State, Update};
use super::{END, START};

/// Result type returned by node logic providers
pub type NodeResult = Result<NodeOutput, Box<dyn Error + Send + Sync>>;

/// Control signals a node can emit instead of (or alongside) an update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlSignal {
    /// Terminate the workflow once the current step has been merged
    End,
    /// Replace this node's outgoing edges with an explicit next node
    Goto(String),
}

/// What a node returns from an invocation
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutput {
    Update(Update),
    Signal(ControlSignal),
    /// Update and signal together
    Command(Update, ControlSignal),
}

impl NodeOutput {
    /// Split into the update to merge and the optional signal
    pub fn into_parts(self) -> (Update, Option<ControlSignal>) {
        match self {
            NodeOutput::Update(update) => (update, None),
            NodeOutput::Signal(signal) => (Update::new(), Some(signal)),
            NodeOutput::Command(update, signal) => (update, Some(signal)),
        }
    }
}

impl From<Update> for NodeOutput {
    fn from(update: Update) -> Self {
        NodeOutput::Update(update)
    }
}

/// Core node trait implemented by every unit of work in a graph
#[async_trait]
pub trait Node: Send + Sync {
    /// Run the node against a state snapshot
    async fn invoke(&self, state: &State) -> NodeResult;
}

/// Adapter turning an async closure into a `Node`
pub struct FnNode<F> {
    f: F,
}

/// Wrap an async closure `Fn(State) -> Future<Output = NodeResult>` as a node
pub fn node_fn<F, Fut>(f: F) -> FnNode<F>
where
    F: Fn(State) -> Fut + Send + Sync,
    Fut: Future<Output = NodeResult> + Send,
{
    FnNode { f }
}

#[async_trait]
impl<F, Fut> Node for FnNode<F>
where
    F: Fn(State) -> Fut + Send + Sync,
    Fut: Future<Output = NodeResult> + Send,
{
    async fn invoke(&self, state: &State) -> NodeResult {
        (self.f)(state.clone()).await
    }
}

/// How a node may be scheduled relative to its siblings in a step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Runs concurrently with the other concurrent nodes of the step
    #[default]
    Concurrent,
    /// Runs alone, after the concurrent batch, in declaration order
    Sequential,
}

/// A registered node together with its invocation settings
#[derive(Clone)]
pub struct NodeSpec {
    pub id: String,
    pub node: Arc<dyn Node>,
    /// Per-attempt deadline; falls back to the run's node timeout
    pub timeout: Option<Duration>,
    /// Retry policy; falls back to the run's retry policy
    pub retry: Option<RetryPolicy>,
    pub mode: ExecutionMode,
    /// Whether re-invoking the node (e.g. on resume) is safe
    pub idempotent: bool,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, node: impl Node + 'static) -> Self {
        Self::from_arc(id, Arc::new(node))
    }

    pub fn from_arc(id: impl Into<String>, node: Arc<dyn Node>) -> Self {
        Self {
            id: id.into(),
            node,
            timeout: None,
            retry: None,
            mode: ExecutionMode::Concurrent,
            idempotent: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn non_idempotent(mut self) -> Self {
        self.idempotent = false;
        self
    }
}

impl std::fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeSpec")
            .field("id", &self.id)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("mode", &self.mode)
            .field("idempotent", &self.idempotent)
            .finish()
    }
}

/// Node id → node, in declaration order
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    nodes: Vec<NodeSpec>,
    index: HashMap<String, usize>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node; ids must be unique, non-empty and not reserved
    pub fn register(&mut self, spec: NodeSpec) -> Result<(), GraphError> {
        if spec.id.trim().is_empty() {
            return Err(GraphError::validation("node id must not be empty"));
        }
        if spec.id == START || spec.id == END {
            return Err(GraphError::validation(format!(
                "node id '{}' is reserved",
                spec.id
            )));
        }
        if self.index.contains_key(&spec.id) {
            return Err(GraphError::validation(format!(
                "duplicate node id '{}'",
                spec.id
            )));
        }
        self.index.insert(spec.id.clone(), self.nodes.len());
        self.nodes.push(spec);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&NodeSpec> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Declaration index of a node
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Node ids in declaration order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
