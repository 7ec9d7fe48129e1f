// SPDX-License-Identifier: MIT

//! Edge table: unconditional and conditional transitions

use std::collections::HashMap;
use std::sync::Arc;

use super::state::State;
use super::END;

/// Routing decision returned by a conditional edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Continue with the named node (must be in the edge's allow-list)
    To(String),
    /// Stop this branch
    End,
}

impl Route {
    pub fn to(target: impl Into<String>) -> Self {
        Route::To(target.into())
    }
}

/// Pure routing function evaluated against post-step state
pub type RouteFn = Arc<dyn Fn(&State) -> Route + Send + Sync>;

/// A declared transition between nodes
#[derive(Clone)]
pub enum Edge {
    /// Always fires when `from` completes
    Direct { from: String, to: String },
    /// Fires towards whichever allow-listed target `route` picks
    Conditional {
        from: String,
        route: RouteFn,
        allowed: Vec<String>,
    },
}

impl Edge {
    pub fn source(&self) -> &str {
        match self {
            Edge::Direct { from, .. } | Edge::Conditional { from, .. } => from,
        }
    }

    /// Every node this edge can lead to
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Edge::Direct { to, .. } => vec![to.as_str()],
            Edge::Conditional { allowed, .. } => allowed.iter().map(|s| s.as_str()).collect(),
        }
    }

    /// Evaluate the edge; `END` stands for the terminal marker
    pub(crate) fn fire(&self, state: &State) -> Result<String, (String, Vec<String>)> {
        match self {
            Edge::Direct { to, .. } => Ok(to.clone()),
            Edge::Conditional { route, allowed, .. } => match route(state) {
                Route::End => Ok(END.to_string()),
                Route::To(target) if allowed.iter().any(|a| *a == target) => Ok(target),
                Route::To(target) => Err((target, allowed.clone())),
            },
        }
    }
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Direct { from, to } => f
                .debug_struct("Direct")
                .field("from", from)
                .field("to", to)
                .finish(),
            Edge::Conditional { from, allowed, .. } => f
                .debug_struct("Conditional")
                .field("from", from)
                .field("allowed", allowed)
                .finish(),
        }
    }
}

/// Outgoing edges grouped by source node
#[derive(Debug, Clone, Default)]
pub struct EdgeTable {
    by_source: HashMap<String, Vec<Edge>>,
    count: usize,
}

impl EdgeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, edge: Edge) {
        self.by_source
            .entry(edge.source().to_string())
            .or_default()
            .push(edge);
        self.count += 1;
    }

    /// Outgoing edges of a node, in declaration order
    pub fn outgoing(&self, source: &str) -> &[Edge] {
        self.by_source
            .get(source)
            .map(|edges| edges.as_slice())
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Edge> {
        self.by_source.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
