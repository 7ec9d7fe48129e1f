// SPDX-License-Identifier: MIT

//! Graph definition surface
//!
//! `GraphBuilder` collects nodes, edges and the state schema; `compile()`
//! validates the topology and produces an immutable `CompiledGraph`.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use super::edge::{Edge, EdgeTable, Route};
use super::error::GraphError;
use super::node::{Node, NodeRegistry, NodeSpec};
use super::state::{State, StateSchema};
use super::{END, START};

/// Builder for workflow graphs
pub struct GraphBuilder {
    name: String,
    schema: StateSchema,
    nodes: Vec<NodeSpec>,
    edges: Vec<Edge>,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: StateSchema::default(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn with_schema(mut self, schema: StateSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Register a node with default settings
    pub fn add_node(self, id: impl Into<String>, node: impl Node + 'static) -> Self {
        self.add_node_spec(NodeSpec::new(id, node))
    }

    /// Register a node with explicit timeout/retry/mode settings
    pub fn add_node_spec(mut self, spec: NodeSpec) -> Self {
        self.nodes.push(spec);
        self
    }

    /// Unconditional edge; `from` may be `START`, `to` may be `END`
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push(Edge::Direct {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    /// Conditional edge whose routing function must pick one of `allowed`
    pub fn add_conditional_edges<I, S, F>(mut self, from: impl Into<String>, allowed: I, route: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&State) -> Route + Send + Sync + 'static,
    {
        self.edges.push(Edge::Conditional {
            from: from.into(),
            route: Arc::new(route),
            allowed: allowed.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn set_entry_point(self, node: impl Into<String>) -> Self {
        self.add_edge(START, node)
    }

    pub fn set_finish_point(self, node: impl Into<String>) -> Self {
        self.add_edge(node, END)
    }

    /// Validate and freeze the graph
    pub fn compile(self) -> Result<CompiledGraph, GraphError> {
        self.schema.validate()?;

        let mut registry = NodeRegistry::new();
        for spec in self.nodes {
            registry.register(spec)?;
        }

        let mut edges = EdgeTable::new();
        for edge in self.edges {
            validate_edge(&edge, &registry)?;
            edges.add(edge);
        }

        if edges.outgoing(START).is_empty() {
            return Err(GraphError::validation(
                "graph has no entry point (no edge from START)",
            ));
        }

        let graph = CompiledGraph {
            name: self.name,
            schema: self.schema,
            nodes: registry,
            edges,
        };
        graph.warn_unreachable();

        log::info!(
            "Compiled graph '{}' with {} nodes and {} edges",
            graph.name,
            graph.nodes.len(),
            graph.edges.len()
        );
        Ok(graph)
    }
}

fn validate_edge(edge: &Edge, registry: &NodeRegistry) -> Result<(), GraphError> {
    let from = edge.source();
    if from == END {
        return Err(GraphError::validation("edges cannot start at END"));
    }
    if from != START && !registry.contains(from) {
        return Err(GraphError::validation(format!(
            "edge references undefined source node '{}'",
            from
        )));
    }

    if let Edge::Conditional { allowed, .. } = edge {
        if allowed.is_empty() {
            return Err(GraphError::validation(format!(
                "conditional edge from '{}' has an empty allow-list",
                from
            )));
        }
    }

    for target in edge.targets() {
        if target == START {
            return Err(GraphError::validation(format!(
                "edge from '{}' cannot target START",
                from
            )));
        }
        if target != END && !registry.contains(target) {
            return Err(GraphError::validation(format!(
                "edge from '{}' references undefined node '{}'",
                from, target
            )));
        }
    }
    Ok(())
}

/// Immutable, validated graph consumed by the executor
#[derive(Debug)]
pub struct CompiledGraph {
    name: String,
    schema: StateSchema,
    nodes: NodeRegistry,
    edges: EdgeTable,
}

impl CompiledGraph {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn nodes(&self) -> &NodeRegistry {
        &self.nodes
    }

    pub fn edges(&self) -> &EdgeTable {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.get(id)
    }

    /// Nodes not reachable from START through declared edges. `Goto`
    /// signals can still reach them at run time, so this only warns.
    fn warn_unreachable(&self) {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([START]);
        while let Some(current) = queue.pop_front() {
            for edge in self.edges.outgoing(current) {
                for target in edge.targets() {
                    if target != END && seen.insert(target) {
                        queue.push_back(target);
                    }
                }
            }
        }

        for id in self.nodes.ids() {
            if !seen.contains(id) {
                log::warn!("Node '{}' in graph '{}' is unreachable from START", id, self.name);
            }
        }
    }
}
