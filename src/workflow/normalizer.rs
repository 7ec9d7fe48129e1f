// SPDX-License-Identifier: MIT

//! Workflow normalization - resolves aliases, expands `sequence` and parses
//! route conditions into a flat edge list

use super::condition::{self, Expression};
use super::types::{EdgeDefinition, WorkflowDefinition};
use crate::graph::error::GraphError;
use crate::graph::{END, START};

/// Edge with resolved endpoints and parsed conditions
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedEdge {
    Direct {
        from: String,
        to: String,
    },
    Conditional {
        from: String,
        /// Tried in order; `None` always matches
        routes: Vec<(Option<Expression>, String)>,
    },
}

impl NormalizedEdge {
    pub fn source(&self) -> &str {
        match self {
            NormalizedEdge::Direct { from, .. } | NormalizedEdge::Conditional { from, .. } => from,
        }
    }
}

/// Map the `START` / `END` aliases to the reserved ids
pub fn resolve_alias(id: &str) -> String {
    match id.trim() {
        "START" | "start" => START.to_string(),
        "END" | "end" => END.to_string(),
        other => other.to_string(),
    }
}

/// Flatten `sequence` and `edges` into one edge list
pub fn normalize_edges(def: &WorkflowDefinition) -> Result<Vec<NormalizedEdge>, GraphError> {
    let mut edges = Vec::new();

    if !def.sequence.is_empty() {
        let chain: Vec<String> = std::iter::once(START.to_string())
            .chain(def.sequence.iter().map(|id| resolve_alias(id)))
            .chain(std::iter::once(END.to_string()))
            .collect();
        for pair in chain.windows(2) {
            edges.push(NormalizedEdge::Direct {
                from: pair[0].clone(),
                to: pair[1].clone(),
            });
        }
    }

    for edge in &def.edges {
        edges.push(normalize_edge(edge)?);
    }

    log::debug!(
        "Normalized workflow '{}' into {} edges",
        def.name,
        edges.len()
    );
    Ok(edges)
}

fn normalize_edge(edge: &EdgeDefinition) -> Result<NormalizedEdge, GraphError> {
    let from = resolve_alias(&edge.from);

    match (&edge.to, edge.routes.is_empty()) {
        (Some(to), true) => Ok(NormalizedEdge::Direct {
            from,
            to: resolve_alias(to),
        }),
        (None, false) => {
            let routes = edge
                .routes
                .iter()
                .map(|route| {
                    let when = route.when.as_deref().map(condition::parse).transpose()?;
                    Ok((when, resolve_alias(&route.to)))
                })
                .collect::<Result<Vec<_>, GraphError>>()?;
            Ok(NormalizedEdge::Conditional { from, routes })
        }
        (Some(_), false) => Err(GraphError::config(format!(
            "edge from '{}' declares both 'to' and 'routes'",
            edge.from
        ))),
        (None, true) => Err(GraphError::config(format!(
            "edge from '{}' needs either 'to' or 'routes'",
            edge.from
        ))),
    }
}
