// SPDX-License-Identifier: MIT

//! Router: turns completed nodes and post-step state into the next frontier

use std::collections::BTreeSet;

use super::builder::CompiledGraph;
use super::error::GraphError;
use super::node::ControlSignal;
use super::state::State;
use super::{END, START};

impl CompiledGraph {
    /// Targets reached from `from` by its outgoing edges (may include `END`)
    pub fn route(&self, from: &str, state: &State) -> Result<Vec<String>, GraphError> {
        self.edges()
            .outgoing(from)
            .iter()
            .map(|edge| {
                edge.fire(state)
                    .map_err(|(target, allowed)| GraphError::InvalidRoute {
                        from: from.to_string(),
                        target,
                        allowed,
                    })
            })
            .collect()
    }

    /// Frontier for the first step, evaluated against the initial state
    pub fn entry_frontier(&self, state: &State) -> Result<Vec<String>, GraphError> {
        let targets = self.route(START, state)?;
        Ok(self.normalize_frontier(targets))
    }

    /// Compute the next frontier from the nodes completed in a step.
    ///
    /// A `Goto` signal replaces the node's outgoing edges. Targets reached
    /// more than once are deduplicated, `END` entries are dropped and the
    /// result is ordered by node declaration order.
    pub fn next_frontier(
        &self,
        completed: &[(String, Option<ControlSignal>)],
        state: &State,
    ) -> Result<Vec<String>, GraphError> {
        let mut targets = Vec::new();
        for (node, signal) in completed {
            match signal {
                Some(ControlSignal::Goto(target)) => {
                    if target != END && !self.nodes().contains(target) {
                        return Err(GraphError::InvalidRoute {
                            from: node.clone(),
                            target: target.clone(),
                            allowed: self.nodes().ids().map(String::from).collect(),
                        });
                    }
                    targets.push(target.clone());
                }
                _ => targets.extend(self.route(node, state)?),
            }
        }
        Ok(self.normalize_frontier(targets))
    }

    fn normalize_frontier(&self, targets: Vec<String>) -> Vec<String> {
        let positions: BTreeSet<usize> = targets
            .iter()
            .filter(|t| t.as_str() != END)
            .filter_map(|t| self.nodes().position(t))
            .collect();

        let ids: Vec<&str> = self.nodes().ids().collect();
        positions.into_iter().map(|i| ids[i].to_string()).collect()
    }
}
