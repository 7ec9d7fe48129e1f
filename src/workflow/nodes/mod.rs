// SPDX-License-Identifier: MIT

//! Built-in node kinds for YAML workflows

mod command;
mod http;
mod update;

pub use command::CommandNode;
pub use http::HttpNode;
pub use update::UpdateNode;

use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use super::types::{NodeDefinition, NodeKind};
use super::normalizer::resolve_alias;
use crate::graph::error::GraphError;
use crate::graph::node::{ControlSignal, Node, NodeSpec};
use crate::graph::state::Update;
use crate::graph::END;

/// Creates node specs from definitions
pub struct NodeFactory {
    client: Client,
}

impl NodeFactory {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a node spec with its timeout, retry, mode and idempotence
    pub fn build(&self, def: &NodeDefinition) -> Result<NodeSpec, GraphError> {
        let node = self.build_node(def)?;
        log::debug!("Built {} node '{}'", def.kind.name(), def.id);

        let mut spec = NodeSpec::from_arc(def.id.clone(), node).with_mode(def.mode);
        if let Some(ms) = def.timeout_ms {
            if ms == 0 {
                return Err(GraphError::config(format!(
                    "node '{}' timeout_ms must be positive",
                    def.id
                )));
            }
            spec = spec.with_timeout(Duration::from_millis(ms));
        }
        if let Some(retry) = &def.retry {
            spec = spec.with_retry(retry.clone());
        }
        if !def.idempotent {
            spec = spec.non_idempotent();
        }
        Ok(spec)
    }

    fn build_node(&self, def: &NodeDefinition) -> Result<Arc<dyn Node>, GraphError> {
        match &def.kind {
            NodeKind::Update { update, goto, end } => {
                let signal = match (goto, end) {
                    (Some(_), true) => {
                        return Err(GraphError::config(format!(
                            "node '{}' cannot set both 'goto' and 'end'",
                            def.id
                        )))
                    }
                    (Some(target), false) => match resolve_alias(target) {
                        target if target == END => Some(ControlSignal::End),
                        target => Some(ControlSignal::Goto(target)),
                    },
                    (None, true) => Some(ControlSignal::End),
                    (None, false) => None,
                };
                let update: Update = update.clone().into_iter().collect();
                Ok(Arc::new(UpdateNode::new(update, signal)))
            }
            NodeKind::Command {
                program,
                args,
                output,
                env,
            } => {
                let field = output
                    .clone()
                    .unwrap_or_else(|| format!("{}_output", def.id));
                Ok(Arc::new(
                    CommandNode::new(program.clone(), args.clone(), field).with_env(env.clone()),
                ))
            }
            NodeKind::Http { url, headers } => Ok(Arc::new(
                HttpNode::new(def.id.clone(), url, self.client.clone())?.with_headers(headers.clone()),
            )),
        }
    }
}

impl Default for NodeFactory {
    fn default() -> Self {
        Self::new(Client::new())
    }
}
