// SPDX-License-Identifier: MIT

//! Workflow builder - turns YAML definitions into compiled graphs

use reqwest::Client;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use super::condition;
use super::loader::WorkflowLoader;
use super::nodes::NodeFactory;
use super::normalizer::{normalize_edges, resolve_alias, NormalizedEdge};
use super::types::{NodeKind, WorkflowDefinition};
use crate::graph::builder::{CompiledGraph, GraphBuilder};
use crate::graph::config::RunConfig;
use crate::graph::edge::Route;
use crate::graph::error::GraphError;
use crate::graph::executor::Executor;
use crate::graph::state::State;
use crate::graph::END;

/// A compiled workflow and the run settings declared with it
#[derive(Debug, Clone)]
pub struct Workflow {
    pub name: String,
    pub description: String,
    pub graph: Arc<CompiledGraph>,
    pub config: RunConfig,
}

impl Workflow {
    /// Executor for this workflow's graph with default collaborators
    pub fn executor(&self) -> Executor {
        Executor::new(self.graph.clone())
    }
}

/// High-level builder for constructing workflows from YAML definitions
pub struct WorkflowBuilder {
    loader: WorkflowLoader,
    factory: NodeFactory,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    /// Use a specific HTTP client for `http` nodes
    pub fn with_client(client: Client) -> Self {
        Self {
            loader: WorkflowLoader::new(),
            factory: NodeFactory::new(client),
        }
    }

    /// Load and build a workflow from a YAML file
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Workflow, GraphError> {
        let def = self.loader.load_workflow(path)?;
        self.build(&def)
    }

    /// Build a workflow from a YAML string
    pub fn from_yaml(&self, content: &str) -> Result<Workflow, GraphError> {
        let def = WorkflowLoader::parse_yaml(content)?;
        self.build(&def)
    }

    /// Build a workflow from a parsed definition
    pub fn build(&self, def: &WorkflowDefinition) -> Result<Workflow, GraphError> {
        def.config.validate()?;
        check_goto_targets(def)?;

        let mut builder = GraphBuilder::new(def.name.clone()).with_schema(def.state.clone());
        for node_def in &def.nodes {
            builder = builder.add_node_spec(self.factory.build(node_def)?);
        }

        for edge in normalize_edges(def)? {
            builder = match edge {
                NormalizedEdge::Direct { from, to } => builder.add_edge(from, to),
                NormalizedEdge::Conditional { from, routes } => {
                    let mut allowed: Vec<String> = Vec::new();
                    for (_, target) in &routes {
                        if !allowed.contains(target) {
                            allowed.push(target.clone());
                        }
                    }
                    builder.add_conditional_edges(from, allowed, move |state: &State| {
                        first_matching_route(&routes, state)
                    })
                }
            };
        }

        let graph = builder.compile()?;
        log::info!(
            "Built workflow '{}' with {} nodes",
            def.name,
            graph.nodes().len()
        );

        Ok(Workflow {
            name: def.name.clone(),
            description: def.description.clone(),
            graph: Arc::new(graph),
            config: def.config.clone(),
        })
    }
}

impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// First route whose condition holds; `END` when none does
fn first_matching_route(routes: &[(Option<condition::Expression>, String)], state: &State) -> Route {
    routes
        .iter()
        .find(|(when, _)| when.as_ref().map_or(true, |expr| condition::evaluate(expr, state)))
        .map(|(_, target)| {
            if target == END {
                Route::End
            } else {
                Route::to(target.clone())
            }
        })
        .unwrap_or(Route::End)
}

fn check_goto_targets(def: &WorkflowDefinition) -> Result<(), GraphError> {
    let ids: HashSet<&str> = def.nodes.iter().map(|n| n.id.as_str()).collect();
    for node in &def.nodes {
        if let NodeKind::Update {
            goto: Some(target), ..
        } = &node.kind
        {
            let target = resolve_alias(target);
            if target != END && !ids.contains(target.as_str()) {
                return Err(GraphError::validation(format!(
                    "node '{}' jumps to undefined node '{}'",
                    node.id, target
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::executor::RunStatus;
    use crate::graph::state::Update;
    use serde_json::json;

    const COUNTER: &str = r#"
name: counter
state:
  count: { type: number, reducer: add, default: 0 }
  stage: { type: string }
nodes:
  - id: increment
    kind: update
    update: { count: 1 }
  - id: finish
    kind: update
    update: { stage: done }
edges:
  - from: START
    to: increment
  - from: increment
    routes:
      - when: "count < 3"
        to: increment
      - to: finish
  - from: finish
    to: END
"#;

    #[tokio::test]
    async fn test_conditional_loop_runs_to_completion() {
        let workflow = WorkflowBuilder::new().from_yaml(COUNTER).unwrap();
        let output = workflow
            .executor()
            .run(Update::new(), &workflow.config)
            .await
            .unwrap();

        assert_eq!(output.status, RunStatus::Completed);
        assert_eq!(output.state.get("count"), Some(&json!(3)));
        assert_eq!(output.state.get("stage"), Some(&json!("done")));
        assert_eq!(output.steps, 4);
    }

    #[tokio::test]
    async fn test_input_seeds_state() {
        let workflow = WorkflowBuilder::new().from_yaml(COUNTER).unwrap();
        let input = Update::new().set("count", json!(5));
        let output = workflow
            .executor()
            .run(input, &workflow.config)
            .await
            .unwrap();

        // count starts at 5, one increment, then the route falls through to finish
        assert_eq!(output.state.get("count"), Some(&json!(6)));
        assert_eq!(output.steps, 2);
    }

    #[test]
    fn test_route_without_match_ends() {
        let routes = vec![(Some(condition::parse("count > 0").unwrap()), "next".to_string())];
        let state = State::from_json(json!({"count": 0})).unwrap();
        assert_eq!(first_matching_route(&routes, &state), Route::End);

        let state = State::from_json(json!({"count": 2})).unwrap();
        assert_eq!(first_matching_route(&routes, &state), Route::to("next"));
    }

    #[test]
    fn test_undefined_goto_target() {
        let yaml = "name: g\nnodes:\n  - id: a\n    kind: update\n    goto: ghost\nsequence: [a]\n";
        assert!(matches!(
            WorkflowBuilder::new().from_yaml(yaml),
            Err(GraphError::GraphValidation(_))
        ));
    }

    #[test]
    fn test_edges_to_undefined_nodes_fail_compile() {
        let yaml = "name: g\nnodes:\n  - id: a\n    kind: update\nsequence: [a, b]\n";
        assert!(matches!(
            WorkflowBuilder::new().from_yaml(yaml),
            Err(GraphError::GraphValidation(_))
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let yaml = "name: g\nconfig: { max_steps: 0 }\nnodes:\n  - id: a\n    kind: update\nsequence: [a]\n";
        assert!(matches!(
            WorkflowBuilder::new().from_yaml(yaml),
            Err(GraphError::Config(_))
        ));
    }
}
