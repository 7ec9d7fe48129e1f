// SPDX-License-Identifier: MIT

//! Workflow loader - YAML file loading and parsing

use std::fs;
use std::path::Path;

use super::types::WorkflowDefinition;
use crate::graph::error::GraphError;

/// Loads workflow definitions from YAML files
#[derive(Debug, Default)]
pub struct WorkflowLoader;

impl WorkflowLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a workflow definition from a YAML file
    pub fn load_workflow<P: AsRef<Path>>(&self, path: P) -> Result<WorkflowDefinition, GraphError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            GraphError::config(format!("cannot read workflow {}: {}", path.display(), e))
        })?;
        log::debug!("Loaded workflow file {}", path.display());
        Self::parse_yaml(&content)
    }

    /// Parse a workflow definition from a YAML string
    pub fn parse_yaml(content: &str) -> Result<WorkflowDefinition, GraphError> {
        let def: WorkflowDefinition = serde_yaml::from_str(content)?;
        Ok(def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::state::ReducerType;
    use crate::workflow::types::NodeKind;

    #[test]
    fn test_parse_full_workflow() {
        let yaml = r#"
name: analysis
description: "linear analysis pipeline"
state:
  count: { type: number, reducer: add, default: 0 }
  messages: { type: array, reducer: messages }
config:
  max_steps: 20
  checkpoint_enabled: true
  retry: { max_attempts: 2 }
nodes:
  - id: planner
    kind: update
    update: { workflow_stage: planning_complete }
  - id: report
    kind: http
    url: http://localhost:9000/report
sequence: [planner, report]
"#;
        let def = WorkflowLoader::parse_yaml(yaml).unwrap();
        assert_eq!(def.name, "analysis");
        assert_eq!(def.nodes.len(), 2);
        assert_eq!(def.sequence, vec!["planner", "report"]);
        assert_eq!(def.config.max_steps, 20);
        assert_eq!(def.config.concurrency_limit, 8);
        assert!(def.config.checkpoint_enabled);
        assert_eq!(def.config.retry_policy.max_attempts, 2);
        assert_eq!(def.state.reducer_for("count"), ReducerType::Add);
        assert_eq!(def.state.reducer_for("messages"), ReducerType::Messages);
        assert!(matches!(def.nodes[1].kind, NodeKind::Http { .. }));
    }

    #[test]
    fn test_minimal_workflow() {
        let def = WorkflowLoader::parse_yaml("name: empty\n").unwrap();
        assert!(def.nodes.is_empty());
        assert!(def.edges.is_empty());
        assert_eq!(def.config.max_steps, 25);
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            WorkflowLoader::parse_yaml("name: [unclosed"),
            Err(GraphError::Yaml(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = WorkflowLoader::new().load_workflow("/nonexistent/workflow.yaml");
        assert!(matches!(result, Err(GraphError::Config(_))));
    }
}
