// SPDX-License-Identifier: MIT

//! Local process node
//!
//! The state is written to the child's stdin as JSON. A JSON object on
//! stdout is taken as the partial update; any other stdout is stored as a
//! string under the node's output field.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::graph::node::{Node, NodeResult};
use crate::graph::state::{State, Update};

pub struct CommandNode {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    output_field: String,
}

impl CommandNode {
    pub fn new(program: impl Into<String>, args: Vec<String>, output_field: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args,
            env: BTreeMap::new(),
            output_field: output_field.into(),
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }
}

#[async_trait]
impl Node for CommandNode {
    async fn invoke(&self, state: &State) -> NodeResult {
        let payload = serde_json::to_vec(state)?;

        log::debug!("Spawning {} {:?}", self.program, self.args);
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to spawn '{}': {}", self.program, e))?;

        let stdin = child.stdin.take();
        let writer = async move {
            if let Some(mut stdin) = stdin {
                match stdin.write_all(&payload).await {
                    // The child may exit without reading its input
                    Err(e) if e.kind() != ErrorKind::BrokenPipe => return Err(e),
                    _ => {}
                }
            }
            Ok(())
        };
        let (written, output) = tokio::join!(writer, child.wait_with_output());
        written?;
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )
            .into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let update = match serde_json::from_str::<Value>(&stdout) {
            Ok(value @ Value::Object(_)) => Update::from_json(value).unwrap_or_default(),
            _ => Update::new().set(self.output_field.clone(), Value::String(stdout)),
        };
        Ok(update.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::NodeOutput;
    use serde_json::json;

    fn sh(script: &str, output: &str) -> CommandNode {
        CommandNode::new("sh", vec!["-c".to_string(), script.to_string()], output)
    }

    #[tokio::test]
    async fn test_plain_stdout_goes_to_output_field() {
        let node = sh("echo collected", "collected_data");
        let output = node.invoke(&State::empty()).await.unwrap();
        assert_eq!(
            output,
            NodeOutput::Update(Update::new().set("collected_data", json!("collected")))
        );
    }

    #[tokio::test]
    async fn test_json_stdout_is_the_update() {
        // echo the state back: stdin carries the state as JSON
        let node = sh("cat", "unused");
        let state = State::from_json(json!({"count": 2, "stage": "planning"})).unwrap();
        let (update, signal) = node.invoke(&state).await.unwrap().into_parts();

        assert!(signal.is_none());
        assert_eq!(update.get("count"), Some(&json!(2)));
        assert_eq!(update.get("stage"), Some(&json!("planning")));
    }

    #[tokio::test]
    async fn test_env_is_passed() {
        let mut env = BTreeMap::new();
        env.insert("STAGE".to_string(), "report".to_string());
        let node = sh("printf '%s' \"$STAGE\"", "stage").with_env(env);

        let (update, _) = node.invoke(&State::empty()).await.unwrap().into_parts();
        assert_eq!(update.get("stage"), Some(&json!("report")));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_an_error() {
        let node = sh("echo broken >&2; exit 3", "out");
        let err = node.invoke(&State::empty()).await.unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let node = CommandNode::new("definitely-not-a-real-program-xyz", vec![], "out");
        assert!(node.invoke(&State::empty()).await.is_err());
    }
}
