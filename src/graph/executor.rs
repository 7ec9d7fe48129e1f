// SPDX-License-Identifier: MIT

//! Step-based graph executor
//!
//! Each step invokes the whole frontier against one state snapshot, merges
//! the returned updates in node declaration order, routes, and optionally
//! writes a checkpoint. The loop ends when the frontier is empty, a node
//! signals `End`, the step bound is hit, or cancellation is requested.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::builder::CompiledGraph;
use super::checkpoint::{Checkpoint, CheckpointStore, MemoryCheckpointStore};
use super::config::RunConfig;
use super::error::{GraphError, WorkflowFailed};
use super::event::RunEvent;
use super::node::{ControlSignal, ExecutionMode, NodeOutput, NodeSpec};
use super::state::{State, Update};

/// How a run ended without failing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

/// Result of a run that did not fail
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub run_id: String,
    pub status: RunStatus,
    pub state: State,
    /// Number of completed steps
    pub steps: usize,
    /// Pending frontier (non-empty only when cancelled)
    pub frontier: Vec<String>,
}

/// Cooperative cancellation flag, observed between steps.
///
/// The flag is shared by every run of the executor that owns it and stays
/// set once cancelled: later `run`/`resume` calls return `Cancelled` before
/// their first step until `reset` is called.
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle {
    flag: Arc<AtomicBool>,
}

impl CancellationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clear a previous cancellation so the executor can run again
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Outcome of invoking one node, retries included
struct NodeRun {
    node: String,
    attempts: u32,
    result: Result<NodeOutput, GraphError>,
}

/// Drives runs of a compiled graph
pub struct Executor {
    graph: Arc<CompiledGraph>,
    checkpointer: Arc<dyn CheckpointStore>,
    events: Option<mpsc::Sender<RunEvent>>,
    cancel: CancellationHandle,
}

impl Executor {
    pub fn new(graph: impl Into<Arc<CompiledGraph>>) -> Self {
        Self {
            graph: graph.into(),
            checkpointer: Arc::new(MemoryCheckpointStore::new()),
            events: None,
            cancel: CancellationHandle::new(),
        }
    }

    pub fn with_checkpointer(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpointer = store;
        self
    }

    pub fn with_events(mut self, sender: mpsc::Sender<RunEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn with_cancellation(mut self, handle: CancellationHandle) -> Self {
        self.cancel = handle;
        self
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    pub fn checkpointer(&self) -> Arc<dyn CheckpointStore> {
        self.checkpointer.clone()
    }

    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.cancel.clone()
    }

    /// Start a new run from schema defaults merged with `input`
    pub async fn run(&self, input: Update, config: &RunConfig) -> Result<RunOutput, WorkflowFailed> {
        let run_id = config
            .run_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        if let Err(e) = config.validate() {
            return Err(self.fail(&run_id, 0, None, 0, e, None).await);
        }

        let schema = self.graph.schema();
        let state = match schema.merge(&schema.initial_state(), &input) {
            Ok(state) => state,
            Err(e) => return Err(self.fail(&run_id, 0, None, 0, e, None).await),
        };
        let frontier = match self.graph.entry_frontier(&state) {
            Ok(frontier) => frontier,
            Err(e) => return Err(self.fail(&run_id, 0, None, 0, e, None).await),
        };

        log::info!(
            "Starting run '{}' of graph '{}' with entry frontier {:?}",
            run_id,
            self.graph.name(),
            frontier
        );
        self.emit(RunEvent::RunStarted {
            run_id: run_id.clone(),
            graph: self.graph.name().to_string(),
            resumed_from: None,
        })
        .await;

        let mut last_checkpoint = None;
        if config.checkpoint_enabled {
            let checkpoint = Checkpoint::new(&run_id, 0, state.clone(), frontier.clone());
            if let Err(e) = self.checkpointer.save(&checkpoint).await {
                return Err(self.fail(&run_id, 0, None, 0, e, None).await);
            }
            self.emit(RunEvent::CheckpointSaved { step: 0 }).await;
            last_checkpoint = Some(checkpoint);
        }

        self.drive(run_id, state, frontier, 0, last_checkpoint, config)
            .await
    }

    /// Continue a run from its latest stored checkpoint
    pub async fn resume(&self, run_id: &str, config: &RunConfig) -> Result<RunOutput, WorkflowFailed> {
        match self.checkpointer.load(run_id).await {
            Ok(Some(checkpoint)) => self.resume_from(checkpoint, config).await,
            Ok(None) => {
                let error = GraphError::checkpoint(format!("no checkpoint found for run '{}'", run_id));
                Err(self.fail(run_id, 0, None, 0, error, None).await)
            }
            Err(e) => Err(self.fail(run_id, 0, None, 0, e, None).await),
        }
    }

    /// Continue a run from a specific checkpoint.
    ///
    /// Step numbering continues from the checkpoint, so `max_steps` bounds
    /// the total across the original run and the resumed one.
    ///
    /// With checkpointing enabled, resuming from a checkpoint older than the
    /// run's latest forks the run: the checkpoint is copied under a new run
    /// id (`config.run_id` when it names a different run, otherwise a fresh
    /// uuid) and the returned `RunOutput::run_id` reports it. The original
    /// history is left untouched.
    pub async fn resume_from(
        &self,
        checkpoint: Checkpoint,
        config: &RunConfig,
    ) -> Result<RunOutput, WorkflowFailed> {
        let run_id = checkpoint.run_id.clone();
        let step = checkpoint.step;

        if let Err(e) = config.validate() {
            return Err(self.fail(&run_id, step, None, 0, e, Some(checkpoint)).await);
        }

        if let Some(unknown) = checkpoint
            .frontier
            .iter()
            .find(|id| !self.graph.nodes().contains(id))
        {
            let error = GraphError::validation(format!(
                "checkpoint frontier references unknown node '{}'",
                unknown
            ));
            return Err(self.fail(&run_id, step, None, 0, error, Some(checkpoint)).await);
        }

        let checkpoint = if config.checkpoint_enabled {
            match self.fork_if_stale(checkpoint, config).await {
                Ok(checkpoint) => checkpoint,
                Err((run_id, e)) => return Err(self.fail(&run_id, step, None, 0, e, None).await),
            }
        } else {
            checkpoint
        };
        let run_id = checkpoint.run_id.clone();

        for id in &checkpoint.frontier {
            if self.graph.node(id).is_some_and(|spec| !spec.idempotent) {
                log::warn!(
                    "Resuming run '{}' re-invokes non-idempotent node '{}'",
                    run_id,
                    id
                );
            }
        }

        log::info!(
            "Resuming run '{}' from step {} with frontier {:?}",
            run_id,
            step,
            checkpoint.frontier
        );
        self.emit(RunEvent::RunStarted {
            run_id: run_id.clone(),
            graph: self.graph.name().to_string(),
            resumed_from: Some(step),
        })
        .await;

        let state = checkpoint.state.clone();
        let frontier = checkpoint.frontier.clone();
        self.drive(run_id, state, frontier, step, Some(checkpoint), config)
            .await
    }

    /// Copy `checkpoint` under a new run id when its run has later checkpoints
    async fn fork_if_stale(
        &self,
        checkpoint: Checkpoint,
        config: &RunConfig,
    ) -> Result<Checkpoint, (String, GraphError)> {
        let source = checkpoint.run_id.clone();
        let latest = self
            .checkpointer
            .load(&source)
            .await
            .map_err(|e| (source.clone(), e))?;
        if latest.map_or(true, |latest| latest.step <= checkpoint.step) {
            return Ok(checkpoint);
        }

        let run_id = config
            .run_id
            .clone()
            .filter(|id| *id != source)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        log::info!(
            "Forking run '{}' at step {} into run '{}'",
            source,
            checkpoint.step,
            run_id
        );

        let fork = Checkpoint::new(&run_id, checkpoint.step, checkpoint.state, checkpoint.frontier);
        self.checkpointer
            .save(&fork)
            .await
            .map_err(|e| (run_id.clone(), e))?;
        self.emit(RunEvent::CheckpointSaved { step: fork.step }).await;
        Ok(fork)
    }

    async fn drive(
        &self,
        run_id: String,
        mut state: State,
        mut frontier: Vec<String>,
        mut step: usize,
        mut last_checkpoint: Option<Checkpoint>,
        config: &RunConfig,
    ) -> Result<RunOutput, WorkflowFailed> {
        let schema = self.graph.schema();

        loop {
            if frontier.is_empty() {
                return Ok(self.finish(run_id, RunStatus::Completed, state, step, frontier).await);
            }
            if self.cancel.is_cancelled() {
                log::info!("Run '{}' cancelled after step {}", run_id, step);
                return Ok(self.finish(run_id, RunStatus::Cancelled, state, step, frontier).await);
            }
            if step >= config.max_steps {
                let error = GraphError::StepLimitExceeded {
                    limit: config.max_steps,
                };
                return Err(self.fail(&run_id, step, None, 0, error, last_checkpoint).await);
            }

            step += 1;
            log::info!("Run '{}' step {}: executing {:?}", run_id, step, frontier);
            self.emit(RunEvent::StepStarted {
                step,
                frontier: frontier.clone(),
            })
            .await;

            let mut outputs = Vec::with_capacity(frontier.len());
            for run in self.execute_step(step, &frontier, &state, config).await {
                match run.result {
                    Ok(output) => outputs.push((run.node, run.attempts, output)),
                    Err(error) => {
                        return Err(self
                            .fail(&run_id, step, Some(run.node), run.attempts, error, last_checkpoint)
                            .await)
                    }
                }
            }

            let mut completed = Vec::with_capacity(outputs.len());
            let mut terminate = false;
            for (node, attempts, output) in outputs {
                let (update, signal) = output.into_parts();
                state = match schema.merge(&state, &update) {
                    Ok(next) => next,
                    Err(error) => {
                        return Err(self
                            .fail(&run_id, step, Some(node), attempts, error, last_checkpoint)
                            .await)
                    }
                };
                if signal == Some(ControlSignal::End) {
                    log::info!("Node '{}' requested termination", node);
                    terminate = true;
                }
                self.emit(RunEvent::NodeCompleted {
                    step,
                    node: node.clone(),
                    attempts,
                })
                .await;
                completed.push((node, signal));
            }

            frontier = if terminate {
                Vec::new()
            } else {
                match self.graph.next_frontier(&completed, &state) {
                    Ok(next) => next,
                    Err(error) => {
                        let node = match &error {
                            GraphError::InvalidRoute { from, .. } => Some(from.clone()),
                            _ => None,
                        };
                        return Err(self.fail(&run_id, step, node, 0, error, last_checkpoint).await);
                    }
                }
            };

            log::debug!("Run '{}' step {} next frontier {:?}", run_id, step, frontier);
            self.emit(RunEvent::StepCompleted {
                step,
                next: frontier.clone(),
            })
            .await;

            if config.checkpoint_enabled {
                let checkpoint = Checkpoint::new(&run_id, step, state.clone(), frontier.clone());
                if let Err(e) = self.checkpointer.save(&checkpoint).await {
                    return Err(self.fail(&run_id, step, None, 0, e, last_checkpoint).await);
                }
                self.emit(RunEvent::CheckpointSaved { step }).await;
                last_checkpoint = Some(checkpoint);
            }
        }
    }

    /// Invoke every frontier node against the same snapshot.
    ///
    /// Concurrent nodes run first, bounded by the concurrency limit; then
    /// sequential nodes run one at a time. Results come back in declaration
    /// order.
    async fn execute_step(
        &self,
        step: usize,
        frontier: &[String],
        state: &State,
        config: &RunConfig,
    ) -> Vec<NodeRun> {
        let specs: Vec<&NodeSpec> = frontier
            .iter()
            .filter_map(|id| self.graph.node(id))
            .collect();
        let (concurrent, sequential): (Vec<&NodeSpec>, Vec<&NodeSpec>) = specs
            .into_iter()
            .partition(|spec| spec.mode == ExecutionMode::Concurrent);

        let pending: Vec<_> = concurrent
            .into_iter()
            .map(|spec| self.invoke_node(step, spec, state, config))
            .collect();
        let mut runs: Vec<NodeRun> = stream::iter(pending)
            .buffer_unordered(config.concurrency_limit.max(1))
            .collect()
            .await;

        for spec in sequential {
            runs.push(self.invoke_node(step, spec, state, config).await);
        }

        runs.sort_by_key(|run| self.graph.nodes().position(&run.node).unwrap_or(usize::MAX));
        runs
    }

    /// Invoke a node, applying its timeout and retry policy
    async fn invoke_node(&self, step: usize, spec: &NodeSpec, state: &State, config: &RunConfig) -> NodeRun {
        let policy = spec.retry.as_ref().unwrap_or(&config.retry_policy);
        let timeout = spec.timeout.or_else(|| config.node_timeout());
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = match timeout {
                Some(limit) => match tokio::time::timeout(limit, spec.node.invoke(state)).await {
                    Ok(result) => result.map_err(|e| GraphError::node_execution(&spec.id, e.to_string())),
                    Err(_) => Err(GraphError::NodeTimeout {
                        node: spec.id.clone(),
                        timeout: limit,
                    }),
                },
                None => spec
                    .node
                    .invoke(state)
                    .await
                    .map_err(|e| GraphError::node_execution(&spec.id, e.to_string())),
            };

            match result {
                Ok(output) => {
                    log::debug!("Node '{}' completed after {} attempt(s)", spec.id, attempt);
                    return NodeRun {
                        node: spec.id.clone(),
                        attempts: attempt,
                        result: Ok(output),
                    };
                }
                Err(error) if policy.should_retry(attempt) => {
                    let delay = policy.delay_for(attempt);
                    log::warn!(
                        "Node '{}' attempt {} failed: {}; retrying in {:?}",
                        spec.id,
                        attempt,
                        error,
                        delay
                    );
                    self.emit(RunEvent::NodeRetrying {
                        step,
                        node: spec.id.clone(),
                        attempt,
                        error: error.to_string(),
                    })
                    .await;
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    log::error!("Node '{}' failed after {} attempt(s): {}", spec.id, attempt, error);
                    return NodeRun {
                        node: spec.id.clone(),
                        attempts: attempt,
                        result: Err(error),
                    };
                }
            }
        }
    }

    async fn finish(
        &self,
        run_id: String,
        status: RunStatus,
        state: State,
        steps: usize,
        frontier: Vec<String>,
    ) -> RunOutput {
        log::info!("Run '{}' {} after {} step(s)", run_id, status.as_str(), steps);
        self.emit(RunEvent::RunFinished {
            status: status.as_str().to_string(),
            steps,
        })
        .await;
        RunOutput {
            run_id,
            status,
            state,
            steps,
            frontier,
        }
    }

    async fn fail(
        &self,
        run_id: &str,
        step: usize,
        node: Option<String>,
        attempts: u32,
        error: GraphError,
        last_checkpoint: Option<Checkpoint>,
    ) -> WorkflowFailed {
        log::error!("Run '{}' failed at step {}: {}", run_id, step, error);
        self.emit(RunEvent::RunFailed {
            step,
            node: node.clone(),
            error: error.to_string(),
        })
        .await;
        WorkflowFailed {
            run_id: run_id.to_string(),
            step,
            node,
            attempts,
            error,
            last_checkpoint,
        }
    }

    async fn emit(&self, event: RunEvent) {
        if let Some(sender) = &self.events {
            // A dropped receiver only means nobody is listening
            let _ = sender.send(event).await;
        }
    }
}
