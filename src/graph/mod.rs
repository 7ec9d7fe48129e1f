// SPDX-License-Identifier: MIT

//! Stateful workflow graph engine
//!
//! Nodes read a shared state snapshot and return partial updates, which are
//! folded into the state by per-field reducers. Edges (static or
//! conditional) decide which nodes run in the next step. The executor
//! drives the step loop with bounded concurrency, retries, timeouts and
//! optional checkpointing.

pub mod builder;
pub mod checkpoint;
pub mod config;
pub mod edge;
pub mod error;
pub mod event;
pub mod executor;
pub mod node;
pub mod retry;
mod router;
pub mod state;

pub use builder::{CompiledGraph, GraphBuilder};
pub use checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use config::RunConfig;
pub use edge::{Edge, EdgeTable, Route};
pub use error::{GraphError, WorkflowFailed};
pub use event::RunEvent;
pub use executor::{CancellationHandle, Executor, RunOutput, RunStatus};
pub use node::{node_fn, ControlSignal, ExecutionMode, Node, NodeOutput, NodeRegistry, NodeResult, NodeSpec};
pub use retry::RetryPolicy;
pub use state::{FieldType, ReducerType, State, StateFieldDef, StateSchema, Update};

/// Virtual source of entry edges
pub const START: &str = "__start__";

/// Terminal marker
pub const END: &str = "__end__";
