// SPDX-License-Identifier: MIT

//! YAML workflow definitions on top of the graph engine

pub mod builder;
pub mod condition;
pub mod loader;
pub mod nodes;
pub mod normalizer;
pub mod types;

pub use builder::{Workflow, WorkflowBuilder};
pub use loader::WorkflowLoader;
pub use types::{EdgeDefinition, NodeDefinition, NodeKind, RouteDefinition, WorkflowDefinition};
