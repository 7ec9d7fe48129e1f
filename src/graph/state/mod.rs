// SPDX-License-Identifier: MIT

//! State management for graph workflows
//!
//! This module provides:
//! - `StateSchema` - defines the shape, reducers and defaults of workflow state
//! - `State` / `Update` - the state value and the partial updates nodes return
//! - `ReducerType` - strategies for merging updates into state

mod reducer;
mod schema;
mod store;

pub use schema::{FieldType, ReducerType, StateFieldDef, StateSchema};
pub use store::{State, Update};

pub(crate) use reducer::shape_of;
