// SPDX-License-Identifier: MIT

//! Route conditions for YAML conditional edges
//!
//! Conditions are small boolean expressions over the state, e.g.
//! - `count > 0`
//! - `stage == 'report' and confidence >= 0.8`
//! - `not (tags contains 'skip')`

mod ast;
mod evaluator;
mod parser;

pub use ast::{CompareOp, Expression, Literal};
pub use evaluator::evaluate;
pub use parser::parse;
