// SPDX-License-Identifier: MIT

pub mod graph;
pub mod server;
pub mod workflow;
