// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::graph::node::{ControlSignal, Node, NodeOutput, NodeResult};
use crate::graph::state::{State, Update};

/// Node returning a fixed update and optional control signal
pub struct UpdateNode {
    update: Update,
    signal: Option<ControlSignal>,
}

impl UpdateNode {
    pub fn new(update: Update, signal: Option<ControlSignal>) -> Self {
        Self { update, signal }
    }
}

#[async_trait]
impl Node for UpdateNode {
    async fn invoke(&self, _state: &State) -> NodeResult {
        let output = match &self.signal {
            None => NodeOutput::Update(self.update.clone()),
            Some(signal) if self.update.is_empty() => NodeOutput::Signal(signal.clone()),
            Some(signal) => NodeOutput::Command(self.update.clone(), signal.clone()),
        };
        Ok(output)
    }
}
