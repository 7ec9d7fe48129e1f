// SPDX-License-Identifier: MIT

//! Webhook node: POSTs `{"node": id, "state": {...}}` and reads the update
//! from the JSON response body

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use url::Url;

use crate::graph::error::GraphError;
use crate::graph::node::{Node, NodeResult};
use crate::graph::state::{State, Update};

pub struct HttpNode {
    id: String,
    url: Url,
    headers: BTreeMap<String, String>,
    client: Client,
}

impl HttpNode {
    pub fn new(id: impl Into<String>, url: &str, client: Client) -> Result<Self, GraphError> {
        let id = id.into();
        let url = Url::parse(url)
            .map_err(|e| GraphError::config(format!("node '{}' has an invalid url '{}': {}", id, url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(GraphError::config(format!(
                "node '{}' url must be http or https, got '{}'",
                id,
                url.scheme()
            )));
        }
        Ok(Self {
            id,
            url,
            headers: BTreeMap::new(),
            client,
        })
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }
}

#[async_trait]
impl Node for HttpNode {
    async fn invoke(&self, state: &State) -> NodeResult {
        let mut request = self
            .client
            .post(self.url.clone())
            .json(&json!({ "node": self.id, "state": state }));
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(format!("{} returned {}: {}", self.url, status, body.trim()).into());
        }

        if body.trim().is_empty() {
            return Ok(Update::new().into());
        }
        match serde_json::from_str::<Value>(&body)? {
            value @ Value::Object(_) => Ok(Update::from_json(value).unwrap_or_default().into()),
            other => Err(format!(
                "{} returned {} instead of a JSON object",
                self.url,
                crate::graph::state::shape_of(&other)
            )
            .into()),
        }
    }
}
