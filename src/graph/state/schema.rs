// SPDX-License-Identifier: MIT

//! State schema definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::store::{State, Update};
use crate::graph::error::GraphError;

/// Schema defining the workflow state structure
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct StateSchema {
    /// Field definitions
    #[serde(flatten)]
    pub fields: BTreeMap<String, StateFieldDef>,
}

/// Definition of a single state field
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StateFieldDef {
    /// Type of the field
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    /// Reducer for merging values
    #[serde(default)]
    pub reducer: ReducerType,
    /// Default value
    pub default: Option<Value>,
}

/// Supported field types
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Accepts any JSON value
    #[default]
    Any,
    String,
    Number,
    Boolean,
    Array,
    Object,
}

/// Reducer types for merging values into state
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ReducerType {
    /// Replace the value (default)
    #[default]
    Overwrite,
    /// Append to array
    Append,
    /// Numeric addition
    Add,
    /// Keep maximum value
    Max,
    /// Keep minimum value
    Min,
    /// Shallow-merge objects
    Merge,
    /// Append messages, replacing any message with the same `id`
    Messages,
}

impl FieldType {
    /// Check whether a value has this type. `null` is accepted for every type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (FieldType::Any, _) => true,
            (FieldType::String, Value::String(_)) => true,
            (FieldType::Number, Value::Number(_)) => true,
            (FieldType::Boolean, Value::Bool(_)) => true,
            (FieldType::Array, Value::Array(_)) => true,
            (FieldType::Object, Value::Object(_)) => true,
            _ => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Any => "any",
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }
}

impl StateFieldDef {
    pub fn new(field_type: FieldType, reducer: ReducerType) -> Self {
        Self {
            field_type,
            reducer,
            default: None,
        }
    }
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field (builder style)
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType, reducer: ReducerType) -> Self {
        self.fields
            .insert(name.into(), StateFieldDef::new(field_type, reducer));
        self
    }

    /// Declare a field with a default value (builder style)
    pub fn field_with_default(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        reducer: ReducerType,
        default: Value,
    ) -> Self {
        let mut def = StateFieldDef::new(field_type, reducer);
        def.default = Some(default);
        self.fields.insert(name.into(), def);
        self
    }

    /// Reducer for a field; undeclared fields overwrite
    pub fn reducer_for(&self, key: &str) -> ReducerType {
        self.fields
            .get(key)
            .map(|def| def.reducer)
            .unwrap_or_default()
    }

    /// Check that defaults and reducers agree with the declared types
    pub fn validate(&self) -> Result<(), GraphError> {
        for (name, def) in &self.fields {
            let compatible = match def.reducer {
                ReducerType::Overwrite => true,
                ReducerType::Append | ReducerType::Messages => {
                    matches!(def.field_type, FieldType::Any | FieldType::Array)
                }
                ReducerType::Add | ReducerType::Max | ReducerType::Min => {
                    matches!(def.field_type, FieldType::Any | FieldType::Number)
                }
                ReducerType::Merge => matches!(def.field_type, FieldType::Any | FieldType::Object),
            };
            if !compatible {
                return Err(GraphError::validation(format!(
                    "field '{}' of type {} cannot use the {:?} reducer",
                    name,
                    def.field_type.name(),
                    def.reducer
                )));
            }
            if let Some(default) = &def.default {
                if !def.field_type.accepts(default) {
                    return Err(GraphError::validation(format!(
                        "default for field '{}' is not a {}",
                        name,
                        def.field_type.name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// State holding every declared default
    pub fn initial_state(&self) -> State {
        self.fields
            .iter()
            .filter_map(|(name, def)| def.default.clone().map(|v| (name.clone(), v)))
            .collect()
    }

    /// Merge a partial update into a state, producing a new state.
    ///
    /// Each field in `update` is combined with the current value by that
    /// field's reducer; fields absent from `update` pass through unchanged.
    pub fn merge(&self, current: &State, update: &Update) -> Result<State, GraphError> {
        let mut next = current.clone();
        for (key, incoming) in update.iter() {
            let def = self.fields.get(key);
            let reducer = def.map(|d| d.reducer).unwrap_or_default();
            let merged = reducer.apply(key, current.get(key), incoming)?;

            if let Some(def) = def {
                if !def.field_type.accepts(&merged) {
                    return Err(GraphError::ReducerMismatch {
                        field: key.clone(),
                        expected: def.field_type.name().to_string(),
                        found: super::reducer::shape_of(&merged).to_string(),
                    });
                }
            }
            next.insert(key.clone(), merged);
        }
        Ok(next)
    }
}
