// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Named float parameters supplied with a query request.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A required named parameter was absent from the request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("missing named parameter `{0}`")]
pub struct MissingParam(pub String);

/// String-keyed float values attached to one query request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams {
    values: BTreeMap<String, f32>,
}

impl QueryParams {
    /// Empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: f32) -> Self {
        self.set(name, value);
        self
    }

    /// Inserts or replaces a value.
    pub fn set(&mut self, name: impl Into<String>, value: f32) {
        self.values.insert(name.into(), value);
    }

    /// Looks up a value.
    pub fn get(&self, name: &str) -> Option<f32> {
        self.values.get(name).copied()
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` when no parameters are set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A float property that is either a literal or read from a named parameter.
///
/// Serialized as a bare number or as `{ "param": "name" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FloatParam {
    /// Literal value.
    Value(f32),
    /// Value of the named request parameter.
    Named {
        /// Parameter name.
        param: String,
    },
}

impl FloatParam {
    /// Reference to a named parameter.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named { param: name.into() }
    }

    /// Name of the referenced parameter, if any.
    pub fn param_name(&self) -> Option<&str> {
        match self {
            Self::Value(_) => None,
            Self::Named { param } => Some(param),
        }
    }

    /// Resolves against `params`; a missing name is an error, never zero.
    pub fn resolve(&self, params: &QueryParams) -> Result<f32, MissingParam> {
        match self {
            Self::Value(value) => Ok(*value),
            Self::Named { param } => params
                .get(param)
                .ok_or_else(|| MissingParam(param.clone())),
        }
    }
}

impl From<f32> for FloatParam {
    fn from(value: f32) -> Self {
        Self::Value(value)
    }
}

impl Default for FloatParam {
    fn default() -> Self {
        Self::Value(0.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn named_param_resolves_or_reports_missing() {
        let params = QueryParams::new().with("radius", 250.0);
        assert_eq!(FloatParam::named("radius").resolve(&params), Ok(250.0));
        assert_eq!(
            FloatParam::named("height").resolve(&params),
            Err(MissingParam("height".into()))
        );
        assert_eq!(FloatParam::Value(3.0).resolve(&params), Ok(3.0));
    }

    #[test]
    fn deserializes_number_or_reference() {
        let literal: FloatParam = serde_json::from_str("12.5").unwrap();
        assert_eq!(literal, FloatParam::Value(12.5));
        let named: FloatParam = serde_json::from_str(r#"{"param":"range"}"#).unwrap();
        assert_eq!(named.param_name(), Some("range"));
    }
}
