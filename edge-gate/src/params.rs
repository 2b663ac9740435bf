// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Secure Parameter Store
//!
//! Tenant login configuration, the session key pair and the bypass secret are
//! resolved by structured names such as `/<prefix>/aad/config/<env>`.
//!
//! Stores:
//! - `JsonFileParameterStore`: a JSON object of name to value, loaded once
//! - `InMemoryParameterStore`: fixed map, for tests and local runs

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("Parameter not found: {0}")]
    NotFound(String),

    #[error("Parameter {name} is malformed: {reason}")]
    Malformed { name: String, reason: String },

    #[error("Failed to read parameter file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid parameter file: {0}")]
    InvalidFile(String),
}

/// Read access to named secrets.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Raw value of a parameter.
    async fn get_parameter(&self, name: &str) -> Result<String, ParameterError>;
}

/// Fetch a parameter and parse its value as JSON.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn ParameterStore,
    name: &str,
) -> Result<T, ParameterError> {
    debug!(name = %name, "Querying for param");
    let raw = store.get_parameter(name).await?;
    serde_json::from_str(&raw).map_err(|e| ParameterError::Malformed {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct InMemoryParameterStore {
    values: HashMap<String, String>,
}

impl InMemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl ParameterStore for InMemoryParameterStore {
    async fn get_parameter(&self, name: &str) -> Result<String, ParameterError> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| ParameterError::NotFound(name.to_string()))
    }
}

// =============================================================================
// JSON file store
// =============================================================================

/// Parameters read from a JSON object on disk.
///
/// String values are returned as-is; any other JSON value is returned as its
/// serialized form so it can be parsed again with [`get_json`].
#[derive(Debug, Clone)]
pub struct JsonFileParameterStore {
    inner: InMemoryParameterStore,
}

impl JsonFileParameterStore {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ParameterError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let store = Self::from_json(&content)?;
        info!(path = %path.display(), count = store.inner.values.len(), "Parameter file loaded");
        Ok(store)
    }

    pub fn from_json(content: &str) -> Result<Self, ParameterError> {
        let object: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(content).map_err(|e| ParameterError::InvalidFile(e.to_string()))?;

        let values = object
            .into_iter()
            .map(|(name, value)| {
                let raw = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (name, raw)
            })
            .collect();

        Ok(Self {
            inner: InMemoryParameterStore { values },
        })
    }
}

#[async_trait]
impl ParameterStore for JsonFileParameterStore {
    async fn get_parameter(&self, name: &str) -> Result<String, ParameterError> {
        self.inner.get_parameter(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Key {
        #[serde(rename = "PUBLIC_KEY")]
        public_key: String,
    }

    #[tokio::test]
    async fn test_in_memory_lookup() {
        let store = InMemoryParameterStore::new().with("/jmc/aad/bypass/secret", "s3cret");
        assert_eq!(
            store.get_parameter("/jmc/aad/bypass/secret").await.unwrap(),
            "s3cret"
        );
        assert!(matches!(
            store.get_parameter("/jmc/other").await,
            Err(ParameterError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_json_file_store_values() {
        let store = JsonFileParameterStore::from_json(
            r#"{
                "/jmc/aad/bypass/secret": "plain",
                "/jmc/aad/key/public": {"PUBLIC_KEY": "pem"}
            }"#,
        )
        .unwrap();

        assert_eq!(store.get_parameter("/jmc/aad/bypass/secret").await.unwrap(), "plain");
        let key: Key = get_json(&store, "/jmc/aad/key/public").await.unwrap();
        assert_eq!(key.public_key, "pem");
    }

    #[tokio::test]
    async fn test_get_json_malformed() {
        let store = InMemoryParameterStore::new().with("/x", "not json");
        let result: Result<Key, _> = get_json(&store, "/x").await;
        assert!(matches!(result, Err(ParameterError::Malformed { .. })));
    }

    #[test]
    fn test_invalid_file() {
        assert!(matches!(
            JsonFileParameterStore::from_json("[1, 2]"),
            Err(ParameterError::InvalidFile(_))
        ));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let result = JsonFileParameterStore::load("/nonexistent/edge-gate/params.json").await;
        assert!(matches!(result, Err(ParameterError::Io(_))));
    }
}
