//! Dataset catalog loaded from `datasets.json` at startup.
//!
//! The catalog is produced by the data pipeline alongside the store and is
//! read-only for the lifetime of the process. Per-dataset metadata snapshots
//! (`<id>.json`) are optional and merged into the metadata response when
//! present.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use crate::error::{AppError, AppResult};

pub struct Catalog {
    document: Value,
    snapshots: HashMap<String, Value>,
}

impl Catalog {
    /// Load `datasets.json` plus any per-dataset snapshot files next to it.
    /// A missing or unparseable catalog is fatal at startup.
    pub fn load(processed_dir: impl AsRef<Path>) -> AppResult<Self> {
        let dir = processed_dir.as_ref();
        let catalog_path = dir.join("datasets.json");

        let raw = std::fs::read_to_string(&catalog_path).map_err(|e| {
            AppError::Internal(format!(
                "failed to read dataset catalog {}: {}",
                catalog_path.display(),
                e
            ))
        })?;
        let document: Value = serde_json::from_str(&raw).map_err(|e| {
            AppError::Internal(format!("invalid dataset catalog: {}", e))
        })?;

        let mut snapshots = HashMap::new();
        for id in Self::ids_of(&document) {
            let snapshot_path = dir.join(format!("{}.json", id));
            if let Ok(raw) = std::fs::read_to_string(&snapshot_path) {
                match serde_json::from_str::<Value>(&raw) {
                    Ok(snapshot) => {
                        snapshots.insert(id, snapshot);
                    }
                    Err(e) => {
                        tracing::warn!(
                            "ignoring invalid snapshot {}: {}",
                            snapshot_path.display(),
                            e
                        );
                    }
                }
            }
        }

        Ok(Self {
            document,
            snapshots,
        })
    }

    fn ids_of(document: &Value) -> Vec<String> {
        document
            .get("datasets")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|d| d.get("id").and_then(Value::as_str))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The full catalog document, returned verbatim by the list endpoint.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Catalog entry for one dataset id.
    pub fn dataset(&self, id: &str) -> Option<&Value> {
        self.document
            .get("datasets")
            .and_then(Value::as_array)?
            .iter()
            .find(|d| d.get("id").and_then(Value::as_str) == Some(id))
    }

    /// Optional per-dataset metadata snapshot.
    pub fn snapshot(&self, id: &str) -> Option<&Value> {
        self.snapshots.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.dataset(id).is_some()
    }
}
