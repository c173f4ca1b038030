//! The JSON document consumed by the dashboard front end, and its writer.

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub title: String,
    pub source: String,
    pub last_updated: String,
    pub source_file: String,
}

/// `{ metadata, kpi, <data sections...> }`, serialized in that order.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardDocument {
    pub metadata: Metadata,
    pub kpi: Map<String, Value>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl DashboardDocument {
    pub fn new(metadata: Metadata, kpi: Map<String, Value>) -> Self {
        Self {
            metadata,
            kpi,
            data: Map::new(),
        }
    }

    /// Adds a named data section. Reserved names are ignored.
    pub fn section(mut self, name: &str, value: impl Into<Value>) -> Self {
        if name != "metadata" && name != "kpi" {
            self.data.insert(name.to_string(), value.into());
        }
        self
    }
}

/// Creates parent directories, then replaces `path` with the pretty-printed document.
///
/// The write is not atomic: an interrupted run can leave a truncated file.
pub fn write_document(path: &Path, document: &DashboardDocument) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory structure for: {}", path.display()))?;
    }
    let mut json = serde_json::to_string_pretty(document)
        .with_context(|| format!("Failed to serialize document for: {}", path.display()))?;
    json.push('\n');
    fs::write(path, json)
        .with_context(|| format!("Failed to write output file: {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn metadata() -> Metadata {
        Metadata {
            title: "Concesiones".into(),
            source: "SERFOR".into(),
            last_updated: "2024-05-01".into(),
            source_file: "concesiones.csv".into(),
        }
    }

    #[test]
    fn top_level_keys_come_in_fixed_order() {
        let mut kpi = Map::new();
        kpi.insert("total".into(), json!(2));
        let doc = DashboardDocument::new(metadata(), kpi)
            .section("byRegion", json!([]))
            .section("kpi", json!("ignored"));
        let value = serde_json::to_value(&doc).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["metadata", "kpi", "byRegion"]);
        assert_eq!(value["metadata"]["lastUpdated"], "2024-05-01");
        assert_eq!(value["kpi"]["total"], 2);
    }

    #[test]
    fn writer_creates_directories_and_replaces_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("datos-espaciales").join("concesiones.json");
        let first = DashboardDocument::new(metadata(), Map::new()).section("rows", json!([1, 2, 3]));
        write_document(&path, &first).unwrap();
        let second = DashboardDocument::new(metadata(), Map::new()).section("rows", json!([]));
        write_document(&path, &second).unwrap();

        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["rows"], json!([]));
    }

    #[test]
    fn write_failure_is_reported() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "x").unwrap();
        let doc = DashboardDocument::new(metadata(), Map::new());
        let err = write_document(&blocker.join("out.json"), &doc).unwrap_err();
        assert!(err.to_string().contains("Failed to create directory structure"));
    }
}
