//! File-API driver.
//!
//! The richest communication mode: a codemodel query is placed under
//! `.cmake/api/v1/query` before configuring, and the reply index written by
//! the tool is read back afterwards to discover build targets. Query and
//! reply handling are best-effort; a configure result never depends on
//! them.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{bail, Context, Result};
use serde_json::Value;

use crate::diag::{BuildOutputConsumer, ConfigureOutputConsumer};
use crate::driver::invoker::CMakeInvoker;
use crate::driver::{
    BuildTarget, CommunicationMode, ConfigureRequest, Driver, ProgressEvent,
};
use crate::util::fs::{read_to_string, write_string};

const QUERY_DIR: &str = ".cmake/api/v1/query/client-coxswain";
const REPLY_DIR: &str = ".cmake/api/v1/reply";

/// Driver speaking the file-based API.
pub struct FileApiDriver {
    invoker: CMakeInvoker,
    build_args: Vec<String>,
    targets: Mutex<Vec<BuildTarget>>,
}

impl FileApiDriver {
    pub fn new(
        cmake: PathBuf,
        source_dir: PathBuf,
        binary_dir: PathBuf,
        build_args: Vec<String>,
    ) -> Self {
        FileApiDriver {
            invoker: CMakeInvoker::new(cmake, source_dir, binary_dir),
            build_args,
            targets: Mutex::new(Vec::new()),
        }
    }

    fn write_query(&self) -> Result<()> {
        let query = serde_json::json!({
            "requests": [{ "kind": "codemodel", "version": 2 }]
        });
        let path = self.invoker.binary_dir().join(QUERY_DIR).join("query.json");
        write_string(&path, &query.to_string())
    }

    fn load_reply(&self) -> Result<Vec<BuildTarget>> {
        let reply_dir = self.invoker.binary_dir().join(REPLY_DIR);
        let index_path = latest_index_file(&reply_dir)?;
        let index: Value = serde_json::from_str(&read_to_string(&index_path)?)
            .with_context(|| format!("failed to parse {}", index_path.display()))?;

        let responses = index["reply"]["client-coxswain"]["query.json"]["responses"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        let codemodel_file = responses
            .iter()
            .find(|r| r["kind"].as_str() == Some("codemodel"))
            .and_then(|r| r["jsonFile"].as_str().map(String::from));

        let Some(codemodel_file) = codemodel_file else {
            bail!("reply index has no codemodel response");
        };

        let codemodel_path = reply_dir.join(codemodel_file);
        let codemodel: Value = serde_json::from_str(&read_to_string(&codemodel_path)?)
            .with_context(|| format!("failed to parse {}", codemodel_path.display()))?;

        let mut targets = Vec::new();
        let configurations = codemodel["configurations"].as_array().cloned().unwrap_or_default();
        if let Some(configuration) = configurations.first() {
            for entry in configuration["targets"].as_array().cloned().unwrap_or_default() {
                let Some(name) = entry["name"].as_str() else {
                    continue;
                };
                // The target kind lives in the per-target reply file.
                let kind = entry["jsonFile"]
                    .as_str()
                    .and_then(|file| read_to_string(&reply_dir.join(file)).ok())
                    .and_then(|text| serde_json::from_str::<Value>(&text).ok())
                    .and_then(|target| target["type"].as_str().map(String::from))
                    .unwrap_or_else(|| "UNKNOWN".to_string());

                targets.push(BuildTarget {
                    name: name.to_string(),
                    kind,
                });
            }
        }

        Ok(targets)
    }
}

/// Pick the newest `index-*.json` in the reply directory. Index filenames
/// embed a timestamp and sort lexicographically.
fn latest_index_file(reply_dir: &Path) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(reply_dir)
        .with_context(|| format!("failed to read reply directory: {}", reply_dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("index-") && n.ends_with(".json"))
                .unwrap_or(false)
        })
        .collect();

    candidates.sort();
    candidates
        .pop()
        .with_context(|| format!("no reply index found in {}", reply_dir.display()))
}

impl Driver for FileApiDriver {
    fn communication_mode(&self) -> CommunicationMode {
        CommunicationMode::FileApi
    }

    fn source_dir(&self) -> &Path {
        self.invoker.source_dir()
    }

    fn binary_dir(&self) -> &Path {
        self.invoker.binary_dir()
    }

    fn configure(
        &self,
        request: &ConfigureRequest,
        consumer: &mut ConfigureOutputConsumer,
        progress: &dyn Fn(ProgressEvent),
    ) -> Result<i32> {
        if let Err(e) = self.write_query() {
            tracing::warn!("failed to write file-api query: {}", e);
        }

        let code = self.invoker.run_configure(request, consumer, progress)?;

        if code == 0 {
            match self.load_reply() {
                Ok(targets) => {
                    *self
                        .targets
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner) = targets;
                }
                Err(e) => tracing::warn!("failed to read file-api reply: {}", e),
            }
        }
        Ok(code)
    }

    fn configure_command(&self, request: &ConfigureRequest) -> String {
        self.invoker.configure_command(request)
    }

    fn build(&self, targets: &[String], consumer: &mut BuildOutputConsumer) -> Result<i32> {
        self.invoker.run_build(targets, &self.build_args, consumer)
    }

    fn stop(&self) {
        self.invoker.stop();
    }

    fn targets(&self) -> Vec<BuildTarget> {
        self.targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn shutdown(&self) -> Result<()> {
        self.invoker.stop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn driver(binary_dir: &Path) -> FileApiDriver {
        FileApiDriver::new(
            PathBuf::from("cmake"),
            PathBuf::from("/proj"),
            binary_dir.to_path_buf(),
            Vec::new(),
        )
    }

    #[test]
    fn test_query_file_layout() {
        let tmp = TempDir::new().unwrap();
        let driver = driver(tmp.path());

        driver.write_query().unwrap();

        let query_path = tmp.path().join(QUERY_DIR).join("query.json");
        let contents = std::fs::read_to_string(query_path).unwrap();
        let value: Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["requests"][0]["kind"], "codemodel");
    }

    #[test]
    fn test_load_reply_reads_codemodel_targets() {
        let tmp = TempDir::new().unwrap();
        let reply_dir = tmp.path().join(REPLY_DIR);
        std::fs::create_dir_all(&reply_dir).unwrap();

        std::fs::write(
            reply_dir.join("index-2026-08-06T10-00-00-0000.json"),
            serde_json::json!({
                "reply": { "client-coxswain": { "query.json": { "responses": [
                    { "kind": "codemodel", "jsonFile": "codemodel-v2-abc.json" }
                ]}}}
            })
            .to_string(),
        )
        .unwrap();

        std::fs::write(
            reply_dir.join("codemodel-v2-abc.json"),
            serde_json::json!({
                "configurations": [{ "targets": [
                    { "name": "app", "jsonFile": "target-app.json" },
                    { "name": "unit_tests", "jsonFile": "target-missing.json" }
                ]}]
            })
            .to_string(),
        )
        .unwrap();

        std::fs::write(
            reply_dir.join("target-app.json"),
            serde_json::json!({ "name": "app", "type": "EXECUTABLE" }).to_string(),
        )
        .unwrap();

        let targets = driver(tmp.path()).load_reply().unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].name, "app");
        assert_eq!(targets[0].kind, "EXECUTABLE");
        // Missing per-target file degrades to an unknown kind.
        assert_eq!(targets[1].kind, "UNKNOWN");
    }

    #[test]
    fn test_load_reply_without_index_fails() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join(REPLY_DIR)).unwrap();

        assert!(driver(tmp.path()).load_reply().is_err());
    }
}
