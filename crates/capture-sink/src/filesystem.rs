//! Filesystem-based capture storage.

use anyhow::{Context, Result};
use async_trait::async_trait;
use capture_types::NormalizedRecord;
use chrono::{DateTime, Local, Utc};
use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use crate::traits::{CaptureSink, StoreOptions, StoreReceipt};

/// Filesystem implementation of the CaptureSink trait.
///
/// Writes each side as a pretty-printed JSON array:
///
/// ```text
/// <work_dir>/data/Oracle/oracle_capture_data_<YYYYMMDD_HHMMSS>.json
/// <work_dir>/data/PostgreSQL/postgre_capture_data_<YYYYMMDD_HHMMSS>.json
/// ```
///
/// and optionally opens both files in an external diff tool.
#[derive(Debug, Clone)]
pub struct FilesystemSink {
    work_dir: PathBuf,
    diff_tool: Option<PathBuf>,
}

impl FilesystemSink {
    /// Create a sink rooted at `work_dir`. `$VAR` and `${VAR}` references in
    /// the path are expanded from the environment.
    pub fn new(work_dir: impl AsRef<str>) -> Self {
        Self {
            work_dir: PathBuf::from(expand_env_vars(work_dir.as_ref())),
            diff_tool: None,
        }
    }

    /// Launch `diff_tool <oracle file> <postgres file>` after storing.
    pub fn with_diff_tool(mut self, diff_tool: impl Into<PathBuf>) -> Self {
        self.diff_tool = Some(diff_tool.into());
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Paths the two capture files for a session starting at `started_at`
    /// are written to, oracle first.
    pub fn session_paths(&self, started_at: DateTime<Utc>) -> (PathBuf, PathBuf) {
        let stem = session_file_stem(started_at);
        let data_dir = self.work_dir.join("data");
        (
            data_dir
                .join("Oracle")
                .join(format!("oracle_capture_data_{stem}.json")),
            data_dir
                .join("PostgreSQL")
                .join(format!("postgre_capture_data_{stem}.json")),
        )
    }

    fn launch_diff_tool(&self, tool: &Path, left: &Path, right: &Path) -> bool {
        match Command::new(tool).arg(left).arg(right).spawn() {
            Ok(_) => {
                tracing::info!("Launched diff tool {}", tool.display());
                true
            }
            Err(e) => {
                tracing::warn!("Failed to launch diff tool {}: {e}", tool.display());
                false
            }
        }
    }
}

#[async_trait]
impl CaptureSink for FilesystemSink {
    async fn store_and_diff(
        &self,
        started_at: DateTime<Utc>,
        oracle: &[NormalizedRecord],
        postgres: &[NormalizedRecord],
        options: &StoreOptions,
    ) -> Result<StoreReceipt> {
        let (oracle_path, postgres_path) = self.session_paths(started_at);

        write_records(&oracle_path, oracle, options)?;
        write_records(&postgres_path, postgres, options)?;
        tracing::info!(
            "Stored {} oracle records to {} and {} postgres records to {}",
            oracle.len(),
            oracle_path.display(),
            postgres.len(),
            postgres_path.display()
        );

        let diff_tool_launched = match &self.diff_tool {
            Some(tool) => self.launch_diff_tool(tool, &oracle_path, &postgres_path),
            None => false,
        };

        Ok(StoreReceipt {
            artifacts: vec![oracle_path, postgres_path],
            diff_tool_launched,
        })
    }
}

fn write_records(path: &Path, records: &[NormalizedRecord], options: &StoreOptions) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let stored: Vec<_> = records
        .iter()
        .map(|r| r.stored_form(options.timestamp_columns_stripped))
        .collect();

    std::fs::write(path, serde_json::to_string_pretty(&stored)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// `YYYYMMDD_HHMMSS` in local time.
pub fn session_file_stem(started_at: DateTime<Utc>) -> String {
    started_at
        .with_timezone(&Local)
        .format("%Y%m%d_%H%M%S")
        .to_string()
}

fn env_var_re() -> &'static Regex {
    static ENV_VAR_RE: OnceLock<Regex> = OnceLock::new();
    ENV_VAR_RE.get_or_init(|| {
        Regex::new(r"\$(?:\{([A-Za-z0-9_]+)\}|([A-Za-z0-9_]+))").expect("valid env var regex")
    })
}

/// Expands `$VAR` and `${VAR}` from the environment. Unset variables are
/// left as written.
pub fn expand_env_vars(input: &str) -> String {
    env_var_re()
        .replace_all(input, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map_or("", |m| m.as_str());
            std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture_types::{decode_frame, normalize};
    use serde_json::Value;
    use tempfile::TempDir;

    fn record(frame: &str) -> NormalizedRecord {
        normalize(&decode_frame(frame).unwrap(), false)
    }

    #[tokio::test]
    async fn test_store_writes_both_sides() {
        let dir = TempDir::new().unwrap();
        let sink = FilesystemSink::new(dir.path().to_str().unwrap());
        let started_at = Utc::now();

        let oracle = vec![record(
            r#"{"after": {"Id": "5", "Name": "Ünïcode"}, "source": {"name": "oracle", "table": "ORD"}, "ts_ms": 1000}"#,
        )];
        let postgres: Vec<NormalizedRecord> = vec![];

        let receipt = sink
            .store_and_diff(started_at, &oracle, &postgres, &StoreOptions::default())
            .await
            .unwrap();

        let (oracle_path, postgres_path) = sink.session_paths(started_at);
        assert_eq!(receipt.artifacts, vec![oracle_path.clone(), postgres_path.clone()]);
        assert!(!receipt.diff_tool_launched);

        let stem = session_file_stem(started_at);
        assert!(oracle_path.ends_with(format!("data/Oracle/oracle_capture_data_{stem}.json")));
        assert!(postgres_path.ends_with(format!("data/PostgreSQL/postgre_capture_data_{stem}.json")));

        let oracle_json = std::fs::read_to_string(&oracle_path).unwrap();
        assert!(oracle_json.starts_with("[\n  {\n    \"table\": \"ord\",\n    \"create_datetime\": "));
        assert!(oracle_json.contains("Ünïcode"));
        let parsed: Vec<NormalizedRecord> = serde_json::from_str(&oracle_json).unwrap();
        assert_eq!(parsed, oracle);

        assert_eq!(std::fs::read_to_string(&postgres_path).unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_store_omits_event_time_when_stripped() {
        let dir = TempDir::new().unwrap();
        let sink = FilesystemSink::new(dir.path().to_str().unwrap());
        let started_at = Utc::now();
        let oracle = vec![record(
            r#"{"after": {"Id": "5"}, "source": {"name": "oracle", "table": "ORD"}, "ts_ms": 1000}"#,
        )];

        sink.store_and_diff(
            started_at,
            &oracle,
            &[],
            &StoreOptions {
                timestamp_columns_stripped: true,
            },
        )
        .await
        .unwrap();

        let (oracle_path, _) = sink.session_paths(started_at);
        let values: Vec<Value> =
            serde_json::from_str(&std::fs::read_to_string(oracle_path).unwrap()).unwrap();
        assert!(values[0].get("create_datetime").is_none());
        assert_eq!(values[0]["after"]["id"], 5);
    }

    #[tokio::test]
    async fn test_missing_diff_tool_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let sink = FilesystemSink::new(dir.path().to_str().unwrap())
            .with_diff_tool(dir.path().join("no-such-diff-tool"));

        let receipt = sink
            .store_and_diff(Utc::now(), &[], &[], &StoreOptions::default())
            .await
            .unwrap();
        assert!(!receipt.diff_tool_launched);
        assert_eq!(receipt.artifacts.len(), 2);
    }

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("CAPTURE_SINK_TEST_DIR", "/tmp/capture");
        assert_eq!(
            expand_env_vars("$CAPTURE_SINK_TEST_DIR/work"),
            "/tmp/capture/work"
        );
        assert_eq!(
            expand_env_vars("${CAPTURE_SINK_TEST_DIR}_x"),
            "/tmp/capture_x"
        );
        assert_eq!(
            expand_env_vars("$CAPTURE_SINK_UNSET_VAR/work"),
            "$CAPTURE_SINK_UNSET_VAR/work"
        );
        assert_eq!(
            expand_env_vars("$CAPTURE_SINK_TEST_DIR$CAPTURE_SINK_UNSET_VAR"),
            "/tmp/capture$CAPTURE_SINK_UNSET_VAR"
        );
        assert_eq!(expand_env_vars("${unterminated"), "${unterminated");
        assert_eq!(expand_env_vars("${}"), "${}");
        assert_eq!(expand_env_vars("cost $5"), "cost $5");
        assert_eq!(expand_env_vars("plain"), "plain");
    }
}
