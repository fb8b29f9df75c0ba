//! Capture settings.
//!
//! Settings come from an optional TOML file and are overridden by CLI flags
//! or their environment variables:
//!
//! ```toml
//! work_dir = "$HOME/capture"
//! diff_tool = "/usr/bin/meld"
//! auto_open_diff_tool = true
//! show_datetime_columns = false
//! stream_url = "ws://localhost:8080/ws"
//! target_user = "alice"
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::session::SessionOptions;

/// Settings file contents. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root directory capture files are written under
    pub work_dir: Option<String>,
    /// External diff tool started on the two capture files
    pub diff_tool: Option<PathBuf>,
    /// Start `diff_tool` after each session
    pub auto_open_diff_tool: bool,
    /// Keep `create_datetime`/`update_datetime`/`delete_datetime` columns
    pub show_datetime_columns: bool,
    /// Change stream endpoint
    pub stream_url: Option<String>,
    /// User the change stream is filtered to
    pub target_user: Option<String>,
}

impl Settings {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))
    }

    /// Applies CLI/environment overrides on top of the file values.
    pub fn merge(mut self, opts: &CaptureOpts) -> Self {
        if let Some(work_dir) = &opts.work_dir {
            self.work_dir = Some(work_dir.clone());
        }
        if let Some(diff_tool) = &opts.diff_tool {
            self.diff_tool = Some(diff_tool.clone());
        }
        if let Some(open) = opts.open_diff_tool {
            self.auto_open_diff_tool = open;
        }
        if let Some(show) = opts.show_datetime_columns {
            self.show_datetime_columns = show;
        }
        if let Some(url) = &opts.stream_url {
            self.stream_url = Some(url.clone());
        }
        if let Some(user) = &opts.target_user {
            self.target_user = Some(user.clone());
        }
        self
    }

    /// Stream endpoint with the target user appended as the last path segment.
    pub fn stream_endpoint(&self) -> Option<String> {
        let url = self.stream_url.as_deref()?;
        Some(match self.target_user.as_deref() {
            Some(user) if !user.is_empty() => {
                format!("{}/{}", url.trim_end_matches('/'), user)
            }
            _ => url.to_string(),
        })
    }

    /// Diff tool to launch, if one is configured and enabled.
    pub fn active_diff_tool(&self) -> Option<&Path> {
        if self.auto_open_diff_tool {
            self.diff_tool.as_deref()
        } else {
            None
        }
    }

    /// Options fixed for the lifetime of one session.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            strip_timestamp_columns: !self.show_datetime_columns,
            target_user: self.target_user.clone(),
        }
    }
}

/// Capture options shared by the CLI subcommands.
#[derive(Parser, Debug, Clone, Default)]
pub struct CaptureOpts {
    /// Settings file (TOML)
    #[arg(long, env = "CAPTURE_DIFF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Root directory capture files are written under
    #[arg(long, env = "CAPTURE_DIFF_WORK_DIR")]
    pub work_dir: Option<String>,

    /// External diff tool started on the two capture files
    #[arg(long, env = "CAPTURE_DIFF_TOOL")]
    pub diff_tool: Option<PathBuf>,

    /// Start the diff tool after the session is stored (`=false` overrides
    /// the settings file)
    #[arg(
        long,
        env = "CAPTURE_DIFF_OPEN_DIFF_TOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub open_diff_tool: Option<bool>,

    /// Keep create/update/delete datetime columns in the output (`=false`
    /// overrides the settings file)
    #[arg(
        long,
        env = "CAPTURE_DIFF_SHOW_DATETIME_COLUMNS",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub show_datetime_columns: Option<bool>,

    /// Change stream endpoint
    #[arg(long, env = "CAPTURE_DIFF_STREAM_URL")]
    pub stream_url: Option<String>,

    /// User the change stream is filtered to
    #[arg(long, env = "CAPTURE_DIFF_TARGET_USER")]
    pub target_user: Option<String>,

    /// Don't write capture files
    #[arg(long)]
    pub dry_run: bool,
}

impl CaptureOpts {
    /// Loads the settings file (if any) and applies the CLI overrides.
    pub fn resolve(&self) -> Result<Settings> {
        let base = match &self.config {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };
        Ok(base.merge(self))
    }
}
