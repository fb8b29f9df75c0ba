//! In-memory sinks for exercising capture sessions without touching disk.

use anyhow::{bail, Result};
use async_trait::async_trait;
use capture_sink::{CaptureSink, StoreOptions, StoreReceipt};
use capture_types::NormalizedRecord;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// One `store_and_diff` call captured by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub started_at: DateTime<Utc>,
    pub oracle: Vec<NormalizedRecord>,
    pub postgres: Vec<NormalizedRecord>,
    pub options: StoreOptions,
}

/// Sink that remembers every call it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CaptureSink for RecordingSink {
    async fn store_and_diff(
        &self,
        started_at: DateTime<Utc>,
        oracle: &[NormalizedRecord],
        postgres: &[NormalizedRecord],
        options: &StoreOptions,
    ) -> Result<StoreReceipt> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                started_at,
                oracle: oracle.to_vec(),
                postgres: postgres.to_vec(),
                options: *options,
            });
        }
        Ok(StoreReceipt::default())
    }
}

/// Sink whose store always fails with the given message.
#[derive(Debug)]
pub struct FailingSink {
    message: String,
}

impl FailingSink {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl CaptureSink for FailingSink {
    async fn store_and_diff(
        &self,
        _started_at: DateTime<Utc>,
        _oracle: &[NormalizedRecord],
        _postgres: &[NormalizedRecord],
        _options: &StoreOptions,
    ) -> Result<StoreReceipt> {
        bail!("{}", self.message)
    }
}
