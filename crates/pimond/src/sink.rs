//! Metric sinks.
//!
//! The poll loop hands every reading to a [`MetricSink`] as
//! `(namespace, metric, value)`. Absent values are pushed too.

use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

use crate::error::SinkError;

/// A reading as it leaves the agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Text(String),
    Number(f64),
    Absent,
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{}", n),
            Self::Absent => f.write_str("None"),
        }
    }
}

impl From<Option<String>> for MetricValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Absent, Self::Text)
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Metric name for a display label: lower-cased, spaces become underscores.
pub fn metric_name(label: &str) -> String {
    label.to_lowercase().replace(' ', "_")
}

pub trait MetricSink: Send + Sync {
    fn push(&self, namespace: &str, metric: &str, value: &MetricValue) -> Result<(), SinkError>;
}

/// Emits each metric as a tracing event under the `metrics` target.
#[derive(Debug, Default)]
pub struct LogSink;

impl MetricSink for LogSink {
    fn push(&self, namespace: &str, metric: &str, value: &MetricValue) -> Result<(), SinkError> {
        info!(target: "metrics", namespace, metric, %value);
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    timestamp: String,
    namespace: &'a str,
    metric: &'a str,
    value: &'a MetricValue,
}

/// Appends one JSON object per metric to a file.
pub struct JsonLinesSink {
    file: Mutex<File>,
}

impl JsonLinesSink {
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl MetricSink for JsonLinesSink {
    fn push(&self, namespace: &str, metric: &str, value: &MetricValue) -> Result<(), SinkError> {
        let line = JsonLine {
            timestamp: Utc::now().to_rfc3339(),
            namespace,
            metric,
            value,
        };
        let mut json = serde_json::to_string(&line)?;
        json.push('\n');

        // A poisoned lock only means another push panicked mid-write.
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
