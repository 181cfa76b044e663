//! Error types for pimond boundaries.
//!
//! Each boundary (command invocation, modem query, power read, metric push)
//! returns its own error so callers and tests can tell failure categories
//! apart. None of them escape the poll loop: they end up as a log line plus
//! an absent value or a sentinel.

use pimon_common::ParseError;
use std::time::Duration;
use thiserror::Error;

use crate::power::PowerField;

#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("no command configured")]
    EmptyCommand,
}

#[derive(Error, Debug)]
pub enum ModemError {
    #[error("invocation failed: {0}")]
    Invoke(#[from] InvokeError),

    #[error("unparseable output: {0}")]
    Parse(#[from] ParseError),
}

#[derive(Error, Debug)]
pub enum PowerError {
    #[error("no source configured for {0}")]
    NotMapped(PowerField),

    #[error("reading {field} from {path}: {source}")]
    Io {
        field: PowerField,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{field}: unreadable value {raw:?}")]
    InvalidReading { field: PowerField, raw: String },

    #[error("{0}: empty reading")]
    Empty(PowerField),

    #[error("{0}")]
    Device(String),
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
