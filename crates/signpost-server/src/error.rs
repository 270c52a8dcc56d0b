use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: expected `name = value`, found '{content}'")]
    Malformed { line: usize, content: String },
    #[error("missing required value: {0}")]
    Missing(&'static str),
    #[error("invalid value: {field} = {value} ({reason})")]
    Invalid {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("app.thread.count = {count} exceeds the worker limit of {limit}")]
    TooManyWorkers { count: usize, limit: usize },
    #[error("invalid config: {}", join_errors(.0))]
    Rejected(Vec<ConfigError>),
}

impl ConfigError {
    /// Every individual problem carried by this error.
    pub fn problems(&self) -> Vec<&ConfigError> {
        match self {
            ConfigError::Rejected(errors) => errors.iter().collect(),
            other => vec![other],
        }
    }
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised by the worker pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("listener error: {0}")]
    Bind(#[from] std::io::Error),
    #[error("worker pool needs at least one connection handle")]
    NoWorkers,
    #[error("worker {0} panicked")]
    WorkerPanicked(usize),
}

/// Errors raised while installing the tracing subscriber.
#[derive(Debug, Error)]
#[error("failed to install tracing subscriber: {0}")]
pub struct TelemetryError(pub String);
