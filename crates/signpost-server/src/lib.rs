//! The Signpost redirect service: configuration, the HTTP front end and the
//! worker pool that drives cache-aside lookups.

pub mod config;
pub mod error;
pub mod http;
pub mod pool;
pub mod telemetry;

pub use config::Config;
pub use error::{ConfigError, PoolError, TelemetryError};
pub use pool::WorkerPool;
