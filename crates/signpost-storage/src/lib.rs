//! MySQL durable store for Signpost.

pub mod mysql;

pub use mysql::{MySqlConnector, MySqlSession, LOOKUP_QUERY};
