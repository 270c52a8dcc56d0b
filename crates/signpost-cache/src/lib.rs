//! Redis cache store for Signpost.

pub mod redis;

pub use redis::RedisCacheStore;
