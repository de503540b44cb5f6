//! # Ratewise Infrastructure
//!
//! Concrete implementations of the counter store port defined in
//! `ratewise-core`.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external dependencies, in-memory counting only
//! - `redis` - Redis counter store for limits shared across instances

pub mod counter_store;

// Re-exports - In-Memory
pub use counter_store::InMemoryCounterStore;

// Re-exports - Redis
#[cfg(feature = "redis")]
pub use counter_store::{RedisConfig, RedisCounterStore};
