//! Audio Cache - A local artifact cache for streamed audio
//!
//! Stores remote audio artifacts on disk (or in memory) with TTL expiry,
//! size-bounded eviction and a pass-through mode when storage is unavailable.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use fetch::{CacheMode, FetchCoordinator, Obtained};
pub use tasks::spawn_maintenance_task;
