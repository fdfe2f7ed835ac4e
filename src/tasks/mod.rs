//! Background Tasks Module
//!
//! Contains background tasks that run periodically while the cache is in use.
//!
//! # Tasks
//! - Maintenance: runs TTL expiry and size eviction at a configured interval

mod maintenance;

pub use maintenance::spawn_maintenance_task;
