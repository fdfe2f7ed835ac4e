//! API Module
//!
//! HTTP handlers and routing for the diagnostic REST API.
//!
//! # Endpoints
//! - `POST /obtain` - Serve or fetch an artifact
//! - `GET /entries/:id` - Look up a live entry
//! - `DELETE /entries/:id` - Remove an entry
//! - `POST /evict` - Run an eviction pass
//! - `POST /clear` - Wipe the cache
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
