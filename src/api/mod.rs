//! API Module
//!
//! HTTP handlers and routing for the cache host.
//!
//! # Endpoints
//! - `PUT /set` - Store a value with a priority tier
//! - `GET /get/:key` - Retrieve a value by key
//! - `DELETE /del/:key` - Delete a key
//! - `POST /clear` - Clear the cache
//! - `GET /stats` - Get cache metrics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
