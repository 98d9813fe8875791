//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside a cache.
//!
//! # Tasks
//! - Expiry sweep: removes entries whose priority-tier TTL has elapsed

mod sweeper;

pub(crate) use sweeper::spawn_sweeper;
pub use sweeper::SweeperHandle;
