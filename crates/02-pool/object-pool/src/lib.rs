//! Object pools shared by the incubation layers.
//!
//! * [`ResourcePool`] – bounded pool with blocking borrow, validation, idle eviction.
//! * [`SoftPool`] – non-blocking pool of instances that may be reclaimed and recreated.
//! * [`Lease`] / [`SoftLease`] – guards returning the object to its pool on drop.

mod config;
mod error;
mod evictor;
mod factory;
mod pool;
mod soft;
mod stats;

pub use config::PoolConfig;
pub use error::{InvalidConfig, PoolError, PoolResult};
pub use factory::PooledObjectFactory;
pub use pool::{Lease, ResourcePool};
pub use soft::{SoftLease, SoftPool, SoftPoolStats};
pub use stats::PoolStats;
