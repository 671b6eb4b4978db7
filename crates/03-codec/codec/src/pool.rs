use std::convert::Infallible;

use object_pool::{PoolResult, SoftLease, SoftPool, SoftPoolStats};
use serde::{Deserialize, Serialize};

use crate::serializer::SerializerFactory;

/// Exclusive use of a pooled serializer.
pub type SerializerLease<S> = SoftLease<S>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerPoolConfig {
    /// Idle instances kept for reuse; extra returns are dropped.
    pub soft_limit: usize,
}

impl Default for SerializerPoolConfig {
    fn default() -> Self {
        Self { soft_limit: 16 }
    }
}

/// Pool of serializer instances created on demand by a [`SerializerFactory`].
///
/// Borrowing never blocks. Two concurrent callers never share an instance.
pub struct SerializerPool<F: SerializerFactory> {
    pool: SoftPool<F::Serializer>,
}

impl<F: SerializerFactory> SerializerPool<F> {
    pub fn new(factory: F, config: &SerializerPoolConfig) -> Self {
        Self {
            pool: SoftPool::new(config.soft_limit, move || factory.create()),
        }
    }

    pub fn borrow_one(&self) -> PoolResult<SerializerLease<F::Serializer>, Infallible> {
        self.pool.borrow_one()
    }

    /// Releases idle instances; they are recreated when next needed.
    pub fn reclaim_idle(&self) -> usize {
        self.pool.reclaim_idle()
    }

    /// Drains and discards all instances. Returns true for the closing call.
    pub fn close(&self) -> bool {
        self.pool.close()
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    pub fn stats(&self) -> SoftPoolStats {
        self.pool.stats()
    }
}
