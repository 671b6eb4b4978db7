//! Deep copies of serializable values through pooled in-memory streams.
//!
//! [`Incubator::born`] serializes a template into a pooled
//! [`StreamPair`](stream_pair::StreamPair) and deserializes an independent copy
//! back out. Failures never escape `born`; they are routed to a replaceable
//! [`ExceptionHandler`] and the call yields `None`.
//!
//! ```
//! use incubator::Incubator;
//!
//! let incubator = Incubator::new().unwrap();
//! let template = vec![vec![1, 2], vec![3]];
//! let mut copy = incubator.born(&template).unwrap();
//! copy[0].push(9);
//! assert_eq!(template, vec![vec![1, 2], vec![3]]);
//! incubator.shutdown();
//! ```

mod config;
mod error;
mod factory;
mod handler;
mod incubator;
mod lifecycle;

pub use config::{IncubatorConfig, StreamConfig};
pub use error::{ConfigError, ErrorKind, IncubatorError};
pub use factory::StreamPairFactory;
pub use handler::{CountingExceptionHandler, ExceptionHandler, LoggingExceptionHandler};
pub use incubator::{Incubator, IncubatorBuilder};
pub use lifecycle::{LifecycleState, ShutdownGuard};

pub use codec::{
    CodecError, JsonSerializer, JsonSerializerFactory, Serializer, SerializerFactory,
    SerializerPoolConfig,
};
pub use object_pool::{PoolConfig, PoolStats, SoftPoolStats};
