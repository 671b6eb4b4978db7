//! Serializer capability and its instance pool.
//!
//! The incubation layer treats encoding as opaque: anything implementing
//! [`Serializer`] can back it. [`JsonSerializer`] is the stock implementation.

mod error;
mod json;
mod pool;
mod serializer;

pub use error::{CodecError, CodecResult};
pub use json::{JsonSerializer, JsonSerializerFactory, DEFAULT_MAX_FRAME_LEN};
pub use pool::{SerializerLease, SerializerPool, SerializerPoolConfig};
pub use serializer::{Serializer, SerializerFactory};
