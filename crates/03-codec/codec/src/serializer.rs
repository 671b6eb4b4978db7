use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CodecResult;

/// Stateful encoder/decoder used for one round trip at a time.
///
/// Implementations may keep scratch state between calls and are not expected
/// to be shared between threads; pools hand each caller its own instance.
pub trait Serializer: Send + 'static {
    /// Writes `value` into `sink` as one self-delimiting unit.
    fn encode<T>(&mut self, value: &T, sink: &mut dyn Write) -> CodecResult<()>
    where
        T: Serialize + ?Sized;

    /// Reads exactly one unit written by [`Serializer::encode`] from `source`.
    fn decode<T>(&mut self, source: &mut dyn Read) -> CodecResult<T>
    where
        T: DeserializeOwned;
}

/// Manufactures serializer instances on demand.
pub trait SerializerFactory: Send + Sync + 'static {
    type Serializer: Serializer;

    fn create(&self) -> Self::Serializer;
}

impl<S, F> SerializerFactory for F
where
    S: Serializer,
    F: Fn() -> S + Send + Sync + 'static,
{
    type Serializer = S;

    fn create(&self) -> S {
        self()
    }
}
