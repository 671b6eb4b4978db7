//! Deep-copy façade over the stream and serializer pools.
//!
//! A copy is made by encoding the template into a pooled [`StreamPair`] with a
//! pooled serializer and decoding it straight back out. Both resources are
//! returned before the call completes, whether it succeeds or not.
//!
//! [`StreamPair`]: stream_pair::StreamPair

use codec::{JsonSerializerFactory, Serializer, SerializerFactory, SerializerPool};
use object_pool::{PoolStats, ResourcePool, SoftPoolStats};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::IncubatorConfig;
use crate::error::{ConfigError, IncubatorError};
use crate::factory::StreamPairFactory;
use crate::handler::{ExceptionHandler, SharedHandler};
use crate::lifecycle::{Lifecycle, LifecycleState, ShutdownGuard};

/// Produces independent copies of serializable values.
///
/// Shareable across threads; every call works on its own stream pair and
/// serializer. After [`Incubator::shutdown`] every call fails with
/// [`IncubatorError::Closed`].
pub struct Incubator<F: SerializerFactory = JsonSerializerFactory> {
    lifecycle: Lifecycle,
    handler: SharedHandler,
    serializers: SerializerPool<F>,
    streams: ResourcePool<StreamPairFactory>,
}

impl Incubator {
    /// Incubator with default configuration, JSON serialization and the
    /// logging exception handler.
    pub fn new() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    pub fn with_config(config: IncubatorConfig) -> Result<Self, ConfigError> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> IncubatorBuilder {
        IncubatorBuilder::new()
    }
}

impl<F: SerializerFactory> Incubator<F> {
    /// Returns an independent copy of `template`, or `None` when the copy
    /// failed. The failure has already been given to the exception handler.
    pub fn born<T>(&self, template: &T) -> Option<T>
    where
        T: Serialize + DeserializeOwned,
    {
        self.try_born(template).ok()
    }

    /// Like [`Incubator::born`] but also hands the failure to the caller.
    pub fn try_born<T>(&self, template: &T) -> Result<T, IncubatorError>
    where
        T: Serialize + DeserializeOwned,
    {
        let result = self.incubate(template);
        if let Err(err) = &result {
            // Creation failures were reported by the stream factory.
            if !matches!(err, IncubatorError::ResourceCreation(_)) {
                self.handler.report(err);
            }
        }
        result
    }

    fn incubate<T>(&self, template: &T) -> Result<T, IncubatorError>
    where
        T: Serialize + DeserializeOwned,
    {
        if self.lifecycle.load() != LifecycleState::Ready {
            return Err(IncubatorError::Closed);
        }

        let mut serializer = self.serializers.borrow_one()?;
        let mut pair = self.streams.borrow()?;
        let (sink, source) = pair.split_mut();
        // Leftovers of a failed round trip are cleared when the lease returns.
        let copied = serializer
            .encode(template, sink)
            .and_then(|()| serializer.decode(source))?;
        Ok(copied)
    }

    /// Replaces the exception handler. Failures already being reported
    /// finish on the previous handler.
    pub fn set_exception_handler<H: ExceptionHandler>(&self, handler: H) {
        self.handler.replace(Box::new(handler));
    }

    /// Closes both pools. Returns true only for the call that did so.
    pub fn shutdown(&self) -> bool {
        if !self.lifecycle.close() {
            return false;
        }
        let serializers = self.serializers.close();
        let streams = self.streams.close();
        let stats = self.streams.stats();
        tracing::debug!(
            serializers,
            streams,
            outstanding = stats.borrowed,
            "incubator shut down"
        );
        true
    }

    pub fn shutdown_guard(&self) -> ShutdownGuard<'_, F> {
        ShutdownGuard::new(self)
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.load()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == LifecycleState::Closed
    }

    pub fn resource_stats(&self) -> PoolStats {
        self.streams.stats()
    }

    pub fn serializer_stats(&self) -> SoftPoolStats {
        self.serializers.stats()
    }

    pub fn resource_pool(&self) -> &ResourcePool<StreamPairFactory> {
        &self.streams
    }

    pub fn serializer_pool(&self) -> &SerializerPool<F> {
        &self.serializers
    }
}

impl<F: SerializerFactory> Drop for Incubator<F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Assembles an [`Incubator`].
pub struct IncubatorBuilder<F = JsonSerializerFactory> {
    config: IncubatorConfig,
    handler: Option<Box<dyn ExceptionHandler>>,
    serializer_factory: F,
}

impl IncubatorBuilder {
    pub fn new() -> Self {
        Self {
            config: IncubatorConfig::default(),
            handler: None,
            serializer_factory: JsonSerializerFactory::default(),
        }
    }
}

impl Default for IncubatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: SerializerFactory> IncubatorBuilder<F> {
    pub fn config(mut self, config: IncubatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn exception_handler<H: ExceptionHandler>(mut self, handler: H) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Swaps the serialization strategy. Accepts any closure returning a
    /// [`Serializer`].
    pub fn serializer_factory<G: SerializerFactory>(self, factory: G) -> IncubatorBuilder<G> {
        IncubatorBuilder {
            config: self.config,
            handler: self.handler,
            serializer_factory: factory,
        }
    }

    pub fn build(self) -> Result<Incubator<F>, ConfigError> {
        self.config.validate()?;
        let handler = match self.handler {
            Some(handler) => SharedHandler::new(handler),
            None => SharedHandler::default(),
        };

        let lifecycle = Lifecycle::new();
        let factory = StreamPairFactory::new(self.config.stream.capacity_bytes, handler.clone());
        let streams = ResourcePool::new(factory, self.config.resource_pool.clone())?;
        let serializers = SerializerPool::new(self.serializer_factory, &self.config.serializer_pool);

        let warm = self.config.resource_pool.min_idle;
        if warm > 0 {
            if let Err(err) = streams.prepare(warm) {
                tracing::warn!("could not pre-create {warm} stream pairs: {err}");
            }
        }

        lifecycle.mark_ready();
        tracing::debug!(
            max_total = self.config.resource_pool.max_total,
            stream_capacity = self.config.stream.capacity_bytes,
            "incubator ready"
        );

        Ok(Incubator {
            lifecycle,
            handler,
            serializers,
            streams,
        })
    }
}
