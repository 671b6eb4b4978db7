/// Lifecycle hooks a [`ResourcePool`](crate::ResourcePool) uses to manage its objects.
///
/// Only `create` is mandatory. The pool calls the hooks outside of its
/// internal lock, so implementations may take their time.
pub trait PooledObjectFactory: Send + Sync + 'static {
    /// Object type handed out by the pool.
    type Object: Send + 'static;
    /// Failure produced by [`PooledObjectFactory::create`].
    type Error: std::error::Error + Send + Sync + 'static;

    /// Manufactures a fresh object.
    fn create(&self) -> Result<Self::Object, Self::Error>;

    /// Returns false when the object must not be handed out again.
    fn validate(&self, _object: &Self::Object) -> bool {
        true
    }

    /// Restores a returned object to its idle state. An error destroys it.
    fn passivate(&self, _object: &mut Self::Object) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Releases an object leaving the pool. Must not panic.
    fn destroy(&self, object: Self::Object) {
        drop(object);
    }
}
