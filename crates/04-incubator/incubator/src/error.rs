use std::convert::Infallible;
use std::time::Duration;

use codec::CodecError;
use object_pool::{InvalidConfig, PoolError};
use stream_pair::TransportError;
use thiserror::Error;

/// Failures observed while incubating a copy.
///
/// Every variant is delivered to the installed exception handler; `born`
/// turns them into `None`, `try_born` also hands them to the caller.
#[derive(Debug, Error)]
pub enum IncubatorError {
    #[error("failed to create stream pair: {0}")]
    ResourceCreation(#[source] TransportError),

    #[error("no stream pair available after {waited:?}")]
    PoolExhausted { waited: Duration },

    #[error("codec failure: {0}")]
    Codec(#[from] CodecError),

    #[error("incubator is closed")]
    Closed,

    /// A stream pair could not be closed while being destroyed.
    #[error("failed to release stream pair: {0}")]
    ResourceRelease(#[source] TransportError),
}

/// Discriminant of [`IncubatorError`], handy for counting and filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ResourceCreation,
    PoolExhausted,
    Codec,
    Closed,
    ResourceRelease,
}

impl ErrorKind {
    pub const COUNT: usize = 5;

    pub const ALL: [ErrorKind; Self::COUNT] = [
        ErrorKind::ResourceCreation,
        ErrorKind::PoolExhausted,
        ErrorKind::Codec,
        ErrorKind::Closed,
        ErrorKind::ResourceRelease,
    ];

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl IncubatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IncubatorError::ResourceCreation(_) => ErrorKind::ResourceCreation,
            IncubatorError::PoolExhausted { .. } => ErrorKind::PoolExhausted,
            IncubatorError::Codec(_) => ErrorKind::Codec,
            IncubatorError::Closed => ErrorKind::Closed,
            IncubatorError::ResourceRelease(_) => ErrorKind::ResourceRelease,
        }
    }
}

impl From<PoolError<TransportError>> for IncubatorError {
    fn from(err: PoolError<TransportError>) -> Self {
        match err {
            PoolError::Exhausted { waited } => IncubatorError::PoolExhausted { waited },
            PoolError::Closed => IncubatorError::Closed,
            PoolError::Create(err) => IncubatorError::ResourceCreation(err),
        }
    }
}

impl From<PoolError<Infallible>> for IncubatorError {
    fn from(err: PoolError<Infallible>) -> Self {
        match err {
            PoolError::Exhausted { waited } => IncubatorError::PoolExhausted { waited },
            PoolError::Closed => IncubatorError::Closed,
            PoolError::Create(never) => match never {},
        }
    }
}

/// Rejected or unreadable incubator configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse incubator config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Pool(#[from] InvalidConfig),
}
