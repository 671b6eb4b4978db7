use std::io;

use thiserror::Error;

pub type CodecResult<T> = Result<T, CodecError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode value: {0}")]
    Encode(#[source] BoxError),

    #[error("failed to decode value: {0}")]
    Decode(#[source] BoxError),

    #[error("stream i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("malformed frame: {0}")]
    Frame(String),
}

impl CodecError {
    pub fn encode(err: impl Into<BoxError>) -> Self {
        CodecError::Encode(err.into())
    }

    pub fn decode(err: impl Into<BoxError>) -> Self {
        CodecError::Decode(err.into())
    }

    pub fn frame(msg: impl Into<String>) -> Self {
        CodecError::Frame(msg.into())
    }
}
