//! Length-prefixed JSON serializer.
//!
//! Each value is written as a 4-byte little-endian length followed by the
//! serde_json body, so a decode consumes exactly the bytes of one encode even
//! when the underlying stream holds more.

use std::io::{self, Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CodecError, CodecResult};
use crate::serializer::{Serializer, SerializerFactory};

const HEADER_LEN: usize = 4;

/// Default upper bound on a single frame body.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Scratch capacity kept between round trips; larger buffers are shrunk.
const RETAINED_SCRATCH: usize = 64 * 1024;

pub struct JsonSerializer {
    scratch: Vec<u8>,
    max_frame_len: usize,
    round_trips: u64,
}

impl JsonSerializer {
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            scratch: Vec::new(),
            max_frame_len: max_frame_len.min(u32::MAX as usize),
            round_trips: 0,
        }
    }

    /// Values decoded by this instance so far.
    pub fn round_trips(&self) -> u64 {
        self.round_trips
    }

    fn trim_scratch(&mut self) {
        self.scratch.clear();
        if self.scratch.capacity() > RETAINED_SCRATCH {
            self.scratch.shrink_to(RETAINED_SCRATCH);
        }
    }
}

impl Default for JsonSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer for JsonSerializer {
    fn encode<T>(&mut self, value: &T, sink: &mut dyn Write) -> CodecResult<()>
    where
        T: Serialize + ?Sized,
    {
        self.scratch.clear();
        let result = serde_json::to_writer(&mut self.scratch, value)
            .map_err(CodecError::encode)
            .and_then(|()| {
                let len = self.scratch.len();
                if len > self.max_frame_len {
                    return Err(CodecError::frame(format!(
                        "frame of {len} bytes exceeds limit of {}",
                        self.max_frame_len
                    )));
                }
                let header = (len as u32).to_le_bytes();
                sink.write_all(&header)?;
                sink.write_all(&self.scratch)?;
                sink.flush()?;
                Ok(())
            });
        self.trim_scratch();
        result
    }

    fn decode<T>(&mut self, source: &mut dyn Read) -> CodecResult<T>
    where
        T: DeserializeOwned,
    {
        let mut header = [0u8; HEADER_LEN];
        read_exact_or(source, &mut header, "missing frame header")?;
        let len = u32::from_le_bytes(header) as usize;
        if len > self.max_frame_len {
            return Err(CodecError::frame(format!(
                "frame of {len} bytes exceeds limit of {}",
                self.max_frame_len
            )));
        }

        self.scratch.clear();
        self.scratch.resize(len, 0);
        let result = read_exact_or(source, &mut self.scratch, "truncated frame body")
            .and_then(|()| serde_json::from_slice(&self.scratch).map_err(CodecError::decode));
        self.trim_scratch();
        if result.is_ok() {
            self.round_trips += 1;
        }
        result
    }
}

fn read_exact_or(source: &mut dyn Read, buf: &mut [u8], what: &str) -> CodecResult<()> {
    source.read_exact(buf).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => CodecError::frame(what),
        _ => CodecError::Io(err),
    })
}

/// Factory producing [`JsonSerializer`]s with a shared frame limit.
#[derive(Clone, Copy, Debug)]
pub struct JsonSerializerFactory {
    pub max_frame_len: usize,
}

impl Default for JsonSerializerFactory {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl SerializerFactory for JsonSerializerFactory {
    type Serializer = JsonSerializer;

    fn create(&self) -> JsonSerializer {
        JsonSerializer::with_max_frame_len(self.max_frame_len)
    }
}
