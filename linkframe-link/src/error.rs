//! Link error types.

use crate::config::ConfigError;
use linkframe_codec::CodecError;
use std::time::Duration;
use thiserror::Error;

/// Link errors.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("line exceeds {max} bytes")]
    LineTooLong { max: usize },
}
