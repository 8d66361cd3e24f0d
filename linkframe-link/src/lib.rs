//! # linkframe-link
//!
//! Moves linkframe frames between a sender and a receiver.
//!
//! This crate provides:
//! - Layered configuration (defaults, YAML file, environment)
//! - A single-connection TCP transport carrying one `0`/`1` line per frame
//! - An in-memory transport with the same line codec
//! - Sender and receiver drivers built on the codec's segmenter and reassembler

pub mod config;
pub mod error;
pub mod receiver;
pub mod sender;
pub mod transport;

pub use config::{Config, ConfigError};
pub use error::LinkError;
pub use receiver::{receive_stream, receive_to_file, ReceiveReport};
pub use sender::{send_file, send_payload, SendReport};
pub use transport::{
    memory_link, BitSink, BitSource, LineSink, LineSource, MemorySink, MemorySource, TcpReceiver,
    TcpSender,
};
