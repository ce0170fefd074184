//! inkrelay - Streaming LLM relay with SSE normalization
//!
//! This library provides the core functionality for the inkrelay proxy:
//! configuration, dialect translation, and the streaming relay itself.

pub mod config;
pub mod error;
pub mod relay;

pub use config::Config;
pub use error::{Error, Result};
