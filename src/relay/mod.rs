//! Streaming relay module.
//!
//! Accepts a generation request naming an arbitrary upstream LLM endpoint,
//! reshapes it per dialect, and re-serializes the upstream's streaming
//! response (OpenAI SSE or Ollama NDJSON) into one uniform SSE stream.

mod handlers;
mod server;

pub mod dialect;
pub mod lines;
pub mod types;

pub use dialect::{DecodeWarning, LineEvent, UpstreamDialect};
pub use lines::LineBuffer;
pub use server::{create_router, run_server, AppState};
pub use types::{ChunkChoice, Delta, GenerationRequest, NormalizedChunk};
