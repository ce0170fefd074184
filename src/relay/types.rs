//! Relay request and normalized chunk types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One inbound generation request from the writing UI.
///
/// Constructed per HTTP call, consumed once, and discarded; the relay keeps
/// no state across calls. `body` is the provider payload (model, messages,
/// prompt, temperature, ...) before dialect adaptation and is treated as
/// opaque apart from the fields the Ollama reshaping reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Upstream endpoint. Required, must be non-empty.
    #[serde(default)]
    pub target_url: String,
    /// Caller-supplied upstream headers (e.g., bearer token).
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Provider-specific payload, forwarded after dialect shaping.
    #[serde(default)]
    pub body: serde_json::Value,
    /// Selects the upstream dialect; false means OpenAI-compatible.
    #[serde(default)]
    pub is_ollama: bool,
}

/// Normalized streaming chunk in OpenAI chat-completion-chunk shape.
///
/// Every frame the relay synthesizes serializes to this shape; pass-through
/// frames from OpenAI-compatible upstreams are already in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

/// A streaming choice delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

/// Delta content in a streaming chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl NormalizedChunk {
    /// Build a single-choice content chunk for text synthesized from a
    /// non-OpenAI upstream.
    pub fn content(id: String, model: String, text: String, done: bool) -> Self {
        Self {
            id,
            object: "chat.completion.chunk".to_string(),
            created: chrono::Utc::now().timestamp(),
            model,
            choices: vec![ChunkChoice {
                index: 0,
                delta: Delta {
                    content: Some(text),
                },
                finish_reason: done.then(|| "stop".to_string()),
            }],
        }
    }
}
