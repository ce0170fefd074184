//! Upstream dialect translation.
//!
//! The relay speaks two upstream shapes: OpenAI-compatible chat completions
//! (also covers Grok, DeepSeek, and compatible custom endpoints) and the
//! Ollama generate API. The dialect is chosen once per request from the
//! `isOllama` flag and never switches mid-stream. Each dialect knows how to
//! shape the outbound request and how to turn one complete upstream line
//! into zero or one normalized frames.

use super::types::NormalizedChunk;

/// Upstream provider dialect, fixed for the lifetime of one relay call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamDialect {
    OpenAiCompatible,
    Ollama,
}

/// What one complete upstream line translates to.
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    /// Nothing to forward (blank line, empty delta, SSE housekeeping).
    Skip,
    /// Forward one JSON frame.
    Frame(serde_json::Value),
    /// Forward one JSON frame, then terminate the stream.
    FinalFrame(serde_json::Value),
    /// Terminate the stream without a frame.
    Done,
}

/// A line that failed to decode. The caller logs it and continues; a few
/// bad frames must not kill an otherwise-good generation.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeWarning {
    pub reason: String,
    pub line: String,
}

impl DecodeWarning {
    fn new(reason: impl Into<String>, line: &str) -> Self {
        Self {
            reason: reason.into(),
            // Cap the echoed line so a garbage blob doesn't flood the log.
            line: line.chars().take(200).collect(),
        }
    }
}

/// Subset of an Ollama NDJSON streaming line the relay cares about.
#[derive(Debug, serde::Deserialize)]
struct OllamaLine {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
}

impl UpstreamDialect {
    /// Derive the dialect from the request flag.
    pub fn from_request(is_ollama: bool) -> Self {
        if is_ollama {
            Self::Ollama
        } else {
            Self::OpenAiCompatible
        }
    }

    /// Whether caller-supplied headers are forwarded upstream.
    ///
    /// Ollama runs locally and takes no auth, so caller headers (typically
    /// an Authorization meant for a hosted API) are dropped.
    pub fn forwards_caller_headers(&self) -> bool {
        matches!(self, Self::OpenAiCompatible)
    }

    /// Shape the caller's body into the upstream request body.
    pub fn shape_body(&self, body: &serde_json::Value) -> serde_json::Value {
        match self {
            Self::OpenAiCompatible => {
                // Pass through, with streaming forced on.
                let mut shaped = match body {
                    serde_json::Value::Object(map) => map.clone(),
                    _ => serde_json::Map::new(),
                };
                shaped.insert("stream".to_string(), serde_json::Value::Bool(true));
                serde_json::Value::Object(shaped)
            }
            Self::Ollama => {
                let mut shaped = serde_json::Map::new();
                shaped.insert(
                    "model".to_string(),
                    serde_json::Value::String(model_name(body).to_string()),
                );

                // Chat-style bodies are flattened: last message becomes the
                // prompt, first message (usually the system role) becomes
                // the system string. Prompt-style bodies pass through.
                let messages = body.get("messages").and_then(|m| m.as_array());
                let prompt = match messages {
                    Some(messages) => messages.last().and_then(|m| m.get("content")).cloned(),
                    None => body.get("prompt").cloned(),
                };
                if let Some(prompt) = prompt {
                    shaped.insert("prompt".to_string(), prompt);
                }
                if let Some(system) = messages
                    .and_then(|m| m.first())
                    .and_then(|m| m.get("content"))
                {
                    shaped.insert("system".to_string(), system.clone());
                }

                shaped.insert("stream".to_string(), serde_json::Value::Bool(true));
                serde_json::Value::Object(shaped)
            }
        }
    }

    /// Compute the outbound URL from the caller's target.
    ///
    /// Ollama targets are rewritten onto `/api/generate`: truncate at the
    /// first `/api/` segment (or use the URL as-is when absent) and append
    /// the generate path. Substring matching is deliberate; structured URL
    /// parsing would change behavior for query strings and odd paths.
    /// A literal `localhost` host is replaced with `127.0.0.1` for any
    /// dialect, which sidesteps local DNS resolution quirks.
    pub fn endpoint_url(&self, target_url: &str) -> String {
        let mut url = target_url.to_string();

        if matches!(self, Self::Ollama) && !url.contains("/api/generate") {
            let base = match url.find("/api/") {
                Some(idx) => &url[..idx],
                None => url.as_str(),
            };
            url = format!("{}/api/generate", base);
        }

        if url.contains("localhost") {
            // Only the first occurrence: that is the host; later ones could
            // be path segments.
            url = url.replacen("localhost", "127.0.0.1", 1);
        }

        url
    }

    /// Translate one complete upstream line into a stream event.
    ///
    /// `model` is the model name echoed into synthesized chunks.
    pub fn decode_line(
        &self,
        line: &str,
        model: &str,
    ) -> Result<LineEvent, DecodeWarning> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(LineEvent::Skip);
        }

        match self {
            Self::Ollama => self.decode_ollama_line(line, model),
            Self::OpenAiCompatible => self.decode_openai_line(line),
        }
    }

    fn decode_ollama_line(
        &self,
        line: &str,
        model: &str,
    ) -> Result<LineEvent, DecodeWarning> {
        // A stray SSE terminator from a misconfigured endpoint; termination
        // is signaled by the `done` field, not by this marker.
        if line == "data: [DONE]" {
            return Ok(LineEvent::Skip);
        }

        let parsed: OllamaLine = serde_json::from_str(line)
            .map_err(|e| DecodeWarning::new(format!("invalid Ollama line: {}", e), line))?;

        let chunk = parsed
            .response
            .filter(|text| !text.is_empty())
            .map(|text| {
                let id = format!("ollama-{}", chrono::Utc::now().timestamp_millis());
                NormalizedChunk::content(id, model.to_string(), text, parsed.done)
            })
            .map(|chunk| serde_json::to_value(chunk).unwrap_or_default());

        Ok(match (chunk, parsed.done) {
            (Some(frame), true) => LineEvent::FinalFrame(frame),
            (Some(frame), false) => LineEvent::Frame(frame),
            (None, true) => LineEvent::Done,
            (None, false) => LineEvent::Skip,
        })
    }

    fn decode_openai_line(&self, line: &str) -> Result<LineEvent, DecodeWarning> {
        if let Some(data) = line.strip_prefix("data: ") {
            if data == "[DONE]" {
                return Ok(LineEvent::Done);
            }
            let value: serde_json::Value = serde_json::from_str(data)
                .map_err(|e| DecodeWarning::new(format!("invalid SSE data: {}", e), line))?;
            return Ok(LineEvent::Frame(value));
        }

        // Some backends emit bare JSON lines without the SSE prefix.
        match serde_json::from_str::<serde_json::Value>(line) {
            Ok(value) => Ok(LineEvent::Frame(value)),
            Err(e) => Err(DecodeWarning::new(format!("unparseable line: {}", e), line)),
        }
    }
}

/// The model name used for Ollama request shaping and synthesized chunks.
pub fn model_name(body: &serde_json::Value) -> &str {
    body.get("model").and_then(|m| m.as_str()).unwrap_or("llama2")
}
