//! Incremental line assembly for streaming upstream bodies.
//!
//! Upstream bytes do not arrive aligned to line boundaries, so the relay
//! carries the trailing incomplete fragment of each read across to the next.
//! [`LineBuffer`] isolates that reassembly behind a narrow interface:
//! `feed` returns only complete lines, `flush` drains whatever is left at
//! end of stream.

/// Maximum bytes buffered while waiting for a newline. An upstream that
/// never emits one would otherwise grow the buffer without bound.
const MAX_BUFFER_BYTES: usize = 64 * 1024;

/// Line reassembler holding partial-line state between reads.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of bytes, returning the complete lines it closed.
    ///
    /// Lines are split on `\n` with a trailing `\r` trimmed, and decoded
    /// lossily so a bad byte sequence cannot kill the stream. The final
    /// fragment without a newline stays buffered for the next feed.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        for i in 0..self.buffer.len() {
            if self.buffer[i] == b'\n' {
                lines.push(decode_line(&self.buffer[start..i]));
                start = i + 1;
            }
        }
        self.buffer.drain(..start);

        if self.buffer.len() > MAX_BUFFER_BYTES {
            tracing::warn!(
                buffered = self.buffer.len(),
                "Dropping oversized partial line from upstream"
            );
            self.buffer.clear();
        }

        lines
    }

    /// Drain a trailing unterminated line at end of stream, if any.
    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = decode_line(&self.buffer);
        self.buffer.clear();
        Some(line)
    }
}

/// Decode one raw line, trimming a trailing `\r` (CRLF upstreams).
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
