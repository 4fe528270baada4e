//! services/tutor/src/adapters/sse.rs
//!
//! Incremental decoder for the backend's newline-delimited streaming format.
//!
//! The chat action returns its reply as a byte stream of line frames:
//! comment lines (starting with `:`) and blank lines are ignored, `data: `
//! lines carry a JSON payload with one text delta, and the literal payload
//! `[DONE]` terminates the stream. Frame boundaries do not line up with
//! chunk boundaries, so the decoder carries exactly one piece of state
//! between reads: the unterminated byte tail after the last newline. A line
//! only becomes a frame once its trailing newline has been observed.

use serde_json::Value;

/// One decoded frame of the streaming wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// An incremental fragment of the assistant reply.
    Delta(String),
    /// The end-of-stream terminator (`data: [DONE]`).
    Done,
}

/// Reassembles raw body chunks into complete frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    tail: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one transport chunk into the decoder and returns every frame
    /// completed by it, in wire order.
    ///
    /// The buffer is kept as raw bytes so a UTF-8 sequence split across two
    /// chunks is only decoded once its line is complete. Complete lines that
    /// are not valid JSON, or that lack the delta path, are skipped; they are
    /// never an error.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.tail.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(newline) = self.tail.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.tail.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            if let Some(frame) = decode_line(line.trim()) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Ends the stream, discarding any unterminated buffered fragment.
    pub fn finish(self) -> Option<String> {
        if self.tail.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.tail).into_owned())
        }
    }
}

/// Decodes one complete line into a frame, or `None` for ignorable and
/// malformed lines.
fn decode_line(line: &str) -> Option<Frame> {
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let payload = line.strip_prefix("data:")?.trim_start();
    if payload == "[DONE]" {
        return Some(Frame::Done);
    }
    let parsed = serde_json::from_str::<Value>(payload).ok()?;
    delta_text(&parsed).map(Frame::Delta)
}

/// Extracts the delta text from the nested payload path
/// `candidates[0].content.parts[0].text`.
fn delta_text(payload: &Value) -> Option<String> {
    payload
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
        .map(str::to_string)
}
