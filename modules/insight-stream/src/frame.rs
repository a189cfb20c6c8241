//! SSE framing and payload classification.
//!
//! Bytes arrive in arbitrary chunks. `FrameDecoder` carries the undecoded
//! tail between reads and only yields complete frames, so the same byte
//! stream produces the same frames however it is split.

use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use insight_common::format::{best_effort_json, embedded_error};
use insight_common::{AnalysisEvent, Author, RunFailure, StreamError, StructuredAnalysisResult};

/// Frames longer than this are dropped whole.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Bytes of a separator that can sit before a scan boundary.
const SEPARATOR_OVERLAP: usize = 3;

/// One unit out of the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    /// A frame over the size limit was discarded.
    Oversized { limit: usize },
}

/// Incremental splitter for blank-line separated SSE frames.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    /// Prefix of `buf` already searched without finding a separator.
    scanned: usize,
    /// Skipping the rest of an oversized frame.
    discarding: bool,
    max_frame: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_max_frame(MAX_FRAME_BYTES)
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_frame(max_frame: usize) -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
            discarding: false,
            max_frame,
        }
    }

    /// Append a chunk and drain every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        loop {
            let from = self.scanned.saturating_sub(SEPARATOR_OVERLAP);
            let Some((end, sep_len)) = find_separator(&self.buf[from..]) else {
                self.scanned = self.buf.len();
                self.shed_oversized(&mut frames);
                break;
            };
            let end = from + end;
            let frame: Vec<u8> = self.buf.drain(..end + sep_len).take(end).collect();
            self.scanned = 0;
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            if end > self.max_frame {
                debug!(bytes = end, limit = self.max_frame, "Dropping oversized frame");
                frames.push(Frame::Oversized { limit: self.max_frame });
            } else if let Some(text) = decode_text(&frame) {
                frames.push(Frame::Text(text));
            }
        }
        frames
    }

    /// An unterminated frame past the limit is dropped now, keeping only
    /// the bytes that could start its separator.
    fn shed_oversized(&mut self, frames: &mut Vec<Frame>) {
        if self.buf.len() <= self.max_frame + SEPARATOR_OVERLAP {
            return;
        }
        let dropped = self.buf.len() - SEPARATOR_OVERLAP;
        self.buf.drain(..dropped);
        self.scanned = self.buf.len();
        if !self.discarding {
            debug!(bytes = dropped, limit = self.max_frame, "Dropping oversized frame");
            self.discarding = true;
            frames.push(Frame::Oversized { limit: self.max_frame });
        }
    }

    /// Flush the unterminated tail once the stream has ended.
    pub fn finish(&mut self) -> Option<Frame> {
        let rest = std::mem::take(&mut self.buf);
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) {
            return None;
        }
        if rest.len() > self.max_frame {
            return Some(Frame::Oversized { limit: self.max_frame });
        }
        decode_text(&rest).map(Frame::Text)
    }

    /// Bytes held back waiting for a separator.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Earliest `\n\n` or `\r\n\r\n`, as (frame end, separator length).
fn find_separator(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = find(buf, b"\n\n").map(|i| (i, 2));
    let crlf = find(buf, b"\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if b.0 < a.0 { b } else { a }),
        (a, b) => a.or(b),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn decode_text(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim_matches(|c| c == '\r' || c == '\n');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Joined `data:` payload of a frame. Frames without data lines (comments,
/// keep-alives, bare `event:` lines) yield nothing.
pub fn data_payload(frame: &str) -> Option<String> {
    let lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// One `data:` record as the analysis service writes it.
#[derive(Debug, Deserialize)]
struct WireFrame {
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    is_final: Option<bool>,
    #[serde(default)]
    structured_data: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<StreamError>,
}

/// Input to the run reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamSignal {
    Event(AnalysisEvent),
    Failure(RunFailure),
    EndOfStream,
}

impl Frame {
    pub fn signals(&self) -> Vec<StreamSignal> {
        match self {
            Frame::Text(text) => classify(text),
            Frame::Oversized { limit } => vec![StreamSignal::Failure(RunFailure::MalformedFrame(
                format!("frame larger than {limit} bytes"),
            ))],
        }
    }
}

/// Turn one complete frame into reducer signals.
pub fn classify(frame: &str) -> Vec<StreamSignal> {
    let Some(payload) = data_payload(frame) else {
        return Vec::new();
    };

    let Some(value) = best_effort_json(&payload) else {
        debug!(bytes = payload.len(), "Skipping frame with undecodable JSON");
        return vec![StreamSignal::Failure(RunFailure::MalformedFrame(truncate(&payload)))];
    };

    let wire: WireFrame = match serde_json::from_value(value) {
        Ok(wire) => wire,
        Err(e) => {
            debug!(error = %e, "Skipping frame with unexpected shape");
            return vec![StreamSignal::Failure(RunFailure::MalformedFrame(e.to_string()))];
        }
    };

    let author = wire.author.map(Author::from);

    if let Some(error) = wire.error.filter(|e| !e.message.is_empty()) {
        return vec![StreamSignal::Failure(classify_error(author, error))];
    }

    let Some(author) = author else {
        debug!("Skipping frame without author");
        return vec![StreamSignal::Failure(RunFailure::MalformedFrame(
            "frame has no author".to_string(),
        ))];
    };

    let structured_data = wire.structured_data.and_then(|raw| {
        match serde_json::from_value::<StructuredAnalysisResult>(raw) {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::warn!(author = %author, error = %e, "Ignoring unreadable structured_data");
                None
            }
        }
    });

    let event = AnalysisEvent {
        author,
        content: wire.content.unwrap_or_default(),
        is_final: wire.is_final.unwrap_or(false),
        structured_data,
        error: None,
        timestamp: Utc::now(),
    };

    let partial = if event.author.is_supplementary() {
        embedded_error(&event.content).map(|message| RunFailure::AgentPartialFailure {
            author: event.author.clone(),
            message,
        })
    } else {
        None
    };

    let mut signals = vec![StreamSignal::Event(event)];
    if let Some(failure) = partial {
        signals.push(StreamSignal::Failure(failure));
    }
    signals
}

fn classify_error(author: Option<Author>, error: StreamError) -> RunFailure {
    match author {
        Some(author) if author.is_supplementary() => RunFailure::AgentPartialFailure {
            author,
            message: error.message,
        },
        _ if error.is_capacity() => RunFailure::UpstreamCapacity(error.message),
        _ => RunFailure::UpstreamGeneric(error.message),
    }
}

fn truncate(payload: &str) -> String {
    const MAX: usize = 120;
    match payload.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &payload[..idx]),
        None => payload.to_string(),
    }
}
