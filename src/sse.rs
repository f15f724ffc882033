// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Server-Sent-Events stream demultiplexer
//!
//! Incremental reader over an SSE byte stream. Bytes are appended with
//! [`StreamDemux::feed`], which yields every frame completed so far; a frame
//! without its blank-line terminator stays buffered until a later feed
//! completes it. The buffer is capped: if it grows past the cap without
//! holding a complete frame, the feed fails with
//! [`BackendError::StreamTooLarge`] and the buffer is dropped.
//!
//! The buffer holds raw bytes and text decoding happens per frame, so the
//! frames produced do not depend on where the stream was split into chunks.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::BackendError;

/// Default buffer cap (500 KB)
pub const DEFAULT_MAX_BUFFER: usize = 500_000;

/// One complete SSE frame
#[derive(Debug, Clone, PartialEq)]
pub struct SseFrame {
    /// Value of the `event:` line, if present
    pub event: Option<String>,
    /// Concatenated `data:` lines
    pub data: String,
    /// `data` decoded as JSON
    pub payload: Result<Value, BackendError>,
}

impl SseFrame {
    fn new(event: Option<String>, data: String) -> Self {
        let payload = serde_json::from_str::<Value>(&data).map_err(BackendError::from);
        Self {
            event,
            data,
            payload,
        }
    }

    /// Decode the payload into a concrete type
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, BackendError> {
        let value = self.payload.clone()?;
        serde_json::from_value(value).map_err(BackendError::from)
    }
}

/// Buffer state of the demultiplexer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemuxState {
    /// Buffer empty, waiting for bytes
    Idle,
    /// Holding bytes of an incomplete frame
    Accumulating,
}

/// Incremental SSE frame extractor, owned by one stream session
#[derive(Debug)]
pub struct StreamDemux {
    buffer: Vec<u8>,
    max_buffer: usize,
    event_filter: Option<String>,
}

impl Default for StreamDemux {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDemux {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            max_buffer: DEFAULT_MAX_BUFFER,
            event_filter: None,
        }
    }

    /// Only emit frames whose `event:` name matches
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event_filter = Some(event.into());
        self
    }

    pub fn with_max_buffer(mut self, max_buffer: usize) -> Self {
        self.max_buffer = max_buffer;
        self
    }

    pub fn state(&self) -> DemuxState {
        if self.buffer.is_empty() {
            DemuxState::Idle
        } else {
            DemuxState::Accumulating
        }
    }

    /// Bytes currently buffered
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Append bytes and iterate over the frames they complete.
    ///
    /// Frames are extracted lazily as the iterator is advanced; frames left
    /// unread stay buffered for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Frames<'_>, BackendError> {
        self.buffer.extend_from_slice(bytes);
        if self.buffer.len() > self.max_buffer && find_terminator(&self.buffer).is_none() {
            log::warn!(
                "SSE buffer exceeded {} bytes without a complete frame, dropping {} bytes",
                self.max_buffer,
                self.buffer.len()
            );
            self.buffer = Vec::new();
            return Err(BackendError::StreamTooLarge {
                limit: self.max_buffer,
            });
        }
        Ok(Frames { demux: self })
    }

    /// Extract the next complete frame that passes the event filter
    fn next_frame(&mut self) -> Option<SseFrame> {
        loop {
            let (end, term_len) = find_terminator(&self.buffer)?;
            let raw: Vec<u8> = self.buffer.drain(..end + term_len).collect();
            let Some(frame) = parse_frame(&raw[..end]) else {
                continue;
            };
            match &self.event_filter {
                Some(wanted) if frame.event.as_deref() != Some(wanted.as_str()) => continue,
                _ => return Some(frame),
            }
        }
    }
}

/// Lazy iterator over the frames completed by one [`StreamDemux::feed`] call
pub struct Frames<'a> {
    demux: &'a mut StreamDemux,
}

impl Iterator for Frames<'_> {
    type Item = SseFrame;

    fn next(&mut self) -> Option<SseFrame> {
        self.demux.next_frame()
    }
}

/// Position and length of the first frame terminator (`\n\n` or `\r\n\r\n`)
fn find_terminator(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = find_subslice(buf, b"\n\n").map(|pos| (pos, 2));
    let crlf = find_subslice(buf, b"\r\n\r\n").map(|pos| (pos, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Parse the lines of one frame; frames without data lines yield nothing
fn parse_frame(raw: &[u8]) -> Option<SseFrame> {
    let text = String::from_utf8_lossy(raw);
    let mut event = None;
    let mut data: Option<String> = None;

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => match data.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => data = Some(value.to_string()),
            },
            _ => {}
        }
    }

    data.map(|data| SseFrame::new(event, data))
}
