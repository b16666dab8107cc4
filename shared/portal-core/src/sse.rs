//! Server-Sent-Events framing for the search and popular streams.
//!
//! Only `data: ` lines matter; each carries one JSON object with any of
//! `results`, `error` and `complete`.

use serde::Deserialize;
use serde_json::Value;

use crate::item::{normalize_all, SearchResultItem};

/// Literal prefix of a payload line
pub const DATA_PREFIX: &str = "data: ";

/// Content type advertised by streaming responses
pub const EVENT_STREAM: &str = "text/event-stream";

/// Splits incoming chunks into complete lines.
///
/// Bytes are buffered rather than text so a multi-byte character split across
/// two chunks is decoded whole. A trailing partial line stays buffered until
/// its newline arrives or the stream ends.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
    scanned: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        for pos in self.scanned..self.buf.len() {
            if self.buf[pos] == b'\n' {
                lines.push(decode_line(&self.buf[start..pos]));
                start = pos + 1;
            }
        }

        self.buf.drain(..start);
        self.scanned = self.buf.len();
        lines
    }

    /// Flush the unterminated remainder once the stream has ended
    pub fn finish(&mut self) -> Option<String> {
        self.scanned = 0;
        if self.buf.is_empty() {
            return None;
        }
        let line = decode_line(&self.buf);
        self.buf.clear();
        Some(line)
    }

    /// Bytes held back waiting for a newline
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// What one data frame asks the consumer to do, in the order it must happen
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    /// Non-empty increment of results
    Batch(Vec<SearchResultItem>),
    /// Backend reported a failure; the request is over
    Failed(String),
    /// Backend finished sending
    Complete,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    /// Any JSON shape; only an array yields items
    #[serde(default)]
    results: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    complete: Option<Value>,
}

/// Parse one line.
///
/// Returns `None` for lines that are not data lines (comments, `event:` fields,
/// blank separators). A data line whose payload is not a JSON object yields
/// the parse error so the caller can log and skip it.
pub fn parse_line(line: &str) -> Option<Result<Vec<FrameEvent>, serde_json::Error>> {
    let payload = line.strip_prefix(DATA_PREFIX)?;
    Some(serde_json::from_str::<RawFrame>(payload).map(classify))
}

fn classify(frame: RawFrame) -> Vec<FrameEvent> {
    let mut events = Vec::new();

    if let Some(results) = frame.results.as_ref().and_then(Value::as_array) {
        let items = normalize_all(results);
        if !items.is_empty() {
            events.push(FrameEvent::Batch(items));
        }
    }

    if let Some(err) = frame.error.filter(is_truthy) {
        let message = match err {
            Value::String(s) => s,
            other => other.to_string(),
        };
        events.push(FrameEvent::Failed(message));
        return events;
    }

    if frame.complete.as_ref().is_some_and(is_truthy) {
        events.push(FrameEvent::Complete);
    }

    events
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_line_is_held_back() {
        let mut lines = LineBuffer::new();

        assert!(lines.push(b"data: {\"resu").is_empty());
        assert_eq!(lines.pending(), 12);

        let done = lines.push(b"lts\":[]}\n\n");
        assert_eq!(done, vec!["data: {\"results\":[]}".to_string(), String::new()]);
        assert_eq!(lines.pending(), 0);
    }

    #[test]
    fn test_split_multibyte_character() {
        let mut lines = LineBuffer::new();
        let text = "data: {\"title\":\"Amélie\"}\n".as_bytes();
        let cut = text.iter().position(|b| *b == 0xC3).unwrap() + 1;

        assert!(lines.push(&text[..cut]).is_empty());
        let done = lines.push(&text[cut..]);
        assert_eq!(done, vec!["data: {\"title\":\"Amélie\"}".to_string()]);
    }

    #[test]
    fn test_crlf_and_finish() {
        let mut lines = LineBuffer::new();
        assert_eq!(lines.push(b"a\r\nb"), vec!["a".to_string()]);
        assert_eq!(lines.finish(), Some("b".to_string()));
        assert_eq!(lines.finish(), None);
    }

    #[test]
    fn test_parse_results_frame() {
        let events = parse_line(r#"data: {"results":[{"id":1,"title":"A"}]}"#)
            .unwrap()
            .unwrap();
        match &events[..] {
            [FrameEvent::Batch(items)] => assert_eq!(items[0].title.as_deref(), Some("A")),
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[test]
    fn test_parse_complete_and_error_frames() {
        assert_eq!(
            parse_line(r#"data: {"complete":true}"#).unwrap().unwrap(),
            vec![FrameEvent::Complete]
        );
        assert_eq!(
            parse_line(r#"data: {"complete":false}"#).unwrap().unwrap(),
            Vec::<FrameEvent>::new()
        );
        assert_eq!(
            parse_line(r#"data: {"error":"scraper offline","complete":true}"#)
                .unwrap()
                .unwrap(),
            vec![FrameEvent::Failed("scraper offline".to_string())]
        );
    }

    #[test]
    fn test_results_precede_completion_in_one_frame() {
        let events = parse_line(r#"data: {"results":[{"title":"Z"}],"complete":1}"#)
            .unwrap()
            .unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], FrameEvent::Batch(_)));
        assert_eq!(events[1], FrameEvent::Complete);
    }

    #[test]
    fn test_empty_results_produce_no_batch() {
        let events = parse_line(r#"data: {"results":[]}"#).unwrap().unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_non_object_results_produce_no_batch() {
        let events = parse_line(r#"data: {"results":[1,"x",null]}"#).unwrap().unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_odd_results_shape_keeps_markers() {
        assert_eq!(
            parse_line(r#"data: {"results":{"title":"x"},"complete":true}"#)
                .unwrap()
                .unwrap(),
            vec![FrameEvent::Complete]
        );
        assert_eq!(
            parse_line(r#"data: {"results":"none","error":"index offline"}"#)
                .unwrap()
                .unwrap(),
            vec![FrameEvent::Failed("index offline".to_string())]
        );
    }

    #[test]
    fn test_non_data_and_malformed_lines() {
        assert!(parse_line("event: progress").is_none());
        assert!(parse_line(": keep-alive").is_none());
        assert!(parse_line("").is_none());
        assert!(parse_line("data: {broken").unwrap().is_err());
        assert!(parse_line("data: 42").unwrap().is_err());
    }
}
