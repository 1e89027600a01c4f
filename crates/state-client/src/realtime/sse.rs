//! Incremental `text/event-stream` parser.
//!
//! Only `event:` and `data:` fields are used. `id:` and `retry:` are ignored
//! since reconnect timing is owned by the channel's backoff.

use crate::{ClientError, ClientResult};

/// One dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub name: String,
    pub data: String,
}

impl SseEvent {
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

const DEFAULT_EVENT: &str = "message";

/// Longest line the parser will buffer while waiting for its newline.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug)]
pub struct SseParser {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to hold no newline.
    scanned: usize,
    max_line: usize,
    event: Option<String>,
    data: Vec<String>,
    has_data: bool,
}

impl Default for SseParser {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line,
            event: None,
            data: Vec::new(),
            has_data: false,
        }
    }

    /// Feed a chunk; returns every event completed by it. Partial lines are
    /// buffered, so chunks may split anywhere, including inside a UTF-8 sequence.
    ///
    /// A partial line longer than the limit is a parse error and resets the
    /// parser.
    pub fn push(&mut self, chunk: &[u8]) -> ClientResult<Vec<SseEvent>> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + offset;
            let raw = &self.buffer[start..end];
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            let line = String::from_utf8_lossy(raw).into_owned();
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
            start = end + 1;
            self.scanned = start;
        }
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.max_line {
            let pending = self.buffer.len();
            *self = Self::with_max_line(self.max_line);
            return Err(ClientError::Parse(format!(
                "event stream line exceeds {} bytes ({} buffered)",
                self.max_line, pending
            )));
        }
        Ok(events)
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                self.data.push(value.to_string());
                self.has_data = true;
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let name = self.event.take();
        let data = std::mem::take(&mut self.data);
        let has_data = std::mem::replace(&mut self.has_data, false);

        // A blank line with no fields is just a separator.
        if name.is_none() && !has_data {
            return None;
        }

        Some(SseEvent {
            name: name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data: data.join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use state_protocol_types::RealtimeEvent;

    #[test]
    fn test_parses_named_event() {
        let mut parser = SseParser::new();
        let events = parser
            .push(b"event: state_updated\ndata: {\"state\":\"cart\"}\n\n")
            .unwrap();
        assert_eq!(
            events,
            vec![SseEvent::new("state_updated", "{\"state\":\"cart\"}")]
        );
    }

    #[test]
    fn test_chunks_split_anywhere() {
        let frame = "event: item_created\r\ndata: {\"id\":\"caf\u{e9}\"}\r\n\r\n".as_bytes();
        let mut parser = SseParser::new();
        let mut events = Vec::new();
        for byte in frame.chunks(1) {
            events.extend(parser.push(byte).unwrap());
        }
        assert_eq!(events, vec![SseEvent::new("item_created", "{\"id\":\"caf\u{e9}\"}")]);
    }

    #[test]
    fn test_multiline_data_and_comments() {
        let mut parser = SseParser::new();
        let events = parser
            .push(b": keepalive\n\ndata: one\ndata: two\nid: 7\n\n")
            .unwrap();
        assert_eq!(events, vec![SseEvent::new("message", "one\ntwo")]);
    }

    #[test]
    fn test_heartbeat_frame_round_trips() {
        let frame = RealtimeEvent::Heartbeat.to_sse_frame().unwrap();
        let mut parser = SseParser::new();
        let events = parser.push(frame.as_bytes()).unwrap();
        assert_eq!(events, vec![SseEvent::new("heartbeat", "")]);
    }

    #[test]
    fn test_incomplete_event_waits_for_blank_line() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"event: heartbeat\ndata:\n").unwrap().is_empty());
        assert_eq!(parser.push(b"\n").unwrap().len(), 1);
    }

    #[test]
    fn test_line_split_across_many_chunks() {
        let mut parser = SseParser::with_max_line(128);
        assert!(parser.push(b"data: ").unwrap().is_empty());
        for _ in 0..10 {
            assert!(parser.push(b"0123456789").unwrap().is_empty());
        }
        let events = parser.push(b"\n\n").unwrap();
        assert_eq!(events, vec![SseEvent::new("message", "0123456789".repeat(10))]);
    }

    #[test]
    fn test_unterminated_line_overflows() {
        let mut parser = SseParser::with_max_line(16);
        assert!(parser.push(b"data: 0123456789").unwrap().is_empty());

        let err = parser.push(b"abcdef").unwrap_err();
        assert!(matches!(err, ClientError::Parse(_)));

        // The parser starts clean afterwards.
        let events = parser.push(b"event: heartbeat\n\n").unwrap();
        assert_eq!(events, vec![SseEvent::new("heartbeat", "")]);
    }
}
