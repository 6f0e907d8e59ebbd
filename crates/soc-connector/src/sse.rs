//! Server-sent event framing
//!
//! Incremental decoder for `text/event-stream` bodies. Chunks may split
//! lines (and UTF-8 sequences) anywhere; events are emitted on blank lines.

use bytes::BytesMut;

/// Longest partial line held while waiting for its terminator
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// One dispatched event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: String,
}

#[derive(Debug)]
pub struct SseDecoder {
    buffer: BytesMut,
    /// Bytes of `buffer` already known to hold no newline
    scanned: usize,
    max_line: usize,
    overflowed: bool,
    event: Option<String>,
    id: Option<String>,
    data: Vec<String>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            scanned: 0,
            max_line,
            overflowed: false,
            event: None,
            id: None,
            data: Vec::new(),
        }
    }

    /// True once a line grew past the limit; the decoder stops accepting input
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Feed a chunk, returning every event it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if self.overflowed {
            return events;
        }
        self.buffer.extend_from_slice(chunk);

        loop {
            let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') else {
                self.scanned = self.buffer.len();
                break;
            };
            let pos = self.scanned + offset;
            self.scanned = 0;
            let raw = self.buffer.split_to(pos + 1);
            let mut line = &raw[..raw.len() - 1];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            let line = String::from_utf8_lossy(line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        if self.buffer.len() > self.max_line {
            tracing::warn!(pending = self.buffer.len(), limit = self.max_line, "event stream line too long");
            self.buffer = BytesMut::new();
            self.scanned = 0;
            self.overflowed = true;
        }
        events
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
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        Some(SseEvent {
            event,
            id: self.id.clone(),
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: {\"id\":\"1\"}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"id\":\"1\"}");
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: alert\r\nda").is_empty());
        assert!(decoder.feed(b"ta: hello\r\n").is_empty());
        let events = decoder.feed(b"\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("alert"));
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn test_multiline_data_and_comments() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b": keepalive\n\ndata: a\ndata: b\nid: 7\nretry: 1000\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "a\nb");
        assert_eq!(events[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn test_incomplete_event_is_not_dispatched() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: partial\n").is_empty());
    }

    #[test]
    fn test_unterminated_line_overflows() {
        let mut decoder = SseDecoder::with_max_line(16);
        assert!(decoder.feed(b"data: {\"id\":\"1\"}\n\n").len() == 1);
        assert!(decoder.feed(b"data: 0123456").is_empty());
        assert!(!decoder.overflowed());

        let events = decoder.feed(b"789abcdef");
        assert!(events.is_empty());
        assert!(decoder.overflowed());
        assert!(decoder.feed(b"\n\n").is_empty());
    }

    #[test]
    fn test_events_before_overflow_are_kept() {
        let mut decoder = SseDecoder::with_max_line(16);
        let events = decoder.feed(b"data: ok\n\ndata: this line never ends");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "ok");
        assert!(decoder.overflowed());
    }

    #[test]
    fn test_line_split_over_many_chunks() {
        let mut decoder = SseDecoder::new();
        for byte in b"data: slow\n" {
            assert!(decoder.feed(&[*byte]).is_empty());
        }
        let events = decoder.feed(b"\n");
        assert_eq!(events[0].data, "slow");
    }

    #[test]
    fn test_utf8_split_inside_code_point() {
        let payload = "data: héllo\n\n".as_bytes();
        let split = payload.iter().position(|b| *b >= 0x80).unwrap() + 1;
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(&payload[..split]).is_empty());
        let events = decoder.feed(&payload[split..]);
        assert_eq!(events[0].data, "héllo");
    }
}
