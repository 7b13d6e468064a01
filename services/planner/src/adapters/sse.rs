//! services/planner/src/adapters/sse.rs
//!
//! Incremental parser for `text/event-stream` bodies.

/// One complete server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Buffers raw body bytes and yields events as their terminating blank line
/// arrives. Bytes are kept undecoded until an event is complete, so chunks
/// that split a multi-byte character are handled.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend(chunk.iter().filter(|b| **b != b'\r'));

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            if let Some(event) = parse_block(&String::from_utf8_lossy(&block[..pos])) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes a final event that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let block = std::mem::take(&mut self.buffer);
        parse_block(&String::from_utf8_lossy(&block))
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in block.lines() {
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        } else if let Some(value) = line.strip_prefix("event:") {
            event = Some(value.trim().to_string());
        }
        // `id:`, `retry:` and `:` comment lines are ignored.
    }

    if event.is_none() && data_lines.is_empty() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data_lines.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_events() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: put\ndata: {\"path\":\"/\"}\n\nevent: keep-alive\ndata: null\n\n");
        assert_eq!(
            events,
            vec![
                SseEvent {
                    event: Some("put".to_string()),
                    data: "{\"path\":\"/\"}".to_string()
                },
                SseEvent {
                    event: Some("keep-alive".to_string()),
                    data: "null".to_string()
                },
            ]
        );
    }

    #[test]
    fn events_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: pa").is_empty());
        assert!(decoder.push(b"tch\r\ndata: 1\r\n").is_empty());
        let events = decoder.push(b"\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("patch"));
        assert_eq!(events[0].data, "1");
    }

    #[test]
    fn multi_byte_character_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        let body = "data: S\u{e3}o Paulo\n\n".as_bytes();
        let (first, second) = body.split_at(8);
        assert!(decoder.push(first).is_empty());
        assert_eq!(decoder.push(second)[0].data, "S\u{e3}o Paulo");
    }

    #[test]
    fn comments_only_block_is_skipped() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b": heartbeat\n\n").is_empty());
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn finish_flushes_trailing_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: tail").is_empty());
        assert_eq!(decoder.finish().unwrap().data, "tail");
    }
}
