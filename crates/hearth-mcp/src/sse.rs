//! Server-Sent Events (SSE) frame parser.
//!
//! Incrementally decodes raw bytes from an HTTP response into discrete
//! `event:`/`data:` frames. Bytes may arrive one at a time or in chunks;
//! lines are only decoded once their trailing newline has been observed, so
//! multi-byte UTF-8 characters split across chunk boundaries are buffered
//! until complete. Knows nothing about JSON-RPC.

use crate::error::TransportError;

/// Default cap on buffered, undelivered bytes per connection.
pub const DEFAULT_MAX_BUFFER: usize = 64 * 1024;

/// A single parsed SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental SSE parser that processes bytes into frames.
///
/// One parser instance per connection; its buffer state carries partial
/// lines across `feed` calls. Exceeding the buffer cap poisons the parser —
/// the connection must be torn down.
#[derive(Debug)]
pub struct FrameParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data_lines: Vec<String>,
    max_buffer: usize,
    poisoned: bool,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::with_max_buffer(DEFAULT_MAX_BUFFER)
    }

    pub fn with_max_buffer(max_buffer: usize) -> Self {
        Self {
            buffer: Vec::new(),
            event: None,
            data_lines: Vec::new(),
            max_buffer,
            poisoned: false,
        }
    }

    /// Feed a chunk of bytes and return any complete frames, in arrival order.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>, TransportError> {
        if self.poisoned {
            return Err(TransportError::FrameTooLarge {
                limit: self.max_buffer,
            });
        }

        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        let mut start = 0;

        while let Some(rel) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let newline = start + rel;
            let mut end = newline;
            if end > start && self.buffer[end - 1] == b'\r' {
                end -= 1;
            }
            let line = self.buffer[start..end].to_vec();
            self.handle_line(&line, &mut frames);
            start = newline + 1;
        }
        self.buffer.drain(..start);

        if self.pending_len() > self.max_buffer {
            self.poisoned = true;
            return Err(TransportError::FrameTooLarge {
                limit: self.max_buffer,
            });
        }

        Ok(frames)
    }

    fn handle_line(&mut self, line: &[u8], frames: &mut Vec<SseFrame>) {
        if line.is_empty() {
            // Blank line terminates a frame; a frame without data is dropped.
            if self.data_lines.is_empty() {
                self.event = None;
            } else {
                frames.push(SseFrame {
                    event: self.event.take(),
                    data: std::mem::take(&mut self.data_lines).join("\n"),
                });
            }
            return;
        }

        let Ok(text) = std::str::from_utf8(line) else {
            // Malformed UTF-8: skip up to the next line boundary.
            return;
        };

        if text.starts_with(':') {
            return;
        }

        if let Some((field, value)) = text.split_once(':') {
            let value = value.strip_prefix(' ').unwrap_or(value);
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data_lines.push(value.to_string()),
                _ => {} // Ignore unknown fields
            }
        } else if text == "data" {
            self.data_lines.push(String::new());
        }
    }

    /// Buffered bytes not yet delivered as a frame.
    fn pending_len(&self) -> usize {
        self.buffer.len() + self.data_lines.iter().map(|l| l.len() + 1).sum::<usize>()
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(parser: &mut FrameParser, input: &[u8]) -> Vec<SseFrame> {
        parser.feed(input).unwrap()
    }

    #[test]
    fn simple_frame() {
        let mut parser = FrameParser::new();
        let frames = feed_all(&mut parser, b"event: endpoint\ndata: /sessions/abc\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("endpoint"));
        assert_eq!(frames[0].data, "/sessions/abc");
    }

    #[test]
    fn crlf_line_endings() {
        let mut parser = FrameParser::new();
        let frames = feed_all(&mut parser, b"event: endpoint\r\ndata: /sessions/abc\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("endpoint"));
        assert_eq!(frames[0].data, "/sessions/abc");
    }

    #[test]
    fn repeated_data_lines_joined() {
        let mut parser = FrameParser::new();
        let frames = feed_all(&mut parser, b"data: line one\ndata: line two\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "line one\nline two");
    }

    #[test]
    fn byte_by_byte_matches_single_chunk() {
        let input: &[u8] = b"event: message\ndata: {\"id\":\"X\"}\n\nevent: message\ndata: {\"id\":\"Y\"}\n\n";

        let mut whole = FrameParser::new();
        let whole_frames = feed_all(&mut whole, input);

        let mut incremental = FrameParser::new();
        let mut incremental_frames = Vec::new();
        for byte in input {
            incremental_frames.extend(incremental.feed(std::slice::from_ref(byte)).unwrap());
        }

        assert_eq!(whole_frames, incremental_frames);
        assert_eq!(whole_frames.len(), 2);
    }

    #[test]
    fn multibyte_utf8_split_across_chunks() {
        let mut parser = FrameParser::new();
        let input = "data: caf\u{e9}\n\n".as_bytes();
        // Split inside the two-byte encoding of 'é'.
        let split = input.len() - 4;
        assert!(parser.feed(&input[..split]).unwrap().is_empty());
        let frames = parser.feed(&input[split..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "caf\u{e9}");
    }

    #[test]
    fn invalid_utf8_line_skipped() {
        let mut parser = FrameParser::new();
        let mut input = b"data: ".to_vec();
        input.extend_from_slice(&[0xff, 0xfe]);
        input.extend_from_slice(b"\ndata: ok\n\n");
        let frames = parser.feed(&input).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "ok");
    }

    #[test]
    fn comments_and_unknown_fields_ignored() {
        let mut parser = FrameParser::new();
        let frames = feed_all(&mut parser, b": keepalive\nid: 42\nretry: 1000\ndata: x\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, None);
        assert_eq!(frames[0].data, "x");
    }

    #[test]
    fn frame_without_data_not_emitted() {
        let mut parser = FrameParser::new();
        let frames = feed_all(&mut parser, b"event: ping\n\ndata: real\n\n");
        assert_eq!(frames.len(), 1);
        // The dangling event name does not leak into the next frame.
        assert_eq!(frames[0].event, None);
        assert_eq!(frames[0].data, "real");
    }

    #[test]
    fn partial_line_held_until_newline() {
        let mut parser = FrameParser::new();
        assert!(parser.feed(b"data: partial").unwrap().is_empty());
        let frames = parser.feed(b" line\n\n").unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "partial line");
    }

    #[test]
    fn buffer_cap_overflow_poisons_parser() {
        let mut parser = FrameParser::with_max_buffer(16);
        let err = parser.feed(b"data: this line never ends and never ends").unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge { limit: 16 }));
        // Poisoned: further reads keep failing.
        assert!(parser.feed(b"\n\n").is_err());
    }
}
