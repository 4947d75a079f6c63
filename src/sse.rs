//! Server-sent event framing for reply streams.
//!
//! A reply stream is a sequence of frames separated by a blank line.  A frame carries data
//! only if it begins with `data: `; anything else (comments, `event:` lines, keep-alives) is
//! dropped.  The payload `[DONE]` terminates the stream and everything after it is
//! discarded.  A data payload that does not decode as a [`ChatDelta`] is reported as
//! [`FrameEvent::Malformed`] and skipped; it never ends the stream.
//!
//! [`FrameParser`] only retains the unterminated tail after the last separator, and that
//! tail is capped at a configurable size.

use crate::error::{Error, Result};
use crate::types::ChatDelta;

/// Payload that terminates a reply stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Payload some backends send before the first delta.
pub const START_MARKER: &str = "[START]";

/// Default cap on the unterminated tail, in bytes.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1 << 20;

const SEPARATOR: &str = "\n\n";
const DATA_PREFIX: &str = "data: ";

/// A decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// The backend announced the start of the reply.
    Start,
    /// A content delta.
    Delta(ChatDelta),
    /// The terminal sentinel.
    Done,
}

/// What the parser yields: a frame, or a non-fatal report about a frame it skipped.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    /// A frame to apply.
    Frame(Frame),
    /// A data frame whose payload did not decode.
    Malformed {
        /// The offending payload, without the `data: ` prefix.
        payload: String,
        /// Why decoding failed.
        reason: String,
    },
    /// A frame grew past the size cap and was discarded.
    Oversized {
        /// Bytes dropped when the cap was hit.
        discarded: usize,
    },
}

/// Incremental frame splitter.
///
/// Feed decoded text with [`FrameParser::feed`] and drain the returned iterator.  Frames are
/// produced lazily, in arrival order, and never more than once.  After the terminal sentinel
/// the parser is finished and ignores all further input.
///
/// # Example
///
/// ```
/// # tokio_test::block_on(async {
/// use chatsync::{Frame, FrameEvent, FrameParser, Utf8Decoder};
/// use futures::StreamExt;
///
/// let chunks: Vec<&[u8]> = vec![
///     &b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n"[..],
///     &b"\ndata: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\ndata: [DONE]\n\n"[..],
/// ];
/// let mut transport = futures::stream::iter(chunks);
/// let mut decoder = Utf8Decoder::new();
/// let mut parser = FrameParser::new();
/// let mut text = String::new();
/// while let Some(chunk) = transport.next().await {
///     for event in parser.feed(&decoder.decode(chunk).unwrap()) {
///         if let FrameEvent::Frame(Frame::Delta(delta)) = event {
///             text.push_str(delta.fragment());
///         }
///     }
/// }
/// assert_eq!(text, "Hello");
/// assert!(parser.is_finished());
/// # });
/// ```
#[derive(Debug)]
pub struct FrameParser {
    buffer: String,
    start: usize,
    max_frame_bytes: usize,
    pending_cr: bool,
    discarding: bool,
    finished: bool,
}

impl FrameParser {
    /// Creates a parser with the default size cap.
    pub fn new() -> Self {
        Self::with_max_frame_bytes(DEFAULT_MAX_FRAME_BYTES)
    }

    /// Creates a parser that discards any frame longer than `max_frame_bytes`.
    pub fn with_max_frame_bytes(max_frame_bytes: usize) -> Self {
        Self {
            buffer: String::new(),
            start: 0,
            max_frame_bytes: max_frame_bytes.max(1),
            pending_cr: false,
            discarding: false,
            finished: false,
        }
    }

    /// Appends a chunk of text and returns the frames it completes.
    ///
    /// Frames still sitting in the iterator when it is dropped are kept for the next call.
    pub fn feed(&mut self, chunk: &str) -> Frames<'_> {
        self.push(chunk);
        Frames { parser: self }
    }

    /// Flushes the tail once the transport has ended.
    ///
    /// A final data frame that was never followed by a blank line is still decoded.
    pub fn finish(&mut self) -> Option<FrameEvent> {
        if self.finished {
            return None;
        }
        self.finished = true;
        let tail = std::mem::take(&mut self.buffer);
        self.start = 0;
        if self.discarding {
            return None;
        }
        let tail = tail.trim_end_matches('\n');
        classify(tail)
    }

    /// True once the terminal sentinel was seen or [`FrameParser::finish`] was called.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Text received but not yet framed.
    pub fn pending(&self) -> &str {
        &self.buffer[self.start..]
    }

    fn push(&mut self, chunk: &str) {
        if self.finished || chunk.is_empty() {
            return;
        }
        self.compact();
        let mut text = String::with_capacity(chunk.len() + 1);
        if self.pending_cr {
            text.push('\r');
            self.pending_cr = false;
        }
        text.push_str(chunk);
        if text.ends_with('\r') {
            text.pop();
            self.pending_cr = true;
        }
        self.buffer.push_str(&text.replace("\r\n", "\n"));
    }

    fn next_event(&mut self) -> Option<FrameEvent> {
        loop {
            if self.finished {
                return None;
            }
            let Some(offset) = self.buffer[self.start..].find(SEPARATOR) else {
                return self.enforce_cap();
            };
            let end = self.start + offset;
            let frame_start = self.start;
            self.start = end + SEPARATOR.len();
            if self.discarding {
                self.discarding = false;
                continue;
            }
            match classify(&self.buffer[frame_start..end]) {
                Some(FrameEvent::Frame(Frame::Done)) => {
                    self.finished = true;
                    self.buffer = String::new();
                    self.start = 0;
                    return Some(FrameEvent::Frame(Frame::Done));
                }
                Some(event) => return Some(event),
                None => continue,
            }
        }
    }

    fn enforce_cap(&mut self) -> Option<FrameEvent> {
        self.compact();
        if self.buffer.len() <= self.max_frame_bytes {
            return None;
        }
        // Keep a trailing newline: it may be the first half of the separator.
        let keep_newline = self.buffer.ends_with('\n');
        let discarded = self.buffer.len();
        self.buffer.clear();
        if keep_newline {
            self.buffer.push('\n');
        }
        if self.discarding {
            return None;
        }
        self.discarding = true;
        Some(FrameEvent::Oversized { discarded })
    }

    fn compact(&mut self) {
        if self.start > 0 {
            self.buffer.drain(..self.start);
            self.start = 0;
        }
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy iterator over the frames completed by one [`FrameParser::feed`] call.
pub struct Frames<'a> {
    parser: &'a mut FrameParser,
}

impl Iterator for Frames<'_> {
    type Item = FrameEvent;

    fn next(&mut self) -> Option<FrameEvent> {
        self.parser.next_event()
    }
}

fn classify(frame: &str) -> Option<FrameEvent> {
    let payload = frame.strip_prefix(DATA_PREFIX)?;
    let event = match payload {
        DONE_SENTINEL => FrameEvent::Frame(Frame::Done),
        START_MARKER => FrameEvent::Frame(Frame::Start),
        json => match serde_json::from_str::<ChatDelta>(json) {
            Ok(delta) => FrameEvent::Frame(Frame::Delta(delta)),
            Err(err) => FrameEvent::Malformed {
                payload: json.to_string(),
                reason: err.to_string(),
            },
        },
    };
    Some(event)
}

/// Incremental UTF-8 decoder for transport chunks.
///
/// A multi-byte character split across two chunks is carried over instead of rejected.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes as much of `bytes` (after any carried-over prefix) as forms whole characters.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<String> {
        let mut input = std::mem::take(&mut self.carry);
        input.extend_from_slice(bytes);
        match String::from_utf8(input) {
            Ok(text) => Ok(text),
            Err(err) => {
                let utf8 = err.utf8_error();
                if utf8.error_len().is_some() {
                    return Err(Error::encoding(
                        format!("Invalid UTF-8 in stream: {utf8}"),
                        Some(Box::new(utf8)),
                    ));
                }
                let mut input = err.into_bytes();
                self.carry = input.split_off(utf8.valid_up_to());
                String::from_utf8(input).map_err(|e| {
                    Error::encoding(format!("Invalid UTF-8 in stream: {e}"), Some(Box::new(e)))
                })
            }
        }
    }

    /// Fails if the transport ended in the middle of a character.
    pub fn finish(&mut self) -> Result<()> {
        if self.carry.is_empty() {
            Ok(())
        } else {
            let dangling = self.carry.len();
            self.carry.clear();
            Err(Error::encoding(
                format!("stream ended inside a UTF-8 sequence ({dangling} dangling bytes)"),
                None,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(fragment: &str) -> FrameEvent {
        FrameEvent::Frame(Frame::Delta(ChatDelta::text(fragment)))
    }

    fn data(fragment: &str) -> String {
        format!(
            "data: {{\"choices\":[{{\"index\":0,\"delta\":{{\"content\":\"{fragment}\"}}}}]}}\n\n"
        )
    }

    #[test]
    fn two_complete_frames_then_partial() {
        let mut parser = FrameParser::new();
        let first = data("a");
        let second = data("b");
        let third = data("c");
        let (third_head, third_tail) = third.split_at(10);

        let events: Vec<_> = parser.feed(&first).collect();
        assert_eq!(events, vec![delta("a")]);

        let chunk = format!("{second}{third_head}");
        let events: Vec<_> = parser.feed(&chunk).collect();
        assert_eq!(events, vec![delta("b")]);
        assert_eq!(parser.pending(), third_head);

        let events: Vec<_> = parser.feed(third_tail).collect();
        assert_eq!(events, vec![delta("c")]);
        assert_eq!(parser.pending(), "");
    }

    #[test]
    fn partial_frame_needs_the_blank_line() {
        let mut parser = FrameParser::new();
        let frame = data("x");
        let body = frame.trim_end_matches('\n');
        assert_eq!(parser.feed(body).count(), 0);
        assert_eq!(parser.feed("\n").count(), 0);
        let events: Vec<_> = parser.feed("\n").collect();
        assert_eq!(events, vec![delta("x")]);
    }

    #[test]
    fn done_terminates_and_discards_the_rest() {
        let mut parser = FrameParser::new();
        let chunk = format!("{}data: [DONE]\n\n{}", data("a"), data("late"));
        let events: Vec<_> = parser.feed(&chunk).collect();
        assert_eq!(events, vec![delta("a"), FrameEvent::Frame(Frame::Done)]);
        assert!(parser.is_finished());
        assert_eq!(parser.feed(&data("later")).count(), 0);
        assert_eq!(parser.pending(), "");
        assert_eq!(parser.finish(), None);
    }

    #[test]
    fn malformed_frame_is_skipped_not_fatal() {
        let mut parser = FrameParser::new();
        let chunk = format!("data: {{not json\n\n{}", data("ok"));
        let events: Vec<_> = parser.feed(&chunk).collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            FrameEvent::Malformed { payload, .. } if payload == "{not json"
        ));
        assert_eq!(events[1], delta("ok"));
        assert!(!parser.is_finished());
    }

    #[test]
    fn non_data_frames_are_dropped() {
        let mut parser = FrameParser::new();
        let chunk = format!(": keep-alive\n\nevent: ping\ndata: {{}}\n\n{}", data("z"));
        let events: Vec<_> = parser.feed(&chunk).collect();
        assert_eq!(events, vec![delta("z")]);
    }

    #[test]
    fn start_marker_is_recognized() {
        let mut parser = FrameParser::new();
        let events: Vec<_> = parser.feed("data: [START]\n\n").collect();
        assert_eq!(events, vec![FrameEvent::Frame(Frame::Start)]);
    }

    #[test]
    fn crlf_separators_split_across_chunks() {
        let mut parser = FrameParser::new();
        assert_eq!(parser.feed("data: [START]\r").count(), 0);
        assert_eq!(parser.feed("\n\r").count(), 0);
        let events: Vec<_> = parser.feed("\ndata: [DONE]\r\n\r\n").collect();
        assert_eq!(
            events,
            vec![
                FrameEvent::Frame(Frame::Start),
                FrameEvent::Frame(Frame::Done)
            ]
        );
    }

    #[test]
    fn dropped_iterator_keeps_unread_frames() {
        let mut parser = FrameParser::new();
        let chunk = format!("{}{}", data("1"), data("2"));
        let first = parser.feed(&chunk).next();
        assert_eq!(first, Some(delta("1")));
        let rest: Vec<_> = parser.feed("").collect();
        assert_eq!(rest, vec![delta("2")]);
    }

    #[test]
    fn finish_flushes_unterminated_frame() {
        let mut parser = FrameParser::new();
        let frame = data("tail");
        assert_eq!(parser.feed(frame.trim_end()).count(), 0);
        assert_eq!(parser.finish(), Some(delta("tail")));
        assert!(parser.is_finished());
    }

    #[test]
    fn oversized_frame_is_discarded_up_to_separator() {
        let mut parser = FrameParser::with_max_frame_bytes(16);
        let events: Vec<_> = parser.feed("data: 0123456789abcdefghij").collect();
        assert_eq!(events, vec![FrameEvent::Oversized { discarded: 26 }]);
        assert_eq!(parser.feed("more garbage").count(), 0);
        let chunk = format!("\n\n{}", data("ok"));
        let events: Vec<_> = parser.feed(&chunk).collect();
        assert_eq!(events, vec![delta("ok")]);
    }

    #[test]
    fn tail_is_bounded() {
        let mut parser = FrameParser::with_max_frame_bytes(64);
        for _ in 0..100 {
            let _ = parser.feed("xxxxxxxx").count();
            assert!(parser.pending().len() <= 64);
        }
    }

    #[test]
    fn utf8_split_across_chunks() {
        let mut decoder = Utf8Decoder::new();
        let bytes = "héllo".as_bytes();
        let first = decoder.decode(&bytes[..2]).unwrap();
        let second = decoder.decode(&bytes[2..]).unwrap();
        assert_eq!(format!("{first}{second}"), "héllo");
        decoder.finish().unwrap();
    }

    #[test]
    fn utf8_invalid_bytes_fail() {
        let mut decoder = Utf8Decoder::new();
        assert!(decoder.decode(&[0xff, 0x41]).is_err());
    }

    #[test]
    fn utf8_dangling_sequence_fails_on_finish() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&[0xc3]).unwrap(), "");
        assert!(decoder.finish().is_err());
    }
}
