//! Line-oriented Server-Sent Events decoder.
//!
//! Bytes are fed in as they arrive. Complete lines are split off and the
//! trailing partial line is kept as bytes for the next read, so neither a
//! frame split mid-line nor a multi-byte character split across reads changes
//! the decoded output.

use crate::error::{ChatError, Result};
use crate::types::StreamAccumulator;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";
/// Longest unterminated line kept between reads.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// One complete `data:` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// The raw payload after `data: `.
    Data(String),
    /// `data: [DONE]`
    Done,
}

/// Splits a byte stream into `data:` payloads.
#[derive(Debug, Default)]
pub struct SseDecoder {
    acc: StreamAccumulator,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every complete `data:` line it finished.
    ///
    /// Blank lines, comments and other fields (`event:`, `id:`) are dropped.
    /// Fails once a single line grows past [`MAX_LINE_BYTES`].
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseLine>> {
        self.acc.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();

        while let Some(newline_pos) = self.acc.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.acc.buffer.drain(..=newline_pos).collect();
            if let Some(line) = parse_line(&raw[..raw.len() - 1]) {
                lines.push(line);
            }
        }

        if self.acc.buffer.len() > MAX_LINE_BYTES {
            let len = self.acc.buffer.len();
            self.acc.buffer.clear();
            return Err(ChatError::MalformedResponse(format!(
                "stream line exceeds {} bytes ({} buffered without a newline)",
                MAX_LINE_BYTES, len
            )));
        }
        Ok(lines)
    }

    /// Flush the unterminated last line once the stream has closed.
    pub fn finish(&mut self) -> Option<SseLine> {
        let raw = std::mem::take(&mut self.acc.buffer);
        parse_line(&raw)
    }

    #[cfg(test)]
    pub fn remaining_buffer(&self) -> &[u8] {
        &self.acc.buffer
    }

    /// Record a decoded delta. Returns false for empty deltas.
    pub fn push_delta(&mut self, delta: &str) -> bool {
        self.acc.push_delta(delta)
    }

    pub fn into_content(self) -> String {
        self.acc.full_content
    }
}

fn parse_line(raw: &[u8]) -> Option<SseLine> {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim_end_matches('\r');
    if line.trim().is_empty() {
        return None;
    }
    let data = line.strip_prefix(DATA_PREFIX)?;
    if data.trim() == DONE_SENTINEL {
        return Some(SseLine::Done);
    }
    Some(SseLine::Data(data.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(s: &str) -> SseLine {
        SseLine::Data(s.to_string())
    }

    #[test]
    fn test_single_frame() {
        let mut decoder = SseDecoder::new();
        let lines = decoder.feed(b"data: {\"a\":1}\n\n").unwrap();
        assert_eq!(lines, vec![data("{\"a\":1}")]);
        assert!(decoder.remaining_buffer().is_empty());
    }

    #[test]
    fn test_frame_split_mid_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"choi").unwrap().is_empty());
        assert_eq!(decoder.remaining_buffer(), b"data: {\"choi");
        let lines = decoder.feed(b"ces\":[]}\n").unwrap();
        assert_eq!(lines, vec![data("{\"choices\":[]}")]);
    }

    #[test]
    fn test_multibyte_character_split_across_reads() {
        let text = "data: 世界\n".as_bytes();
        let mut decoder = SseDecoder::new();
        let mut lines = Vec::new();
        // Split inside the first three-byte character.
        lines.extend(decoder.feed(&text[..7]).unwrap());
        lines.extend(decoder.feed(&text[7..]).unwrap());
        assert_eq!(lines, vec![data("世界")]);
    }

    #[test]
    fn test_done_sentinel_and_crlf() {
        let mut decoder = SseDecoder::new();
        let lines = decoder.feed(b"data: x\r\n\r\ndata: [DONE]\r\n").unwrap();
        assert_eq!(lines, vec![data("x"), SseLine::Done]);
    }

    #[test]
    fn test_ignores_comments_and_other_fields() {
        let mut decoder = SseDecoder::new();
        let lines = decoder
            .feed(b": keep-alive\nevent: delta\nid: 7\ndata:no-space\ndata: y\n")
            .unwrap();
        assert_eq!(lines, vec![data("y")]);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: tail").unwrap().is_empty());
        assert_eq!(decoder.finish(), Some(data("tail")));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_byte_at_a_time_matches_whole() {
        let stream = b"data: one\n\ndata: two\n\ndata: [DONE]\n\n";
        let mut whole = SseDecoder::new();
        let expected = whole.feed(stream).unwrap();

        let mut split = SseDecoder::new();
        let mut got = Vec::new();
        for byte in stream.chunks(1) {
            got.extend(split.feed(byte).unwrap());
        }
        assert_eq!(got, expected);
        assert_eq!(got, vec![data("one"), data("two"), SseLine::Done]);
    }

    #[test]
    fn test_unterminated_line_is_capped() {
        let mut decoder = SseDecoder::new();
        let chunk = vec![b'a'; MAX_LINE_BYTES / 2];
        assert!(decoder.feed(b"data: ").unwrap().is_empty());
        assert!(decoder.feed(&chunk).unwrap().is_empty());
        let err = decoder.feed(&chunk).unwrap_err();
        assert!(matches!(err, ChatError::MalformedResponse(_)));
        assert!(decoder.remaining_buffer().is_empty());
    }

    #[test]
    fn test_long_terminated_line_is_fine() {
        let mut line = b"data: ".to_vec();
        line.extend(vec![b'x'; MAX_LINE_BYTES]);
        line.push(b'\n');
        let mut decoder = SseDecoder::new();
        let lines = decoder.feed(&line).unwrap();
        assert_eq!(lines.len(), 1);
    }
}
