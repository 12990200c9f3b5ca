//! Newline-delimited JSON framing for the chat reply stream
//!
//! The body arrives as arbitrary byte chunks. Bytes go through a stateful
//! UTF-8 decoder first, then the decoded text is cut into `\n`-terminated
//! records, and each record is parsed as a [`StreamFrame`].

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::ChatError;

/// One record of the reply stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StreamFrame {
    #[serde(default)]
    response_chunk: Option<String>,
}

impl StreamFrame {
    /// The text to append; a missing or null field counts as empty.
    pub fn text(&self) -> &str {
        self.response_chunk.as_deref().unwrap_or("")
    }
}

/// Parse a complete record. Anything that is not a JSON object is rejected.
pub fn parse_frame(line: &str) -> Result<StreamFrame, ChatError> {
    // The derived struct visitor also takes sequences, so check the shape first
    let frame = match serde_json::from_str(line) {
        Ok(Value::Object(map)) => serde_json::from_value(Value::Object(map)),
        Ok(other) => Err(serde_json::Error::custom(format!(
            "expected a JSON object, found {}",
            json_kind(&other)
        ))),
        Err(e) => Err(e),
    };
    frame.map_err(|source| ChatError::FrameParse {
        line: line.to_string(),
        source,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// How records that straddle a chunk boundary are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramingMode {
    /// Split each chunk on its own. A record cut by a chunk boundary is
    /// dropped, both its head and the tail that opens the next chunk.
    #[default]
    PerChunk,
    /// Carry the partial line across chunks so no record is lost.
    Buffered,
}

impl FramingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FramingMode::PerChunk => "per_chunk",
            FramingMode::Buffered => "buffered",
        }
    }
}

impl fmt::Display for FramingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FramingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "per_chunk" | "chunk" => Ok(FramingMode::PerChunk),
            "buffered" | "buffer" => Ok(FramingMode::Buffered),
            other => Err(format!("unknown framing mode: {}", other)),
        }
    }
}

/// Incremental UTF-8 decoder.
///
/// An incomplete sequence at the end of a chunk is held back until the next
/// chunk completes it. Invalid bytes become U+FFFD instead of failing.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Truncated sequence, wait for the next chunk
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush at end of stream. A sequence that never completed decodes to
    /// a single replacement character.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

/// Splits decoded text into complete, non-blank records.
#[derive(Debug)]
pub struct LineFramer {
    mode: FramingMode,
    partial: String,
    mid_record: bool,
}

impl LineFramer {
    pub fn new(mode: FramingMode) -> Self {
        Self {
            mode,
            partial: String::new(),
            mid_record: false,
        }
    }

    pub fn push(&mut self, text: &str) -> Vec<String> {
        match self.mode {
            FramingMode::PerChunk => self.push_per_chunk(text),
            FramingMode::Buffered => self.push_buffered(text),
        }
    }

    /// Records still owed at end of stream. Only buffered framing can have
    /// one: a final line the server never terminated.
    pub fn finish(&mut self) -> Option<String> {
        match self.mode {
            FramingMode::PerChunk => None,
            FramingMode::Buffered => {
                let rest = std::mem::take(&mut self.partial);
                (!is_blank(&rest)).then_some(rest)
            }
        }
    }

    fn push_per_chunk(&mut self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        let Some(last_newline) = text.rfind('\n') else {
            if !is_blank(text) {
                warn!(bytes = text.len(), "dropping record fragment without line terminator");
                self.mid_record = true;
            }
            return Vec::new();
        };

        let (complete, tail) = (&text[..last_newline], &text[last_newline + 1..]);
        let mut lines = complete.split('\n');

        if self.mid_record {
            if let Some(rest) = lines.next() {
                warn!(bytes = rest.len(), "dropping tail of record split across chunks");
            }
        }

        let records = lines
            .filter(|line| !is_blank(line))
            .map(str::to_string)
            .collect();

        self.mid_record = !is_blank(tail);
        if self.mid_record {
            warn!(bytes = tail.len(), "dropping partial record at chunk boundary");
        }

        records
    }

    fn push_buffered(&mut self, text: &str) -> Vec<String> {
        self.partial.push_str(text);

        let Some(last_newline) = self.partial.rfind('\n') else {
            return Vec::new();
        };

        let rest = self.partial.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.partial, rest);
        complete
            .split('\n')
            .filter(|line| !is_blank(line))
            .map(str::to_string)
            .collect()
    }
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Bytes in, complete records out.
#[derive(Debug)]
pub struct FrameDecoder {
    utf8: Utf8Decoder,
    lines: LineFramer,
}

impl FrameDecoder {
    pub fn new(mode: FramingMode) -> Self {
        Self {
            utf8: Utf8Decoder::new(),
            lines: LineFramer::new(mode),
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.utf8.decode(chunk);
        self.lines.push(&text)
    }

    pub fn finish(&mut self) -> Vec<String> {
        let tail = self.utf8.finish();
        let mut records = self.lines.push(&tail);
        records.extend(self.lines.finish());
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(mode: FramingMode, chunks: &[&[u8]]) -> Vec<String> {
        let mut decoder = FrameDecoder::new(mode);
        let mut records = Vec::new();
        for chunk in chunks {
            records.extend(decoder.push(chunk));
        }
        records.extend(decoder.finish());
        records
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let bytes = "héllo €".as_bytes();
        // 'é' is 2 bytes starting at index 1, '€' is 3 bytes at the end
        let mut decoder = Utf8Decoder::new();
        let mut out = decoder.decode(&bytes[..2]);
        out.push_str(&decoder.decode(&bytes[2..bytes.len() - 1]));
        out.push_str(&decoder.decode(&bytes[bytes.len() - 1..]));
        out.push_str(&decoder.finish());
        assert_eq!(out, "héllo €");
    }

    #[test]
    fn test_utf8_one_byte_at_a_time() {
        let text = "日本語 ✓";
        let mut decoder = Utf8Decoder::new();
        let out: String = text
            .as_bytes()
            .iter()
            .map(|b| decoder.decode(std::slice::from_ref(b)))
            .collect();
        assert_eq!(out, text);
    }

    #[test]
    fn test_utf8_invalid_and_truncated_bytes() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
        assert_eq!(decoder.decode(b"c\xe2\x82"), "c");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_per_chunk_several_records_in_one_chunk() {
        let records = decode_all(
            FramingMode::PerChunk,
            &[b"{\"response_chunk\":\"a\"}\n\n{\"response_chunk\":\"b\"}\n"],
        );
        assert_eq!(
            records,
            vec![r#"{"response_chunk":"a"}"#, r#"{"response_chunk":"b"}"#]
        );
    }

    #[test]
    fn test_per_chunk_drops_record_split_across_chunks() {
        let records = decode_all(
            FramingMode::PerChunk,
            &[
                b"{\"response_chunk\":\"A\"}\n{\"resp",
                b"onse_chunk\":",
                b"\"B\"}\n{\"response_chunk\":\"C\"}\n",
            ],
        );
        assert_eq!(
            records,
            vec![r#"{"response_chunk":"A"}"#, r#"{"response_chunk":"C"}"#]
        );
    }

    #[test]
    fn test_per_chunk_drops_unterminated_final_record() {
        let records = decode_all(
            FramingMode::PerChunk,
            &[b"{\"response_chunk\":\"A\"}\n", b"{\"response_chunk\":\"B\"}"],
        );
        assert_eq!(records, vec![r#"{"response_chunk":"A"}"#]);
    }

    #[test]
    fn test_per_chunk_whitespace_tail_does_not_swallow_next_record() {
        let records = decode_all(
            FramingMode::PerChunk,
            &[b"{\"response_chunk\":\"A\"}\n  ", b"{\"response_chunk\":\"B\"}\n"],
        );
        assert_eq!(
            records,
            vec![r#"{"response_chunk":"A"}"#, r#"{"response_chunk":"B"}"#]
        );
    }

    #[test]
    fn test_buffered_reassembles_split_records() {
        let records = decode_all(
            FramingMode::Buffered,
            &[
                b"{\"response_chunk\":\"A\"}\n{\"resp",
                b"onse_chunk\":",
                b"\"B\"}\n{\"response_chunk\":\"C\"}",
            ],
        );
        assert_eq!(
            records,
            vec![
                r#"{"response_chunk":"A"}"#,
                r#"{"response_chunk":"B"}"#,
                r#"{"response_chunk":"C"}"#,
            ]
        );
    }

    #[test]
    fn test_multibyte_character_split_inside_record() {
        let line = "{\"response_chunk\":\"café\"}\n".as_bytes();
        let split = line.iter().position(|&b| b == 0xc3).unwrap() + 1;
        let records = decode_all(FramingMode::Buffered, &[&line[..split], &line[split..]]);
        assert_eq!(parse_frame(&records[0]).unwrap().text(), "café");
    }

    #[test]
    fn test_parse_frame_missing_and_null_chunk() {
        assert_eq!(parse_frame("{}").unwrap().text(), "");
        assert_eq!(parse_frame(r#"{"response_chunk":null}"#).unwrap().text(), "");
        assert_eq!(
            parse_frame("{\"response_chunk\":\"x\",\"done\":true}\r").unwrap().text(),
            "x"
        );
    }

    #[test]
    fn test_parse_frame_rejects_garbage() {
        let err = parse_frame("not json").unwrap_err();
        assert_eq!(err.kind(), "frame_parse");
        assert!(parse_frame("42").is_err());
    }

    #[test]
    fn test_parse_frame_rejects_arrays() {
        for line in [r#"["x"]"#, "[]", "null", r#""x""#] {
            let err = parse_frame(line).unwrap_err();
            assert_eq!(err.kind(), "frame_parse", "accepted {}", line);
        }
        match parse_frame(r#"["x"]"#) {
            Err(ChatError::FrameParse { line, source }) => {
                assert_eq!(line, r#"["x"]"#);
                assert!(source.to_string().contains("an array"));
            }
            other => panic!("expected a frame parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_framing_mode_from_str() {
        assert_eq!("per_chunk".parse::<FramingMode>(), Ok(FramingMode::PerChunk));
        assert_eq!("Buffered".parse::<FramingMode>(), Ok(FramingMode::Buffered));
        assert_eq!("per-chunk".parse::<FramingMode>(), Ok(FramingMode::PerChunk));
        assert!("lines".parse::<FramingMode>().is_err());
    }
}
