//! Server-Sent Events (SSE) parser for Groq responses

use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use std::pin::Pin;

use crate::llm::core::error::LlmError;

use super::types::ChatCompletionChunk;

/// Terminal payload sent after the last chunk
const DONE_MARKER: &str = "[DONE]";

/// Parse a stream of bytes as Groq SSE events
///
/// Groq's SSE format is the OpenAI one:
/// ```text
/// data: {"id":"chatcmpl-...","choices":[{"delta":{"content":"Hi"}}]}
///
/// data: [DONE]
/// ```
///
/// Bytes are buffered until a blank-line boundary so that events (and
/// multi-byte UTF-8 sequences) split across network chunks are reassembled
/// before decoding.
pub fn parse_sse_stream(
    byte_stream: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
) -> Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk, LlmError>> + Send>> {
    let mut buffer: Vec<u8> = Vec::new();

    let event_stream = byte_stream.flat_map(move |chunk_result| {
        let chunk = match chunk_result {
            Ok(bytes) => bytes,
            Err(e) => {
                return futures::stream::iter(vec![Err(LlmError::StreamError(e.to_string()))]);
            }
        };

        buffer.extend_from_slice(&chunk);

        let mut events = Vec::new();
        while let Some((event_end, delimiter_len)) = find_event_boundary(&buffer) {
            let raw: Vec<u8> = buffer.drain(..event_end + delimiter_len).collect();
            let event_text = match std::str::from_utf8(&raw[..event_end]) {
                Ok(text) => text,
                Err(e) => {
                    events.push(Err(LlmError::StreamError(format!(
                        "Invalid UTF-8 in stream: {}",
                        e
                    ))));
                    continue;
                }
            };

            if let Some(parsed_event) = parse_event(event_text) {
                events.push(parsed_event);
            }
        }

        futures::stream::iter(events)
    });

    Box::pin(event_stream)
}

/// Position and length of the first `\n\n` or `\r\n\r\n` delimiter
fn find_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| (i, 4));

    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Parse a single SSE event from its text representation
fn parse_event(event_text: &str) -> Option<Result<ChatCompletionChunk, LlmError>> {
    let mut data = String::new();

    for line in event_text.lines() {
        let line = line.trim();

        // Comments (": keep-alive") and other fields are ignored
        if let Some(data_val) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(data_val.trim());
        }
    }

    if data.is_empty() || data == DONE_MARKER {
        return None;
    }

    match serde_json::from_str::<ChatCompletionChunk>(&data) {
        Ok(chunk) => Some(Ok(chunk)),
        Err(e) => Some(Err(LlmError::SerializationError(format!(
            "Failed to parse Groq SSE event: {}. Data: {}",
            e, data
        )))),
    }
}
