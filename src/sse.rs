//! Server-Sent Events (SSE) processing for streaming responses.
//!
//! `streamGenerateContent?alt=sse` answers with a `text/event-stream` body in
//! which every event carries one JSON-encoded [`GenerateContentResponse`]
//! chunk. This module turns the raw byte stream into a stream of those chunks.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::types::{ApiErrorResponse, GenerateContentResponse};
use crate::{Error, Result};

/// Process a stream of bytes into a stream of response chunks.
///
/// Handles buffering of events split across network reads, both `\n\n` and
/// `\r\n\r\n` event delimiters, and error frames sent after the HTTP status
/// line was already a success.
pub fn process_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<GenerateContentResponse>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    let stream = byte_stream.map(|result| result.map_err(transport_error)).fuse();

    // Raw bytes are buffered so a multi-byte character split across reads
    // decodes once both halves arrive.
    let pending: Vec<u8> = Vec::new();
    let buffer = String::new();

    stream::unfold(
        (stream, pending, buffer),
        move |(mut stream, mut pending, mut buffer)| async move {
            loop {
                if let Some((event, remaining)) = extract_event(&buffer) {
                    buffer = remaining;
                    match event {
                        Some(event) => return Some((event, (stream, pending, buffer))),
                        None => continue,
                    }
                }

                match stream.next().await {
                    Some(Ok(bytes)) => {
                        pending.extend_from_slice(&bytes);
                        match std::str::from_utf8(&pending) {
                            Ok(text) => {
                                buffer.push_str(text);
                                pending.clear();
                            }
                            Err(e) if e.error_len().is_none() => {
                                // Incomplete trailing sequence; keep it for the next read.
                                let valid = e.valid_up_to();
                                if let Ok(text) = std::str::from_utf8(&pending[..valid]) {
                                    buffer.push_str(text);
                                }
                                pending.drain(..valid);
                            }
                            Err(e) => {
                                pending.clear();
                                return Some((
                                    Err(Error::encoding(
                                        format!("Invalid UTF-8 in stream: {e}"),
                                        Some(Box::new(e)),
                                    )),
                                    (stream, pending, buffer),
                                ));
                            }
                        }
                    }
                    Some(Err(e)) => {
                        return Some((Err(e), (stream, pending, buffer)));
                    }
                    None => {
                        if !pending.is_empty() {
                            let len = pending.len();
                            pending.clear();
                            buffer.clear();
                            return Some((
                                Err(Error::encoding(
                                    format!("Stream ended inside a UTF-8 sequence ({len} bytes)"),
                                    None,
                                )),
                                (stream, pending, buffer),
                            ));
                        }
                        // A final event may lack the trailing blank line.
                        if !buffer.trim().is_empty() {
                            let last = std::mem::take(&mut buffer);
                            if let Some(event) = parse_event(&last) {
                                return Some((event, (stream, pending, buffer)));
                            }
                        }
                        return None;
                    }
                }
            }
        },
    )
}

/// Convert a body read failure, keeping timeouts distinguishable.
fn transport_error<E>(e: E) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let mut cause: Option<&(dyn std::error::Error + 'static)> = Some(&e);
    while let Some(err) = cause {
        let timed_out = err
            .downcast_ref::<reqwest::Error>()
            .is_some_and(reqwest::Error::is_timeout)
            || err
                .downcast_ref::<std::io::Error>()
                .is_some_and(|io| io.kind() == std::io::ErrorKind::TimedOut);
        if timed_out {
            return Error::timeout(format!("Stream timed out: {e}"), None);
        }
        cause = err.source();
    }
    Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e)))
}

/// Extract one complete SSE event from the buffer.
///
/// Returns `None` when no complete event is buffered yet; otherwise the
/// parsed event (or `None` for events that carry nothing, such as comments or
/// keep-alives) and the unconsumed rest of the buffer.
fn extract_event(buffer: &str) -> Option<(Option<Result<GenerateContentResponse>>, String)> {
    let lf = buffer.find("\n\n").map(|idx| (idx, 2));
    let crlf = buffer.find("\r\n\r\n").map(|idx| (idx, 4));
    let (idx, len) = match (lf, crlf) {
        (Some(a), Some(b)) => {
            if a.0 <= b.0 {
                a
            } else {
                b
            }
        }
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };
    let event_text = &buffer[..idx];
    let rest = buffer[idx + len..].to_string();
    Some((parse_event(event_text), rest))
}

/// Parse the body of a single SSE event.
fn parse_event(event_text: &str) -> Option<Result<GenerateContentResponse>> {
    let mut data = String::new();
    for line in event_text.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(value) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(data) {
        return Some(Err(error.into()));
    }

    match serde_json::from_str::<GenerateContentResponse>(data) {
        Ok(chunk) => Some(Ok(chunk)),
        Err(e) => Some(Err(Error::serialization(
            format!("Failed to parse event JSON: {e}"),
            Some(Box::new(e)),
        ))),
    }
}
