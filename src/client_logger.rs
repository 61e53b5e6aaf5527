//! Logging trait for Gemini client operations.
//!
//! This module provides the [`ClientLogger`] trait that allows users to capture
//! all API interactions passing through the [`Gemini`](crate::Gemini) client,
//! and [`JsonLinesLogger`], which appends them to a file as JSON lines.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::sync::Mutex;

use serde_json::json;
use utf8path::Path;

use crate::types::{GenerateContentRequest, GenerateContentResponse, Model};
use crate::{Error, Result};

/// A trait for logging Gemini client operations.
///
/// Implementations must not fail the call they observe; errors while logging
/// are theirs to swallow.
pub trait ClientLogger: Send + Sync {
    /// Log an outgoing request, streaming or not.
    fn log_request(&self, model: &Model, request: &GenerateContentRequest);

    /// Log a complete response from a non-streaming `send` call.
    fn log_response(&self, response: &GenerateContentResponse);

    /// Log an individual chunk received during a streaming request.
    fn log_stream_chunk(&self, chunk: &GenerateContentResponse);
}

/// A [`ClientLogger`] that appends one JSON object per line to a file.
///
/// Each line has the shape `{"kind": "...", ...}` where kind is one of
/// `request`, `response` or `stream_chunk`.
pub struct JsonLinesLogger {
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesLogger {
    /// Open (or create) `path` for appending.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_str())
            .map_err(|err| Error::io(format!("failed to open log file {}", path.as_str()), err))?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    fn write_line(&self, line: serde_json::Value) {
        let Ok(mut writer) = self.writer.lock() else {
            return;
        };
        if serde_json::to_writer(&mut *writer, &line).is_ok() {
            let _ = writer.write_all(b"\n");
            let _ = writer.flush();
        }
    }
}

impl ClientLogger for JsonLinesLogger {
    fn log_request(&self, model: &Model, request: &GenerateContentRequest) {
        self.write_line(json!({
            "kind": "request",
            "model": model.name(),
            "request": request,
        }));
    }

    fn log_response(&self, response: &GenerateContentResponse) {
        self.write_line(json!({
            "kind": "response",
            "response": response,
        }));
    }

    fn log_stream_chunk(&self, chunk: &GenerateContentResponse) {
        self.write_line(json!({
            "kind": "stream_chunk",
            "chunk": chunk,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Content, KnownModel};

    #[test]
    fn writes_one_json_object_per_line() {
        let path = std::env::temp_dir().join(format!(
            "geminius-logger-{}.jsonl",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let path_str = path.to_str().unwrap().to_string();

        let logger = JsonLinesLogger::create(&Path::from(path_str.as_str())).unwrap();
        let model = Model::Known(KnownModel::GeminiPro);
        logger.log_request(&model, &GenerateContentRequest::new(vec![Content::user("hi")]));
        logger.log_stream_chunk(&GenerateContentResponse::default());
        drop(logger);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["kind"], "request");
        assert_eq!(lines[0]["model"], "gemini-pro");
        assert_eq!(lines[0]["request"]["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(lines[1]["kind"], "stream_chunk");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn create_fails_for_missing_directory() {
        let result = JsonLinesLogger::create(&Path::from("/nonexistent-geminius-dir/log.jsonl"));
        assert!(matches!(result, Err(Error::Io { .. })));
    }
}
