//! Streaming observer that echoes fragments live and prints a summary.

use std::io::{self, Stdout, Write};

use crate::Error;
use crate::chat_model::StreamObserver;

/// Printed at end-of-stream when nothing was received.
pub const NO_RESPONSE_PLACEHOLDER: &str = "No response generated.";

/// Accumulates streamed fragments into a buffer.
///
/// Every fragment is written and flushed as soon as it arrives so the user
/// watches generation happen. At end-of-stream the whole buffer is written
/// once more as a labeled block, and the buffer is cleared so the same
/// accumulator can serve the next turn.
pub struct TokenAccumulator<W: Write + Send = Stdout> {
    out: W,
    buffer: String,
}

impl TokenAccumulator<Stdout> {
    /// Creates an accumulator that writes to stdout.
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl Default for TokenAccumulator<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> TokenAccumulator<W> {
    /// Creates an accumulator that writes to `out`.
    pub fn with_writer(out: W) -> Self {
        Self {
            out,
            buffer: String::new(),
        }
    }

    /// Text received since the last end-of-stream or error.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Discard any buffered text without printing it.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// The underlying writer.
    pub fn writer(&self) -> &W {
        &self.out
    }

    // Display output must never interrupt the call it is observing.
    fn emit(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }
}

impl<W: Write + Send> StreamObserver for TokenAccumulator<W> {
    fn on_fragment(&mut self, fragment: &str) {
        self.buffer.push_str(fragment);
        self.emit(fragment);
    }

    fn on_stream_end(&mut self) {
        let summary = if self.buffer.is_empty() {
            format!("\nAI Response: {NO_RESPONSE_PLACEHOLDER}\n\n")
        } else {
            format!("\nAI Response:\n{}\n\n", self.buffer)
        };
        self.emit(&summary);
        self.reset();
    }

    fn on_stream_error(&mut self, error: &Error) {
        _ = error;
        self.reset();
    }
}
