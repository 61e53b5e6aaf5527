//! Interactive streaming chat on top of the geminius client.
//!
//! This module provides the REPL behind `geminius-chat`:
//!
//! - Streaming responses echoed token by token through a [`StreamObserver`]
//! - A final, bullet-formatted copy of every answer
//! - Configurable model, temperature and streaming mode
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`repl`]: the read-eval-print state machine
//!
//! [`StreamObserver`]: crate::StreamObserver

mod config;
mod repl;

pub use config::{ChatArgs, ChatArgsError, ChatConfig, DEFAULT_TEMPERATURE};
pub use repl::{
    ChatLoop, EXIT_KEYWORD, INPUT_PROMPT, LineSource, LoopState, LoopSummary, format_response,
};
