//! The interactive read-eval-print loop.
//!
//! [`ChatLoop`] is an explicit state machine over [`LoopState`]: it waits for
//! a line, issues at most one model call for it, prints the outcome, and goes
//! back to waiting until the user types the exit keyword.

use std::io::{self, Write};
use std::time::Instant;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::chat_model::{LanguageModel, StreamObserver};
use crate::observability::{CHAT_TURN_DURATION, CHAT_TURN_ERRORS, CHAT_TURNS};
use crate::types::Content;
use crate::{Error, Result};

/// Typing this (any case, surrounding whitespace ignored) ends the session.
pub const EXIT_KEYWORD: &str = "quit";

/// Prompt shown when waiting for input.
pub const INPUT_PROMPT: &str = "You: ";

const BANNER: &str = "\nWelcome to Interactive Streaming Chat!\nType 'quit' to exit\n";
const RULE_WIDTH: usize = 50;
const AI_MARKER: &str = "\nAI: ";
const FAREWELL: &str = "\nGoodbye!\n";

/// A source of input lines.
pub trait LineSource {
    /// Show `prompt` and read one line.
    ///
    /// Returns `Ok(None)` at end of input.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

impl LineSource for DefaultEditor {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            // Ctrl+C at the prompt discards the line, not the session.
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(ReadlineError::Eof) => Ok(None),
            Err(err) => Err(Error::io(
                format!("Input error: {err}"),
                io::Error::other(err.to_string()),
            )),
        }
    }
}

/// Where the loop is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting for the next line.
    AwaitingInput,

    /// A model call for this text is about to be issued.
    Calling(String),

    /// The user asked to leave. Terminal.
    Done,
}

impl LoopState {
    /// The state a line of input leads to from [`LoopState::AwaitingInput`].
    pub fn after_input(line: &str) -> LoopState {
        let line = line.trim();
        if line.eq_ignore_ascii_case(EXIT_KEYWORD) {
            LoopState::Done
        } else if line.is_empty() {
            LoopState::AwaitingInput
        } else {
            LoopState::Calling(line.to_string())
        }
    }
}

/// Counters returned when the loop ends.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LoopSummary {
    /// Model calls issued.
    pub turns: u64,

    /// Calls that failed.
    pub failures: u64,
}

/// Marks every line break of a final response with a bullet.
pub fn format_response(content: &str) -> String {
    content.replace('\n', "\n* ")
}

/// The interactive chat loop.
///
/// Holds the model handle and the stream observer for the whole session; each
/// turn sends a single user message with no history.
pub struct ChatLoop<'a, W: Write> {
    model: &'a dyn LanguageModel,
    observer: &'a mut dyn StreamObserver,
    out: W,
    state: LoopState,
    summary: LoopSummary,
}

impl<'a, W: Write> ChatLoop<'a, W> {
    /// Creates a loop that prints to `out`.
    pub fn new(model: &'a dyn LanguageModel, observer: &'a mut dyn StreamObserver, out: W) -> Self {
        Self {
            model,
            observer,
            out,
            state: LoopState::AwaitingInput,
            summary: LoopSummary::default(),
        }
    }

    /// The current state.
    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Prints the banner and runs until [`LoopState::Done`].
    ///
    /// Call failures are reported and the loop continues; only input and
    /// output errors end it early.
    pub async fn run(&mut self, input: &mut dyn LineSource) -> Result<LoopSummary> {
        self.say(BANNER)?;
        self.say(&format!("{}\n", "-".repeat(RULE_WIDTH)))?;
        while self.state != LoopState::Done {
            self.step(input).await?;
        }
        Ok(self.summary)
    }

    /// Performs one transition.
    pub async fn step(&mut self, input: &mut dyn LineSource) -> Result<&LoopState> {
        let next = match std::mem::replace(&mut self.state, LoopState::AwaitingInput) {
            LoopState::AwaitingInput => self.await_input(input)?,
            LoopState::Calling(text) => self.call(text).await?,
            LoopState::Done => LoopState::Done,
        };
        self.state = next;
        Ok(&self.state)
    }

    fn await_input(&mut self, input: &mut dyn LineSource) -> Result<LoopState> {
        self.say("\n")?;
        let next = match input.read_line(INPUT_PROMPT)? {
            Some(line) => LoopState::after_input(&line),
            None => LoopState::Done,
        };
        if next == LoopState::Done {
            self.say(FAREWELL)?;
        }
        Ok(next)
    }

    async fn call(&mut self, text: String) -> Result<LoopState> {
        self.say(AI_MARKER)?;
        CHAT_TURNS.click();
        self.summary.turns += 1;

        let start = Instant::now();
        let result = self
            .model
            .invoke(vec![Content::user(text)], &mut *self.observer)
            .await;
        CHAT_TURN_DURATION.add(start.elapsed().as_secs_f64());

        match result {
            Ok(message) => {
                let formatted = format_response(&message.content);
                self.say(&format!("\nAI Response:  {formatted}\n"))?;
            }
            Err(err) => {
                CHAT_TURN_ERRORS.click();
                self.summary.failures += 1;
                self.say(&format!("\nError: {err}\n"))?;
            }
        }
        Ok(LoopState::AwaitingInput)
    }

    fn say(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}
