//! Interactive streaming chat with Gemini models.
//!
//! # Usage
//!
//! ```bash
//! # Default model (gemini-pro) at temperature 0.7, streamed
//! geminius-chat
//!
//! # Another model, cooler sampling
//! geminius-chat --model gemini-2.0-flash --temperature 0.2
//!
//! # Wait for whole answers and log the traffic
//! geminius-chat --no-stream --log-file /tmp/geminius.jsonl
//! ```
//!
//! The API key is read from `GOOGLE_API_KEY`, which may also live in a `.env`
//! file in the working directory. Type `quit` (or press Ctrl+D) to leave.

use std::io;
use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use utf8path::Path;

use geminius::chat::{ChatArgs, ChatConfig, ChatLoop};
use geminius::{ChatGemini, Gemini, JsonLinesLogger, TokenAccumulator};

/// Main entry point for the geminius-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("geminius-chat [OPTIONS]");
    dotenvy::dotenv().ok();
    let config = ChatConfig::try_from(args)?.with_api_key_from_env();

    let mut client = Gemini::new(config.api_key.clone())?;
    if let Some(path) = config.log_file.as_deref() {
        let logger = JsonLinesLogger::create(&Path::from(path))?;
        client = client.with_logger(Arc::new(logger));
    }

    let model = ChatGemini::from_config(client, &config);
    let mut accumulator = TokenAccumulator::new();
    let mut editor = DefaultEditor::new()?;

    ChatLoop::new(&model, &mut accumulator, io::stdout())
        .run(&mut editor)
        .await?;
    Ok(())
}
