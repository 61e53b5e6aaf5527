//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and the session
//! configuration the chat loop runs with.

use std::fmt;

use arrrg_derive::CommandLine;

use crate::API_KEY_ENV;
use crate::types::{KnownModel, Model};

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Command-line arguments for the geminius-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: gemini-pro)", "MODEL")]
    pub model: Option<String>,

    /// Sampling temperature.
    #[arrrg(optional, "Sampling temperature, 0.0 to 1.0 (default: 0.7)", "TEMP")]
    pub temperature: Option<String>,

    /// Disable token streaming.
    #[arrrg(flag, "Wait for the whole response instead of streaming tokens")]
    pub no_stream: bool,

    /// Log every request and response to a file.
    #[arrrg(optional, "Append API requests/responses to PATH as JSON lines", "PATH")]
    pub log_file: Option<String>,
}

/// Error produced when command-line arguments cannot form a [`ChatConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatArgsError {
    /// The temperature was not a number in `0.0..=1.0`.
    InvalidTemperature(String),
}

impl fmt::Display for ChatArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatArgsError::InvalidTemperature(value) => {
                write!(
                    f,
                    "--temperature expects a number between 0.0 and 1.0, got {value:?}"
                )
            }
        }
    }
}

impl std::error::Error for ChatArgsError {}

/// Configuration for a chat session.
///
/// Built once at startup and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// The model to use for generating responses.
    pub model: Model,

    /// Sampling temperature.
    pub temperature: f32,

    /// Whether responses are streamed token by token.
    pub streaming: bool,

    /// API credential, filled from `GOOGLE_API_KEY` by
    /// [`ChatConfig::with_api_key_from_env`].
    pub api_key: Option<String>,

    /// Where to log requests and responses, if anywhere.
    pub log_file: Option<String>,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: gemini-pro
    /// - Temperature: 0.7
    /// - Streaming: enabled
    pub fn new() -> Self {
        Self {
            model: Model::Known(KnownModel::GeminiPro),
            temperature: DEFAULT_TEMPERATURE,
            streaming: true,
            api_key: None,
            log_file: None,
        }
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Enables or disables streaming.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Sets the API key explicitly.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Fills in the API key from `GOOGLE_API_KEY` unless one is already set.
    pub fn with_api_key_from_env(self) -> Self {
        let from_env = std::env::var(API_KEY_ENV).ok();
        self.with_fallback_api_key(from_env)
    }

    fn with_fallback_api_key(mut self, candidate: Option<String>) -> Self {
        if self.api_key.is_none() {
            self.api_key = candidate.filter(|key| !key.trim().is_empty());
        }
        self
    }

    /// Sets the request/response log file.
    pub fn with_log_file(mut self, path: Option<String>) -> Self {
        self.log_file = path;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_temperature(value: &str) -> Result<f32, ChatArgsError> {
    match value.trim().parse::<f32>() {
        Ok(t) if (0.0..=1.0).contains(&t) => Ok(t),
        _ => Err(ChatArgsError::InvalidTemperature(value.to_string())),
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = ChatArgsError;

    fn try_from(args: ChatArgs) -> Result<Self, Self::Error> {
        let model = args
            .model
            .map(Model::from)
            .unwrap_or(Model::Known(KnownModel::GeminiPro));
        let temperature = match args.temperature.as_deref() {
            Some(value) => parse_temperature(value)?,
            None => DEFAULT_TEMPERATURE,
        };

        Ok(ChatConfig {
            model,
            temperature,
            streaming: !args.no_stream,
            log_file: args.log_file,
            ..ChatConfig::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert_eq!(config.model, Model::Known(KnownModel::GeminiPro));
        assert_eq!(config.temperature, 0.7);
        assert!(config.streaming);
        assert!(config.api_key.is_none());
        assert!(config.log_file.is_none());
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::try_from(ChatArgs::default()).unwrap();
        assert_eq!(config, ChatConfig::new());
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            model: Some("gemini-2.0-flash".to_string()),
            temperature: Some("0.25".to_string()),
            no_stream: true,
            log_file: Some("/tmp/geminius.jsonl".to_string()),
        };
        let config = ChatConfig::try_from(args).unwrap();
        assert_eq!(config.model, Model::Known(KnownModel::Gemini20Flash));
        assert_eq!(config.temperature, 0.25);
        assert!(!config.streaming);
        assert_eq!(config.log_file.as_deref(), Some("/tmp/geminius.jsonl"));
    }

    #[test]
    fn unknown_model_is_custom() {
        let args = ChatArgs {
            model: Some("gemini-exp-1206".to_string()),
            ..ChatArgs::default()
        };
        let config = ChatConfig::try_from(args).unwrap();
        assert_eq!(config.model, Model::Custom("gemini-exp-1206".to_string()));
    }

    #[test]
    fn temperature_must_be_in_range() {
        for bad in ["1.5", "-0.1", "warm", "NaN"] {
            let args = ChatArgs {
                temperature: Some(bad.to_string()),
                ..ChatArgs::default()
            };
            assert_eq!(
                ChatConfig::try_from(args),
                Err(ChatArgsError::InvalidTemperature(bad.to_string()))
            );
        }
        assert_eq!(parse_temperature("0"), Ok(0.0));
        assert_eq!(parse_temperature(" 1.0 "), Ok(1.0));
    }

    #[test]
    fn api_key_fallback() {
        let config = ChatConfig::new().with_fallback_api_key(Some("from-env".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("from-env"));

        let config = ChatConfig::new()
            .with_api_key("explicit")
            .with_fallback_api_key(Some("from-env".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("explicit"));

        let config = ChatConfig::new().with_fallback_api_key(Some("  ".to_string()));
        assert!(config.api_key.is_none());
        assert!(ChatConfig::new().with_fallback_api_key(None).api_key.is_none());
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new()
            .with_model(Model::Known(KnownModel::Gemini25Flash))
            .with_temperature(0.1)
            .with_streaming(false)
            .with_api_key("k")
            .with_log_file(Some("log.jsonl".to_string()));
        assert_eq!(config.model, Model::Known(KnownModel::Gemini25Flash));
        assert_eq!(config.temperature, 0.1);
        assert!(!config.streaming);
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.log_file.as_deref(), Some("log.jsonl"));
    }
}
