use serde::{Deserialize, Serialize};

use crate::types::{Content, GenerationConfig};

/// Request body for `generateContent` and `streamGenerateContent`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// The conversation so far, oldest first.
    pub contents: Vec<Content>,

    /// Developer-set system instruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,

    /// Sampling and output options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    /// Create a request from the given contents.
    pub fn new(contents: Vec<Content>) -> Self {
        Self {
            contents,
            system_instruction: None,
            generation_config: None,
        }
    }

    /// Set a system instruction.
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(Content::instruction(instruction));
        self
    }

    /// Set the generation config; an empty config is dropped from the body.
    pub fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = if config.is_empty() {
            None
        } else {
            Some(config)
        };
        self
    }
}
