use serde::{Deserialize, Serialize};

use crate::types::{Content, FinishReason};

/// Token accounting for a request.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    /// Tokens in the prompt.
    #[serde(default)]
    pub prompt_token_count: u32,

    /// Tokens across all generated candidates.
    #[serde(default)]
    pub candidates_token_count: u32,

    /// Prompt plus candidates.
    #[serde(default)]
    pub total_token_count: u32,
}

/// Feedback about the prompt, set when the prompt itself was blocked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    /// Why the prompt was blocked, if it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
}

/// A response candidate generated by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Generated content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,

    /// Why the model stopped, present on the final chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,

    /// Index of the candidate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

/// A full response from `generateContent`, or one chunk of a
/// `streamGenerateContent` stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    /// Candidate responses.
    #[serde(default)]
    pub candidates: Vec<Candidate>,

    /// Prompt feedback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_feedback: Option<PromptFeedback>,

    /// Token usage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,

    /// The model version that produced the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl GenerateContentResponse {
    /// The first candidate, which is the only one unless `candidateCount` is set.
    pub fn first_candidate(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    /// Text parts of the first candidate, in order.
    pub fn text_parts(&self) -> impl Iterator<Item = &str> {
        self.first_candidate()
            .and_then(|candidate| candidate.content.as_ref())
            .into_iter()
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| part.answer_text())
    }

    /// Concatenated text of the first candidate.
    pub fn text(&self) -> String {
        self.text_parts().collect()
    }

    /// Finish reason of the first candidate.
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.first_candidate()
            .and_then(|candidate| candidate.finish_reason)
    }

    /// The block reason when the prompt was rejected outright.
    pub fn block_reason(&self) -> Option<&str> {
        if !self.candidates.is_empty() {
            return None;
        }
        self.prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
    }
}
