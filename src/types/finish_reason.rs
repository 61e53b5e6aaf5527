use serde::{Deserialize, Serialize};
use std::fmt;

/// Reasons why the model stopped generating a candidate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinishReason {
    /// Default value; unused by the API in practice.
    FinishReasonUnspecified,

    /// Natural stop point or a stop sequence.
    Stop,

    /// The maximum number of output tokens was reached.
    MaxTokens,

    /// The candidate was flagged for safety reasons.
    Safety,

    /// The candidate was flagged for recitation.
    Recitation,

    /// The candidate used an unsupported language.
    Language,

    /// Unknown reason.
    Other,

    /// The candidate contained forbidden terms.
    Blocklist,

    /// The candidate contained prohibited content.
    ProhibitedContent,

    /// The candidate contained sensitive personally identifiable information.
    Spii,

    /// The model produced an invalid function call.
    MalformedFunctionCall,

    /// A value newer than this crate.
    #[serde(other)]
    Unrecognized,
}

impl FinishReason {
    /// Returns true if generation ended normally.
    pub fn is_stop(&self) -> bool {
        matches!(self, FinishReason::Stop)
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FinishReason::FinishReasonUnspecified => "FINISH_REASON_UNSPECIFIED",
            FinishReason::Stop => "STOP",
            FinishReason::MaxTokens => "MAX_TOKENS",
            FinishReason::Safety => "SAFETY",
            FinishReason::Recitation => "RECITATION",
            FinishReason::Language => "LANGUAGE",
            FinishReason::Other => "OTHER",
            FinishReason::Blocklist => "BLOCKLIST",
            FinishReason::ProhibitedContent => "PROHIBITED_CONTENT",
            FinishReason::Spii => "SPII",
            FinishReason::MalformedFunctionCall => "MALFORMED_FUNCTION_CALL",
            FinishReason::Unrecognized => "UNRECOGNIZED",
        };
        f.write_str(s)
    }
}
