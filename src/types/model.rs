use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Represents a Gemini model identifier.
///
/// This can be a predefined model or a custom string value for models that
/// are newer than this crate (or tuned models).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Model {
    /// Known model versions
    Known(KnownModel),

    /// Custom model identifier
    Custom(String),
}

/// Known Gemini models.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KnownModel {
    /// Gemini 1.0 Pro, the original text model.
    #[serde(rename = "gemini-pro")]
    GeminiPro,

    /// Gemini 1.5 Pro
    #[serde(rename = "gemini-1.5-pro")]
    Gemini15Pro,

    /// Gemini 1.5 Flash
    #[serde(rename = "gemini-1.5-flash")]
    Gemini15Flash,

    /// Gemini 2.0 Flash
    #[serde(rename = "gemini-2.0-flash")]
    Gemini20Flash,

    /// Gemini 2.0 Flash-Lite
    #[serde(rename = "gemini-2.0-flash-lite")]
    Gemini20FlashLite,

    /// Gemini 2.5 Pro
    #[serde(rename = "gemini-2.5-pro")]
    Gemini25Pro,

    /// Gemini 2.5 Flash
    #[serde(rename = "gemini-2.5-flash")]
    Gemini25Flash,
}

impl KnownModel {
    const ALL: [KnownModel; 7] = [
        KnownModel::GeminiPro,
        KnownModel::Gemini15Pro,
        KnownModel::Gemini15Flash,
        KnownModel::Gemini20Flash,
        KnownModel::Gemini20FlashLite,
        KnownModel::Gemini25Pro,
        KnownModel::Gemini25Flash,
    ];

    /// The identifier used in API paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            KnownModel::GeminiPro => "gemini-pro",
            KnownModel::Gemini15Pro => "gemini-1.5-pro",
            KnownModel::Gemini15Flash => "gemini-1.5-flash",
            KnownModel::Gemini20Flash => "gemini-2.0-flash",
            KnownModel::Gemini20FlashLite => "gemini-2.0-flash-lite",
            KnownModel::Gemini25Pro => "gemini-2.5-pro",
            KnownModel::Gemini25Flash => "gemini-2.5-flash",
        }
    }
}

impl Model {
    /// The bare model name, without any leading `models/` resource prefix.
    pub fn name(&self) -> &str {
        match self {
            Model::Known(known) => known.as_str(),
            Model::Custom(custom) => custom.strip_prefix("models/").unwrap_or(custom),
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Model::Known(known_model) => write!(f, "{known_model}"),
            Model::Custom(custom) => write!(f, "{custom}"),
        }
    }
}

impl fmt::Display for KnownModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a known model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelParseError {
    /// The string that failed to parse.
    pub invalid_value: String,
}

impl fmt::Display for ModelParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown model: {}", self.invalid_value)
    }
}

impl std::error::Error for ModelParseError {}

impl FromStr for KnownModel {
    type Err = ModelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix("models/").unwrap_or(s);
        KnownModel::ALL
            .into_iter()
            .find(|known| known.as_str() == name)
            .ok_or_else(|| ModelParseError {
                invalid_value: s.to_string(),
            })
    }
}

impl FromStr for Model {
    type Err = ModelParseError;

    /// Parses a known model; anything else is an error so callers can fall
    /// back to [`Model::Custom`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<KnownModel>().map(Model::Known)
    }
}

impl From<KnownModel> for Model {
    fn from(model: KnownModel) -> Self {
        Model::Known(model)
    }
}

impl From<String> for Model {
    fn from(model: String) -> Self {
        model.parse().unwrap_or(Model::Custom(model))
    }
}

impl From<&str> for Model {
    fn from(model: &str) -> Self {
        Model::from(model.to_string())
    }
}
