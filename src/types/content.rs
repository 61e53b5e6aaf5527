use serde::{Deserialize, Serialize};

/// The producer of a piece of [`Content`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Content authored by the user.
    User,

    /// Content produced by the model.
    Model,
}

/// A single part of a multi-part [`Content`].
///
/// Only text parts are modelled; other part kinds the API may return are
/// deserialized as parts without text and ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Inline text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Set when the part is a thought summary rather than answer text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

impl Part {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            thought: None,
        }
    }

    /// Returns the answer text of this part, skipping thought parts.
    pub fn answer_text(&self) -> Option<&str> {
        if self.thought.unwrap_or(false) {
            return None;
        }
        self.text.as_deref()
    }
}

/// The base structured datatype of a conversation turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// The producer of the content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Ordered parts making up the content.
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// Create content with a role and a single text part.
    pub fn new_with_text(text: impl Into<String>, role: Role) -> Self {
        Self {
            role: Some(role),
            parts: vec![Part::text(text)],
        }
    }

    /// Create a user turn with the given text.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new_with_text(text, Role::User)
    }

    /// Create a model turn with the given text.
    pub fn model(text: impl Into<String>) -> Self {
        Self::new_with_text(text, Role::Model)
    }

    /// Create role-less content, as used for system instructions.
    pub fn instruction(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }

    /// Concatenated answer text of every part.
    pub fn text(&self) -> String {
        self.parts.iter().filter_map(Part::answer_text).collect()
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Self::user(text)
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Self::user(text)
    }
}
