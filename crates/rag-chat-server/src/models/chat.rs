use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque session identifier, also used as the vector-store namespace
pub type SessionKey = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Lenient parse for provider responses; unknown roles count as assistant output
    pub fn from_provider(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "system" => Role::System,
            "user" | "human" => Role::User,
            _ => Role::Assistant,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single message shape used by session history, the pipeline and the
/// language model gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

// ===== REQUEST MODELS =====

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub question: String,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub session_id: String,
}

// ===== RESPONSE MODELS =====

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub status: String,
    pub chunks: usize,
}
