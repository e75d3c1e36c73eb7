use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod policy;

pub use policy::{ChecklistItem, ChecklistPolicy, Phase, ReportKind};

/// Role of a conversation turn. The wire names match what the browser client
/// sends (`user` / `model`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One piece of a turn: either a text span or an inline attachment.
///
/// Tagged by field shape so that JSON from the browser (`{"text": ...}` or
/// `{"inline_data": {...}}`) deserializes without probing, and every consumer
/// has to handle both kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    InlineImage { inline_data: InlineData },
}

/// Base64-encoded attachment bytes plus their mime type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn inline_image(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Part::InlineImage {
            inline_data: InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            Part::InlineImage { .. } => None,
        }
    }
}

/// One exchange unit of the conversation. Ordering of turns and of parts
/// within a turn is significant and preserved end to end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl ConversationTurn {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::text(text)],
        }
    }

    /// Concatenated text content of the turn, used as the retrieval query.
    /// Attachment-only turns yield an empty string.
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| p.as_text())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub history: Vec<ConversationTurn>,
}

/// Successful reply of `POST /api/generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateReply {
    pub reply: String,
}

/// One source document loaded from the corpus directory at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub source: String,
    pub format: DocumentFormat,
    pub text: String,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Text,
}

/// A bounded fragment of a document, the unit of retrieval.
///
/// `overlap` is how many leading characters this chunk shares with the
/// previous chunk of the same document (0 for the first chunk).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub source: String,
    pub ord: usize,
    pub overlap: usize,
    pub text: String,
}

/// A retrieved chunk with its similarity score, ordered most relevant first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

pub use laudo_error::{LaudoError as Error, Result};
