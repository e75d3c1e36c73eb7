use async_trait::async_trait;
use laudo_core::{Part, Role};
use serde::{Deserialize, Serialize};

pub mod gemini;
pub mod retry;

pub use gemini::{GeminiClient, GeminiConfig};
pub use laudo_error::{LaudoError, Result};
pub use retry::RetryPolicy;

/// One role-tagged message of the model call, in provider-native shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

/// The final structured message sequence handed to the generation model:
/// the fixed system policy (plus retrieved-context block) and the full
/// ordered conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPrompt {
    pub system_instruction: String,
    pub contents: Vec<Content>,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Perform one generation attempt. Retrying transient failures is the
    /// caller's concern (see [`GenerationClient`]).
    async fn generate(&self, prompt: &AssembledPrompt) -> Result<String>;
}

#[async_trait]
pub trait EmbedModel: Send + Sync {
    /// Embed a batch of texts into fixed-dimension vectors, one per input,
    /// in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Generation entry point used by the conversation endpoint: wraps a
/// [`ChatModel`] with the retry policy so transient upstream failures are
/// masked up to the configured attempt budget.
pub struct GenerationClient {
    chat: std::sync::Arc<dyn ChatModel>,
    retry: RetryPolicy,
}

impl GenerationClient {
    pub fn new(chat: std::sync::Arc<dyn ChatModel>, retry: RetryPolicy) -> Self {
        Self { chat, retry }
    }

    #[tracing::instrument(skip_all, fields(contents = prompt.contents.len()))]
    pub async fn generate(&self, prompt: &AssembledPrompt) -> Result<String> {
        self.retry
            .run("generate", || self.chat.generate(prompt))
            .await
    }
}
