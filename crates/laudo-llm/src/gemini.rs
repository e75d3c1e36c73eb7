//! HTTP client for the Google Generative Language API (Gemini).
//!
//! One client serves both contracts the pipeline needs: `generateContent` for
//! the chat reply and `batchEmbedContents` for chunk/query embeddings. The
//! same embedding model must be used at index time and query time; mixing
//! models produces meaningless distances.

use crate::{AssembledPrompt, ChatModel, EmbedModel};
use async_trait::async_trait;
use laudo_error::{LaudoError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    /// Hard deadline per attempt, distinct from the retry backoff delay.
    pub request_timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            chat_model: "gemini-1.5-flash-latest".to_string(),
            embedding_model: "text-embedding-004".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    cfg: GeminiConfig,
}

impl GeminiClient {
    pub fn new(cfg: GeminiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .build()?;
        Ok(Self { http, cfg })
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.cfg.base_url.trim_end_matches('/'),
            model,
            method
        )
    }

    async fn post_json<Req: Serialize>(&self, url: &str, body: &Req) -> Result<String> {
        let resp = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.cfg.api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(classify_failure(
                status.as_u16(),
                content_type.as_deref(),
                &text,
            ));
        }
        Ok(text)
    }
}

// === generateContent wire types ===

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: SystemInstruction<'a>,
    contents: &'a [crate::Content],
}

#[derive(Serialize)]
struct SystemInstruction<'a> {
    parts: [TextPart<'a>; 1],
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

// === batchEmbedContents wire types ===

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: String,
    content: EmbedContent<'a>,
}

#[derive(Serialize)]
struct EmbedContent<'a> {
    parts: [TextPart<'a>; 1],
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

fn looks_like_html(content_type: Option<&str>, body: &str) -> bool {
    content_type.is_some_and(|ct| ct.contains("text/html"))
        || body.trim_start().starts_with('<')
}

/// Map a non-2xx upstream response onto the error taxonomy.
///
/// Proxy/gateway error pages come back as HTML rather than the structured
/// error JSON; those are a distinct protocol failure, not a retryable outage.
pub fn classify_failure(status: u16, content_type: Option<&str>, body: &str) -> LaudoError {
    if looks_like_html(content_type, body) {
        return LaudoError::UpstreamProtocol {
            provider: "gemini".to_string(),
            message: format!("status={status} non-JSON body"),
        };
    }
    let retry_after = if status >= 500 || status == 429 {
        Some(Duration::from_millis(300))
    } else {
        None
    };
    LaudoError::LlmService {
        provider: "gemini".to_string(),
        message: format!("status={status} body={body}"),
        retry_after,
    }
}

/// Pull the plain-text reply out of a parsed response, surfacing blocked and
/// empty outcomes as their own error kinds.
pub fn extract_reply(resp: GenerationResponse) -> Result<String> {
    if let Some(feedback) = &resp.prompt_feedback {
        if let Some(reason) = &feedback.block_reason {
            return Err(LaudoError::ContentBlocked {
                reason: reason.clone(),
            });
        }
    }

    let Some(candidate) = resp.candidates.into_iter().next() else {
        return Err(LaudoError::EmptyReply {
            provider: "gemini".to_string(),
        });
    };

    if let Some(reason) = &candidate.finish_reason {
        if matches!(reason.as_str(), "SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST") {
            return Err(LaudoError::ContentBlocked {
                reason: reason.clone(),
            });
        }
    }

    let text = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(LaudoError::EmptyReply {
            provider: "gemini".to_string(),
        });
    }
    Ok(text)
}

#[async_trait]
impl ChatModel for GeminiClient {
    #[instrument(skip(self, prompt), fields(model = %self.cfg.chat_model))]
    async fn generate(&self, prompt: &AssembledPrompt) -> Result<String> {
        let url = self.endpoint(&self.cfg.chat_model, "generateContent");
        let body = GenerateContentRequest {
            system_instruction: SystemInstruction {
                parts: [TextPart {
                    text: &prompt.system_instruction,
                }],
            },
            contents: &prompt.contents,
        };

        let raw = self.post_json(&url, &body).await?;
        let parsed: GenerationResponse = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(err) if looks_like_html(None, &raw) => {
                return Err(LaudoError::UpstreamProtocol {
                    provider: "gemini".to_string(),
                    message: err.to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };
        extract_reply(parsed)
    }
}

#[async_trait]
impl EmbedModel for GeminiClient {
    #[instrument(skip(self, texts), fields(model = %self.cfg.embedding_model, batch = texts.len()))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let url = self.endpoint(&self.cfg.embedding_model, "batchEmbedContents");
        let model_path = format!("models/{}", self.cfg.embedding_model);
        let body = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: model_path.clone(),
                    content: EmbedContent {
                        parts: [TextPart { text }],
                    },
                })
                .collect(),
        };

        let raw = self.post_json(&url, &body).await.map_err(as_embedding_error)?;
        let parsed: BatchEmbedResponse = serde_json::from_str(&raw)?;

        if parsed.embeddings.len() != texts.len() {
            return Err(LaudoError::EmbeddingService {
                provider: "gemini".to_string(),
                message: format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    parsed.embeddings.len()
                ),
                retry_after: None,
            });
        }
        Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
    }
}

fn as_embedding_error(err: LaudoError) -> LaudoError {
    match err {
        LaudoError::LlmService {
            provider,
            message,
            retry_after,
        } => LaudoError::EmbeddingService {
            provider,
            message,
            retry_after,
        },
        other => other,
    }
}
