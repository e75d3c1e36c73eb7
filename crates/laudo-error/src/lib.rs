use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

#[cfg(feature = "axum")]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};

/// Unified error type for the whole service.
///
/// Every failure produced by the retrieval pipeline, the Gemini client or the
/// HTTP boundary maps into one of these variants; the API layer translates
/// them once into status codes and user-facing text.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum LaudoError {
    // === caller errors ===
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    // === upstream model errors ===
    #[error("generation service unavailable: {service}")]
    ServiceUnavailable {
        service: String,
        #[serde(skip)]
        retry_after: Option<std::time::Duration>,
    },

    #[error("upstream returned a non-JSON payload ({provider})")]
    UpstreamProtocol { provider: String, message: String },

    #[error("upstream returned no usable text ({provider})")]
    EmptyReply { provider: String },

    #[error("upstream blocked the response: {reason}")]
    ContentBlocked { reason: String },

    #[error("LLM service error ({provider})")]
    LlmService {
        provider: String,
        message: String,
        #[serde(skip)]
        retry_after: Option<std::time::Duration>,
    },

    #[error("embedding service error ({provider})")]
    EmbeddingService {
        provider: String,
        message: String,
        #[serde(skip)]
        retry_after: Option<std::time::Duration>,
    },

    // === indexing / startup errors ===
    #[error("corpus index unavailable: {reason}")]
    IndexUnavailable { reason: String },

    // === system errors ===
    #[error("configuration error: {key} - {reason}")]
    Configuration { key: String, reason: String },

    #[error("serialization error: {format}")]
    Serialization { format: String, message: String },

    #[error("network error: {operation}")]
    Network { operation: String, message: String },

    #[error("timeout: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("concurrency error: {operation}")]
    Concurrency { operation: String, message: String },

    #[error("internal error: {message}")]
    Internal {
        message: String,
        details: Option<String>,
    },
}

/// Error severity level, used to pick the log level at the boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Low,      // expected caller errors
    Medium,   // upstream trouble that the caller can retry
    High,     // degraded core functionality
    Critical, // misconfiguration, cannot serve
}

/// Metadata attached when an error is logged at the request boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMetadata {
    pub error_id: String,
    pub severity: ErrorSeverity,
    pub component: String,
    pub operation: Option<String>,
    pub request_id: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl LaudoError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            LaudoError::InvalidRequest { .. } => ErrorSeverity::Low,
            LaudoError::ServiceUnavailable { .. }
            | LaudoError::LlmService { .. }
            | LaudoError::EmbeddingService { .. }
            | LaudoError::EmptyReply { .. }
            | LaudoError::ContentBlocked { .. }
            | LaudoError::Network { .. }
            | LaudoError::Timeout { .. } => ErrorSeverity::Medium,
            LaudoError::UpstreamProtocol { .. }
            | LaudoError::IndexUnavailable { .. }
            | LaudoError::Serialization { .. }
            | LaudoError::Concurrency { .. } => ErrorSeverity::High,
            LaudoError::Configuration { .. } | LaudoError::Internal { .. } => {
                ErrorSeverity::Critical
            }
        }
    }

    /// Whether the retry policy may attempt this call again.
    ///
    /// An empty-but-valid reply and a blocked response are deliberately not
    /// retryable: repeating the same prompt is not guaranteed to change the
    /// outcome.
    pub fn is_retryable(&self) -> bool {
        match self {
            LaudoError::Network { .. } | LaudoError::Timeout { .. } => true,
            LaudoError::ServiceUnavailable { retry_after, .. }
            | LaudoError::LlmService { retry_after, .. }
            | LaudoError::EmbeddingService { retry_after, .. } => retry_after.is_some(),
            LaudoError::Concurrency { .. } => true,
            _ => false,
        }
    }

    pub fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            LaudoError::ServiceUnavailable { retry_after, .. }
            | LaudoError::LlmService { retry_after, .. }
            | LaudoError::EmbeddingService { retry_after, .. } => *retry_after,
            LaudoError::Network { .. } => Some(std::time::Duration::from_millis(500)),
            LaudoError::Timeout { .. } => Some(std::time::Duration::from_millis(1000)),
            LaudoError::Concurrency { .. } => Some(std::time::Duration::from_millis(100)),
            _ => None,
        }
    }

    /// Log the error with its boundary metadata at the level its severity asks for.
    pub fn log(&self, metadata: &ErrorMetadata) {
        match metadata.severity {
            ErrorSeverity::Low => {
                warn!(
                    error_id = %metadata.error_id,
                    component = %metadata.component,
                    operation = ?metadata.operation,
                    request_id = ?metadata.request_id,
                    error = %self,
                    "caller error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_id = %metadata.error_id,
                    component = %metadata.component,
                    operation = ?metadata.operation,
                    request_id = ?metadata.request_id,
                    error = %self,
                    "upstream error"
                );
            }
            ErrorSeverity::High | ErrorSeverity::Critical => {
                error!(
                    error_id = %metadata.error_id,
                    component = %metadata.component,
                    operation = ?metadata.operation,
                    request_id = ?metadata.request_id,
                    error = %self,
                    severity = ?metadata.severity,
                    "severe error"
                );
            }
        }
    }

    pub fn to_http_status(&self) -> u16 {
        match self {
            LaudoError::InvalidRequest { .. } => 400,
            LaudoError::ServiceUnavailable { .. }
            | LaudoError::LlmService { .. }
            | LaudoError::EmbeddingService { .. }
            | LaudoError::Network { .. } => 503,
            LaudoError::UpstreamProtocol { .. } => 502,
            LaudoError::EmptyReply { .. } | LaudoError::ContentBlocked { .. } => 502,
            LaudoError::Timeout { .. } => 504,
            LaudoError::IndexUnavailable { .. } => 503,
            _ => 500,
        }
    }

    /// Short, actionable message surfaced to the investigator's chat client.
    ///
    /// Never passes provider payloads through; the raw detail stays in the
    /// server logs.
    pub fn user_message(&self) -> String {
        match self {
            LaudoError::InvalidRequest { .. } => {
                "O histórico da conversa é obrigatório e deve ser uma lista de mensagens.".to_string()
            }
            LaudoError::ServiceUnavailable { .. }
            | LaudoError::LlmService { .. }
            | LaudoError::EmbeddingService { .. }
            | LaudoError::Network { .. } => {
                "O assistente está temporariamente indisponível. Por favor, tente novamente em instantes.".to_string()
            }
            LaudoError::UpstreamProtocol { .. } => {
                "Houve um problema de conexão com o serviço de IA. Por favor, tente novamente.".to_string()
            }
            LaudoError::EmptyReply { .. } => {
                "A IA não retornou uma resposta utilizável. Por favor, reformule e tente novamente.".to_string()
            }
            LaudoError::ContentBlocked { reason } => {
                format!("A resposta foi bloqueada pelo provedor de IA ({reason}).")
            }
            LaudoError::Timeout { .. } => {
                "A solicitação excedeu o tempo limite. Por favor, tente novamente.".to_string()
            }
            LaudoError::IndexUnavailable { .. } => {
                "A base de conhecimento está indisponível no momento.".to_string()
            }
            _ => "Ocorreu um erro ao processar sua solicitação.".to_string(),
        }
    }
}

/// Builder for the metadata attached to boundary-level error logs.
pub struct ErrorMetadataBuilder {
    metadata: ErrorMetadata,
}

impl ErrorMetadataBuilder {
    pub fn new(component: &str) -> Self {
        Self {
            metadata: ErrorMetadata {
                error_id: uuid::Uuid::new_v4().to_string(),
                severity: ErrorSeverity::Medium,
                component: component.to_string(),
                operation: None,
                request_id: None,
                timestamp: chrono::Utc::now(),
            },
        }
    }

    pub fn operation(mut self, operation: &str) -> Self {
        self.metadata.operation = Some(operation.to_string());
        self
    }

    pub fn request_id(mut self, request_id: &str) -> Self {
        self.metadata.request_id = Some(request_id.to_string());
        self
    }

    pub fn build(mut self, error: &LaudoError) -> ErrorMetadata {
        self.metadata.severity = error.severity();
        self.metadata
    }
}

pub type Result<T> = std::result::Result<T, LaudoError>;

// === conversions ===

impl From<serde_json::Error> for LaudoError {
    fn from(err: serde_json::Error) -> Self {
        LaudoError::Serialization {
            format: "json".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for LaudoError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LaudoError::Timeout {
                operation: "http_request".to_string(),
                timeout_ms: 30000,
            }
        } else if err.is_connect() {
            LaudoError::Network {
                operation: "connect".to_string(),
                message: err.to_string(),
            }
        } else {
            LaudoError::Network {
                operation: "http_request".to_string(),
                message: err.to_string(),
            }
        }
    }
}

impl From<tokio::task::JoinError> for LaudoError {
    fn from(err: tokio::task::JoinError) -> Self {
        LaudoError::Concurrency {
            operation: "task_join".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for LaudoError {
    fn from(err: std::io::Error) -> Self {
        LaudoError::Internal {
            message: "io error".to_string(),
            details: Some(err.to_string()),
        }
    }
}

// Axum integration
#[cfg(feature = "axum")]
impl IntoResponse for LaudoError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.to_http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = serde_json::json!({
            "error": self.user_message(),
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_errors_map_to_400() {
        let err = LaudoError::InvalidRequest {
            reason: "history is not an array".into(),
        };
        assert_eq!(err.to_http_status(), 400);
        assert!(!err.is_retryable());
    }

    #[test]
    fn transient_upstream_errors_are_retryable() {
        let err = LaudoError::LlmService {
            provider: "gemini".into(),
            message: "status=503".into(),
            retry_after: Some(std::time::Duration::from_millis(300)),
        };
        assert!(err.is_retryable());
        assert_eq!(err.to_http_status(), 503);
    }

    #[test]
    fn transient_embedding_errors_map_to_503() {
        let err = LaudoError::EmbeddingService {
            provider: "gemini".into(),
            message: "status=503".into(),
            retry_after: Some(std::time::Duration::from_millis(300)),
        };
        assert_eq!(err.to_http_status(), 503);
        assert!(err.is_retryable());
        assert!(err.user_message().contains("temporariamente indisponível"));
    }

    #[test]
    fn network_errors_map_to_503() {
        let err = LaudoError::Network {
            operation: "connect".into(),
            message: "connection refused".into(),
        };
        assert_eq!(err.to_http_status(), 503);
        assert!(err.is_retryable());
    }

    #[test]
    fn index_unavailable_maps_to_503() {
        let err = LaudoError::IndexUnavailable {
            reason: "corpus indexing failed".into(),
        };
        assert_eq!(err.to_http_status(), 503);
        assert!(!err.is_retryable());
    }

    #[test]
    fn protocol_and_empty_errors_are_not_retryable() {
        let protocol = LaudoError::UpstreamProtocol {
            provider: "gemini".into(),
            message: "<html>502 Bad Gateway</html>".into(),
        };
        let empty = LaudoError::EmptyReply {
            provider: "gemini".into(),
        };
        assert!(!protocol.is_retryable());
        assert!(!empty.is_retryable());
        assert_eq!(protocol.to_http_status(), 502);
    }

    #[test]
    fn user_messages_never_leak_provider_payloads() {
        let err = LaudoError::UpstreamProtocol {
            provider: "gemini".into(),
            message: "<html><body>gateway timeout</body></html>".into(),
        };
        assert!(!err.user_message().contains("<html"));
    }
}
