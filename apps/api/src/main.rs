use axum::{
    extract::{DefaultBodyLimit, State},
    routing::get,
    routing::post,
    Json, Router,
};
use dotenv::dotenv;
use laudo_core::{ChecklistPolicy, ConversationTurn, GenerateReply};
use laudo_error::{ErrorMetadataBuilder, LaudoError};
use laudo_llm::{GeminiClient, GeminiConfig, GenerationClient, RetryPolicy};
use laudo_rag::{
    CorpusIndexer, IndexerConfig, LoaderRegistry, PromptAssembler, Retriever, VectorIndex,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Attachment-bearing turns carry base64 photo data inline.
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone)]
struct AppState {
    retriever: Arc<Retriever>,
    generator: Arc<GenerationClient>,
    assembler: PromptAssembler,
    policy: Arc<ChecklistPolicy>,
    policy_text: Arc<String>,
}

#[derive(Debug, Deserialize)]
struct AppConfig {
    server: ServerCfg,
    gemini: GeminiCfg,
    retrieval: RetrievalCfg,
    retry: Option<RetryCfg>,
}

#[derive(Debug, Deserialize)]
struct ServerCfg {
    host: String,
    port: u16,
}

#[derive(Debug, Deserialize)]
struct GeminiCfg {
    api_key_env: Option<String>,
    chat_model: Option<String>,
    embedding_model: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RetrievalCfg {
    corpus_dir: String,
    top_k: Option<usize>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    context_budget: Option<usize>,
    /// When true, a failed corpus build aborts startup instead of
    /// falling back to an empty index.
    require_corpus: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RetryCfg {
    max_attempts: Option<u32>,
    base_ms: Option<u64>,
    jitter_max_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenv().ok();

    let cfg: AppConfig = load_config()?;

    let api_key_env = cfg
        .gemini
        .api_key_env
        .as_deref()
        .unwrap_or("GEMINI_API_KEY");
    let api_key = read_env(api_key_env)?;

    let mut gemini_cfg = GeminiConfig::new(api_key);
    if let Some(model) = cfg.gemini.chat_model.clone() {
        gemini_cfg.chat_model = model;
    }
    if let Some(model) = cfg.gemini.embedding_model.clone() {
        gemini_cfg.embedding_model = model;
    }
    if let Some(secs) = cfg.gemini.request_timeout_secs {
        gemini_cfg.request_timeout = Duration::from_secs(secs);
    }
    let gemini = Arc::new(GeminiClient::new(gemini_cfg)?);

    let mut indexer_cfg = IndexerConfig::default();
    if let Some(size) = cfg.retrieval.chunk_size {
        indexer_cfg.chunk_size = size;
    }
    if let Some(overlap) = cfg.retrieval.chunk_overlap {
        indexer_cfg.chunk_overlap = overlap;
    }
    let indexer = CorpusIndexer::new(LoaderRegistry::with_defaults(), gemini.clone(), indexer_cfg);

    let require_corpus = cfg.retrieval.require_corpus.unwrap_or(false);
    let index = match indexer.build(&cfg.retrieval.corpus_dir).await {
        Ok(index) => index,
        Err(e) if require_corpus => {
            return Err(LaudoError::IndexUnavailable {
                reason: format!("corpus indexing failed and retrieval.require_corpus is set: {e}"),
            }
            .into())
        }
        Err(e) => {
            tracing::error!(error = %e, "corpus indexing failed; serving without retrieval context");
            VectorIndex::empty()
        }
    };
    if require_corpus && index.is_empty() {
        return Err(LaudoError::IndexUnavailable {
            reason: "corpus is empty and retrieval.require_corpus is set".to_string(),
        }
        .into());
    }
    info!(chunks = index.len(), "corpus index ready");

    let mut retry = RetryPolicy::default();
    if let Some(r) = cfg.retry.as_ref() {
        if let Some(n) = r.max_attempts {
            retry.max_attempts = n;
        }
        if let Some(ms) = r.base_ms {
            retry.base = Duration::from_millis(ms);
        }
        if let Some(ms) = r.jitter_max_ms {
            retry.jitter_max = Duration::from_millis(ms);
        }
    }

    let policy = Arc::new(ChecklistPolicy::cbmal_v1());
    let policy_text = Arc::new(policy.render());
    let assembler = cfg
        .retrieval
        .context_budget
        .map(PromptAssembler::new)
        .unwrap_or_default();
    let top_k = cfg.retrieval.top_k.unwrap_or(4);

    let state = AppState {
        retriever: Arc::new(Retriever::new(Arc::new(index), gemini.clone(), top_k)),
        generator: Arc::new(GenerationClient::new(gemini, retry)),
        assembler,
        policy,
        policy_text,
    };

    let app = Router::new()
        .route("/api/generate", post(generate))
        .route("/health", get(health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port).parse()?;
    info!(%addr, "laudo-api listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};
    let fmt_layer = fmt::layer().with_target(false);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,tower_http=info"))
        .unwrap();
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_config() -> anyhow::Result<AppConfig> {
    let path =
        std::env::var("APP_CONFIG").unwrap_or_else(|_| "configs/default.yaml".to_string());
    let s = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("cannot read config {}: {}", path, e))?;
    let cfg: AppConfig = serde_yaml::from_str(&s)?;
    info!("load_config: {:?}", cfg);
    Ok(cfg)
}

fn read_env(key: &str) -> anyhow::Result<String> {
    std::env::var(key).map_err(|_| anyhow::anyhow!("missing env {}", key))
}

async fn generate(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<GenerateReply>, LaudoError> {
    let history = parse_history(&payload)?;
    match handle_turn(&state, &history).await {
        Ok(reply) => Ok(Json(GenerateReply { reply })),
        Err(err) => {
            let metadata = ErrorMetadataBuilder::new("laudo-api")
                .operation("generate")
                .build(&err);
            err.log(&metadata);
            Err(err)
        }
    }
}

/// Shape validation happens before any upstream call so a malformed body
/// never costs a model round trip.
fn parse_history(payload: &serde_json::Value) -> Result<Vec<ConversationTurn>, LaudoError> {
    let history = payload
        .get("history")
        .ok_or_else(|| LaudoError::InvalidRequest {
            reason: "campo 'history' ausente".to_string(),
        })?;
    if !history.is_array() {
        return Err(LaudoError::InvalidRequest {
            reason: "campo 'history' deve ser uma lista de turnos".to_string(),
        });
    }
    serde_json::from_value(history.clone()).map_err(|e| LaudoError::InvalidRequest {
        reason: format!("turno inválido em 'history': {e}"),
    })
}

async fn handle_turn(state: &AppState, history: &[ConversationTurn]) -> Result<String, LaudoError> {
    if history.is_empty() {
        // First contact is scripted; no model round trip.
        return Ok(state.policy.opening_question().to_string());
    }
    let query = history
        .last()
        .map(ConversationTurn::text_content)
        .unwrap_or_default();
    let retrieved = state.retriever.retrieve(&query).await?;
    let prompt = state
        .assembler
        .assemble(&state.policy_text, &retrieved, history);
    state.generator.generate(&prompt).await
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "indexed_chunks": state.retriever.indexed_chunks(),
    }))
}
