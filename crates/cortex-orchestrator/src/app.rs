use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use cortex_core::config::CortexConfig;
use cortex_core::error::Result;
use cortex_inference::{
    AnthropicProvider, Gateway, OllamaProvider, OpenAiProvider, PromptBuilder, ProviderRouter,
    ProviderSlot,
};
use cortex_memory::MemoryStore;
use cortex_reasoning::{build_advanced_tools, build_basic_tools, SandboxClient, ToolRegistry};
use cortex_surprise::CaptureStream;

use crate::metrics::MetricsState;
use crate::persona::PersonaStore;
use crate::rate_limit::RateLimiter;

/// Central shared state, held behind `Arc` and injected into every handler
/// via axum's `State` extractor.
pub struct AppState {
    pub config: CortexConfig,
    pub gateway: Arc<Gateway>,
    pub memory: Arc<MemoryStore>,
    pub capture: Arc<CaptureStream>,
    pub sandbox: Arc<SandboxClient>,
    pub basic_tools: ToolRegistry,
    pub advanced_tools: ToolRegistry,
    pub rate_limiter: RateLimiter,
    pub personas: PersonaStore,
    pub metrics: MetricsState,
}

impl AppState {
    /// Assembles every collaborator connection and in-process component from
    /// config: the provider fallback chain (C1), the vector store (C2), the
    /// capture stream (C3, workers are spawned separately by `main`), the
    /// tool registries (C4), and the orchestrator's own rate limiter/persona
    /// store/metrics collector (C5).
    pub fn new(config: CortexConfig) -> Result<Self> {
        use cortex_core::error::CortexError;

        let gateway = Arc::new(build_gateway(&config)?);
        let memory = Arc::new(
            MemoryStore::open(&config.memory)
                .map_err(|e| CortexError::Database(e.to_string()))?,
        );
        let capture = Arc::new(
            CaptureStream::open(
                &format!("{}/capture.db", data_dir(&config)),
                config.surprise.capture_buffer_len,
            )
            .map_err(|e| CortexError::Database(e.to_string()))?,
        );
        let sandbox = Arc::new(SandboxClient::new(config.sandbox.base_url.clone()));

        let basic_tools =
            build_basic_tools(memory.clone()).map_err(|e| CortexError::Internal(e.to_string()))?;
        let advanced_tools = build_advanced_tools(
            memory.clone(),
            gateway.clone(),
            sandbox.clone(),
            Duration::from_secs(config.sandbox.timeout_secs),
            config.reasoning.web_search_providers.clone(),
            config.reasoning.agent_max_steps,
        )
        .map_err(|e| CortexError::Internal(e.to_string()))?;

        let rate_limiter = RateLimiter::new(
            config.gateway.rate_limit.max_requests,
            config.gateway.rate_limit.window_secs,
        );
        let personas = PersonaStore::open(&config.persona.data_root)?;
        let metrics = MetricsState::new(HashMap::new());

        Ok(Self {
            config,
            gateway,
            memory,
            capture,
            sandbox,
            basic_tools,
            advanced_tools,
            rate_limiter,
            personas,
            metrics,
        })
    }
}

fn data_dir(config: &CortexConfig) -> String {
    std::path::Path::new(&config.memory.db_path)
        .parent()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| config.persona.data_root.clone())
}

/// Builds the fallback chain in `providers.fallback_order` from whichever
/// backends are configured; an order entry with no matching config is
/// skipped. Falls back to a single default-local Ollama slot when nothing
/// is configured at all, so the gateway always has at least one backend
/// per `ProviderRouter::new`'s invariant.
fn build_gateway(config: &CortexConfig) -> Result<Gateway> {
    let providers = &config.providers;
    let mut slots = Vec::new();

    for id in &providers.fallback_order {
        match id.as_str() {
            "anthropic" => {
                if let Some(c) = &providers.anthropic {
                    slots.push(ProviderSlot::new(Box::new(AnthropicProvider::new(
                        c.api_key.clone(),
                        Some(c.base_url.clone()),
                    ))));
                }
            }
            "openai" => {
                if let Some(c) = &providers.openai {
                    slots.push(ProviderSlot::new(Box::new(OpenAiProvider::new(
                        c.api_key.clone(),
                        Some(c.base_url.clone()),
                    ))));
                }
            }
            "ollama" => {
                if let Some(c) = &providers.ollama {
                    slots.push(ProviderSlot::new(Box::new(OllamaProvider::new(Some(
                        c.base_url.clone(),
                    )))));
                }
            }
            other => {
                tracing::warn!(provider = other, "unknown provider id in fallback_order, skipping");
            }
        }
    }

    if slots.is_empty() {
        tracing::warn!("no providers configured, falling back to a default local Ollama backend");
        slots.push(ProviderSlot::new(Box::new(OllamaProvider::new(None))));
    }

    let router = ProviderRouter::new(slots, Duration::from_secs(providers.call_timeout_secs));
    let prompt = PromptBuilder::new("You are a helpful assistant.");
    Ok(Gateway::new(router, prompt, providers.default_model.clone()))
}

/// Assemble the full Axum router per the external interface list: chat and
/// reasoning engines, memory/library access, research, voice stubs, admin
/// archival controls, persona CRUD, and health/metrics.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/metrics", get(crate::http::metrics::metrics_handler))
        .route("/metrics/", get(crate::http::metrics::metrics_history_handler))
        .route("/chat", post(crate::http::chat::chat_handler))
        .route("/verify", post(crate::http::verify::verify_handler))
        .route("/agent", post(crate::http::agent::agent_handler))
        .route("/agent/advanced", post(crate::http::agent::agent_advanced_handler))
        .route("/agent/recursive", post(crate::http::agent::agent_recursive_handler))
        .route("/code_assist", post(crate::http::code_assist::code_assist_handler))
        .route("/memories", get(crate::http::memories::list_memories))
        .route("/memories/search", post(crate::http::memories::search_memories))
        .route(
            "/memories/{id}",
            get(crate::http::memories::get_memory).delete(crate::http::memories::delete_memory),
        )
        .route("/library/search", post(crate::http::library::search_library))
        .route("/library/stats", get(crate::http::library::library_stats))
        .route("/research", post(crate::http::research::research_handler))
        .route("/research/multi", post(crate::http::research::research_multi_handler))
        .route("/voice/transcribe", post(crate::http::voice::transcribe_handler))
        .route("/voice/synthesize", post(crate::http::voice::synthesize_handler))
        .route(
            "/admin/archive_old_memories",
            post(crate::http::admin::archive_old_memories),
        )
        .route("/admin/archive_stats", get(crate::http::admin::archive_stats))
        .route("/admin/search_archive", post(crate::http::admin::search_archive_handler))
        .route("/personas", get(crate::http::personas::list_personas).post(crate::http::personas::create_persona))
        .route(
            "/personas/{id}",
            get(crate::http::personas::get_persona)
                .put(crate::http::personas::update_persona)
                .delete(crate::http::personas::delete_persona),
        )
        .route("/personas/activate/{id}", post(crate::http::personas::activate_persona))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
}
