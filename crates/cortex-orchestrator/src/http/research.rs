//! POST /research, POST /research/multi — a C5-level composition over C2's
//! library and memory namespaces and C1: gather sources, ask the model to
//! answer using only those sources with `[Source N]` citations.
//!
//! Grounded on `original_source/brain/agents/research_agent.py`
//! (`research_query`/`multi_query_research`); not a registered C4 engine,
//! same standing as `/code_assist`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::Json;
use cortex_inference::{Message, Role};
use cortex_memory::{MemoryStore, NS_DOCUMENTS, NS_MEMORIES};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::engine;
use crate::error_response::ApiError;

const RESEARCH_SYSTEM: &str = "You are a research assistant. Answer the question using ONLY the \
provided sources. Cite sources using [Source N] notation. If the sources don't contain relevant \
information, say so clearly. Be concise and factual.";
const RESEARCH_MAX_TOKENS: u32 = 500;
const SYNTHESIS_MAX_TOKENS: u32 = 800;
const MAX_MULTI_QUESTIONS: usize = 10;

fn default_top_k() -> usize {
    5
}
fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
pub struct ResearchRequest {
    pub question: String,
    #[serde(default = "default_true")]
    pub use_library: bool,
    #[serde(default = "default_true")]
    pub use_memory: bool,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResearchSource {
    #[serde(rename = "type")]
    pub source_type: &'static str,
    pub label: String,
    pub text: String,
    pub similarity: f32,
}

#[derive(Serialize)]
pub struct ResearchReply {
    pub question: String,
    pub answer: String,
    pub sources: Vec<ResearchSource>,
    pub library_chunks_consulted: usize,
    pub memories_consulted: usize,
    pub total_sources: usize,
    pub success: bool,
    pub engine: &'static str,
    pub error: Option<String>,
}

/// Gathers sources, asks C1 for an answer, returns the composed result.
/// Errors from an individual source lookup are swallowed (matching the
/// original's "continue without it" behavior) — only a C1 failure surfaces
/// as an overall failure.
async fn run_research(
    state: &AppState,
    question: &str,
    use_library: bool,
    use_memory: bool,
    top_k: usize,
) -> ResearchReply {
    let mut sources = Vec::new();
    let mut library_chunks = 0usize;
    let mut memories = 0usize;

    if use_library {
        if let Some(hits) = search_namespace(&state.memory, NS_DOCUMENTS, question, top_k).await {
            library_chunks = hits.len();
            for hit in hits {
                sources.push(ResearchSource {
                    source_type: "library",
                    label: hit.record.tag("filename").unwrap_or("unknown").to_string(),
                    text: hit.record.text,
                    similarity: 1.0 - hit.distance,
                });
            }
        }
    }

    if use_memory {
        if let Some(hits) = search_namespace(&state.memory, NS_MEMORIES, question, top_k).await {
            memories = hits.len();
            for hit in hits {
                sources.push(ResearchSource {
                    source_type: "memory",
                    label: hit.record.created_at.to_rfc3339(),
                    text: hit.record.text,
                    similarity: 1.0 - hit.distance,
                });
            }
        }
    }

    let context = format_sources(&sources);
    let prompt = format!("Question: {question}\n\nSources:\n{context}\n\nProvide a researched answer with citations:");

    let total_sources = sources.len();
    match state
        .gateway
        .chat_raw(
            RESEARCH_SYSTEM,
            vec![Message {
                role: Role::User,
                content: prompt,
            }],
            0.3,
            RESEARCH_MAX_TOKENS,
            None,
        )
        .await
    {
        Ok(routed) => ResearchReply {
            question: question.to_string(),
            answer: routed.response.content,
            sources,
            library_chunks_consulted: library_chunks,
            memories_consulted: memories,
            total_sources,
            success: true,
            engine: "research",
            error: None,
        },
        Err(e) => ResearchReply {
            question: question.to_string(),
            answer: String::new(),
            sources,
            library_chunks_consulted: library_chunks,
            memories_consulted: memories,
            total_sources,
            success: false,
            engine: "research",
            error: Some(e.to_string()),
        },
    }
}

async fn search_namespace(
    memory: &Arc<MemoryStore>,
    namespace: &'static str,
    query: &str,
    top_k: usize,
) -> Option<Vec<cortex_memory::SearchHit>> {
    let memory = memory.clone();
    let query = query.to_string();
    tokio::task::spawn_blocking(move || memory.search(namespace, &query, top_k, &[]))
        .await
        .ok()?
        .ok()
}

fn format_sources(sources: &[ResearchSource]) -> String {
    if sources.is_empty() {
        return "(No sources available)".to_string();
    }
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| format!("[Source {}] {}: {}", i + 1, s.label, truncate(&s.text, 300)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub async fn research_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<ResearchRequest>,
) -> Result<Json<ResearchReply>, ApiError> {
    engine::require_non_empty("question", &req.question)?;
    engine::enforce_rate_limit(&state, &engine::client_key(addr))?;
    engine::capture_turn(&state, &req.question, "research");

    let reply = run_research(&state, &req.question, req.use_library, req.use_memory, req.top_k).await;
    Ok(Json(reply))
}

#[derive(Deserialize)]
pub struct MultiResearchRequest {
    pub questions: Vec<String>,
    #[serde(default = "default_true")]
    pub synthesize: bool,
}

#[derive(Serialize)]
pub struct MultiResearchItem {
    pub question: String,
    pub result: ResearchReply,
}

#[derive(Serialize)]
pub struct MultiResearchReply {
    pub questions: usize,
    pub results: Vec<MultiResearchItem>,
    pub synthesis: Option<String>,
    pub total_sources: usize,
}

pub async fn research_multi_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<MultiResearchRequest>,
) -> Result<Json<MultiResearchReply>, ApiError> {
    if req.questions.is_empty() {
        return Err(crate::error_response::bad_request("questions", "questions list cannot be empty"));
    }
    if req.questions.len() > MAX_MULTI_QUESTIONS {
        return Err(crate::error_response::bad_request(
            "questions",
            format!("too many questions ({}), maximum {MAX_MULTI_QUESTIONS}", req.questions.len()),
        ));
    }
    engine::enforce_rate_limit(&state, &engine::client_key(addr))?;

    let mut results = Vec::with_capacity(req.questions.len());
    let mut total_sources = 0usize;
    for question in &req.questions {
        engine::capture_turn(&state, question, "research_multi");
        let result = run_research(&state, question, true, true, default_top_k()).await;
        total_sources += result.total_sources;
        results.push(MultiResearchItem {
            question: question.clone(),
            result,
        });
    }

    let synthesis = if req.synthesize {
        Some(synthesize(&state, &results).await)
    } else {
        None
    };

    Ok(Json(MultiResearchReply {
        questions: req.questions.len(),
        results,
        synthesis,
        total_sources,
    }))
}

async fn synthesize(state: &AppState, results: &[MultiResearchItem]) -> String {
    let mut prompt = String::from("Synthesize findings from the following questions:\n");
    for (i, item) in results.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, item.question));
        if item.result.success {
            prompt.push_str(&format!("   Finding: {}\n\n", item.result.answer));
        }
    }

    match state
        .gateway
        .chat_raw(
            "You are a research synthesizer. Combine the findings into a coherent summary.",
            vec![Message {
                role: Role::User,
                content: prompt,
            }],
            0.4,
            SYNTHESIS_MAX_TOKENS,
            None,
        )
        .await
    {
        Ok(routed) => routed.response.content,
        Err(_) => "(synthesis error)".to_string(),
    }
}
