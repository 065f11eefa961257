use std::sync::Arc;

use async_trait::async_trait;
use cortex_memory::{MemoryStore, SearchHit, NS_MEMORIES};

use super::Tool;

/// Searches episodic memory (C2's `memories` namespace) for past turns
/// relevant to the agent's current question.
pub struct MemorySearchTool {
    memory: Arc<MemoryStore>,
}

impl MemorySearchTool {
    const TOP_K: usize = 5;

    pub fn new(memory: Arc<MemoryStore>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Tool for MemorySearchTool {
    fn name(&self) -> &str {
        "memory_search"
    }

    fn description(&self) -> &str {
        "Search past conversation turns for relevant context. Input: the search query text."
    }

    async fn invoke(&self, input: &str) -> String {
        let query = input.trim();
        if query.is_empty() {
            return "error: empty query".to_string();
        }

        let memory = self.memory.clone();
        let query = query.to_string();
        let result =
            tokio::task::spawn_blocking(move || memory.search(NS_MEMORIES, &query, Self::TOP_K, &[]))
                .await;

        match result {
            Ok(Ok(hits)) if hits.is_empty() => "no matching memories found".to_string(),
            Ok(Ok(hits)) => format_hits(&hits),
            Ok(Err(e)) => format!("error: memory search failed: {e}"),
            Err(e) => format!("error: memory search task panicked: {e}"),
        }
    }
}

fn format_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| format!("{}. (distance {:.3}) {}", i + 1, hit.distance, hit.record.text))
        .collect::<Vec<_>>()
        .join("\n")
}
