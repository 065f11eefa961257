use std::sync::Arc;

use async_trait::async_trait;
use cortex_memory::{MemoryStore, SearchHit, NS_DOCUMENTS};

use super::Tool;

/// Searches ingested document chunks (C2's `documents` namespace).
pub struct LibrarySearchTool {
    memory: Arc<MemoryStore>,
}

impl LibrarySearchTool {
    const TOP_K: usize = 5;

    pub fn new(memory: Arc<MemoryStore>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Tool for LibrarySearchTool {
    fn name(&self) -> &str {
        "library_search"
    }

    fn description(&self) -> &str {
        "Search the document library for relevant passages. Input: the search query text."
    }

    async fn invoke(&self, input: &str) -> String {
        let query = input.trim();
        if query.is_empty() {
            return "error: empty query".to_string();
        }

        let memory = self.memory.clone();
        let query = query.to_string();
        let result = tokio::task::spawn_blocking(move || {
            memory.search(NS_DOCUMENTS, &query, Self::TOP_K, &[])
        })
        .await;

        match result {
            Ok(Ok(hits)) if hits.is_empty() => "no matching documents found".to_string(),
            Ok(Ok(hits)) => format_hits(&hits),
            Ok(Err(e)) => format!("error: library search failed: {e}"),
            Err(e) => format!("error: library search task panicked: {e}"),
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
