use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::Tool;

/// Searches the web by trying each configured provider URL in order until
/// one returns a usable response. A provider's URL template contains a
/// literal `{query}` placeholder.
pub struct WebSearchTool {
    client: reqwest::Client,
    providers: Vec<String>,
}

impl WebSearchTool {
    const TIMEOUT: Duration = Duration::from_secs(10);
    const MAX_RESULTS: usize = 5;
    const MAX_RAW_CHARS: usize = 2000;

    pub fn new(providers: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            providers,
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web. Tries each configured search provider in order until one succeeds. Input: the search query."
    }

    async fn invoke(&self, input: &str) -> String {
        let query = input.trim();
        if query.is_empty() {
            return "error: empty query".to_string();
        }
        if self.providers.is_empty() {
            return "error: no web search providers configured".to_string();
        }

        let mut last_err = String::new();
        for template in &self.providers {
            let url = template.replace("{query}", &encode_query(query));
            match self
                .client
                .get(&url)
                .timeout(Self::TIMEOUT)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => match resp.text().await {
                    Ok(text) => return summarize_results(&text, Self::MAX_RESULTS, Self::MAX_RAW_CHARS),
                    Err(e) => last_err = e.to_string(),
                },
                Ok(resp) => last_err = format!("HTTP {}", resp.status()),
                Err(e) => last_err = e.to_string(),
            }
        }
        format!("error: all web search providers failed, last error: {last_err}")
    }
}

fn encode_query(query: &str) -> String {
    query
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            b' ' => "+".to_string(),
            _ => format!("%{b:02X}"),
        })
        .collect()
}

fn summarize_results(text: &str, max_results: usize, max_raw_chars: usize) -> String {
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(text) {
        let lines: Vec<String> = items
            .iter()
            .take(max_results)
            .map(|item| {
                let title = item.get("title").and_then(Value::as_str).unwrap_or("(untitled)");
                let snippet = item.get("snippet").and_then(Value::as_str).unwrap_or("");
                let url = item.get("url").and_then(Value::as_str).unwrap_or("");
                format!("- {title}: {snippet} ({url})")
            })
            .collect();
        if !lines.is_empty() {
            return lines.join("\n");
        }
    }

    if text.len() > max_raw_chars {
        format!("{}...", &text[..max_raw_chars])
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_spaces_and_reserved_characters() {
        assert_eq!(encode_query("rust async/await"), "rust+async%2Fawait");
    }

    #[test]
    fn summarizes_structured_results() {
        let raw = r#"[{"title":"A","snippet":"s","url":"http://x"}]"#;
        let out = summarize_results(raw, 5, 2000);
        assert!(out.contains("A: s (http://x)"));
    }

    #[test]
    fn truncates_unstructured_results() {
        let raw = "x".repeat(50);
        let out = summarize_results(&raw, 5, 10);
        assert_eq!(out, format!("{}...", "x".repeat(10)));
    }
}
