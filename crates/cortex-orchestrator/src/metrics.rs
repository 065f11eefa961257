//! Metrics aggregation for `GET /metrics`: process resource usage, per-backend
//! health, and a rolling token/sec estimate, plus a bounded history of
//! snapshots for `GET /metrics/?hours=`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use cortex_inference::{Gateway, ProviderHealthEntry};
use cortex_memory::{MemoryStore, Record};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sysinfo::{Pid, ProcessRefreshKind, RefreshKind, System};
use tracing::debug;

/// Namespace metrics snapshots are stored under, reusing C2's existing
/// namespace mechanism as-is rather than adding a dedicated KV primitive.
/// Every snapshot pays C2's usual embed-on-put cost even though it is never
/// searched semantically — an accepted tradeoff for not touching C2's source.
pub const NS_METRICS: &str = "metrics_history";

const SCRAPE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: i64,
    pub process_cpu_percent: f32,
    pub process_memory_bytes: u64,
    pub backends: Vec<ProviderHealthEntry>,
    pub tokens_per_sec: HashMap<String, f64>,
}

struct TokensSample {
    at: Instant,
    total: f64,
}

pub struct MetricsState {
    system: Mutex<System>,
    pid: Pid,
    client: reqwest::Client,
    last_tokens: DashMap<String, TokensSample>,
    /// `{provider_id: metrics_url}`, scraped best-effort for token counters.
    provider_metrics_urls: HashMap<String, String>,
}

impl MetricsState {
    pub fn new(provider_metrics_urls: HashMap<String, String>) -> Self {
        let pid = Pid::from_u32(std::process::id());
        let system = System::new_with_specifics(
            RefreshKind::nothing().with_processes(ProcessRefreshKind::everything()),
        );
        Self {
            system: Mutex::new(system),
            pid,
            client: reqwest::Client::new(),
            last_tokens: DashMap::new(),
            provider_metrics_urls,
        }
    }

    pub async fn collect(&self, gateway: &Gateway) -> MetricsSnapshot {
        let (cpu, mem) = self.process_usage();
        let backends = gateway.health_tracker().all_entries();
        let tokens_per_sec = self.token_rates().await;

        MetricsSnapshot {
            timestamp: chrono::Utc::now().timestamp(),
            process_cpu_percent: cpu,
            process_memory_bytes: mem,
            backends,
            tokens_per_sec,
        }
    }

    fn process_usage(&self) -> (f32, u64) {
        let mut system = self.system.lock().expect("sysinfo mutex poisoned");
        system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[self.pid]), true);
        match system.process(self.pid) {
            Some(process) => (process.cpu_usage(), process.memory()),
            None => (0.0, 0),
        }
    }

    /// Best-effort: scrape each configured provider's own `/metrics` text
    /// endpoint, sum any `*_tokens_total` counter, and difference against the
    /// previous sample to estimate tokens/sec. A provider with no configured
    /// metrics URL or an unreachable one is silently skipped.
    async fn token_rates(&self) -> HashMap<String, f64> {
        let mut rates = HashMap::new();
        for (provider, url) in &self.provider_metrics_urls {
            let Some(total) = self.scrape_tokens_total(url).await else {
                continue;
            };
            let now = Instant::now();
            if let Some(prev) = self.last_tokens.get(provider) {
                let elapsed = now.duration_since(prev.at).as_secs_f64();
                if elapsed > 0.0 {
                    let rate = ((total - prev.total) / elapsed).max(0.0);
                    rates.insert(provider.clone(), rate);
                }
            }
            self.last_tokens
                .insert(provider.clone(), TokensSample { at: now, total });
        }
        rates
    }

    async fn scrape_tokens_total(&self, url: &str) -> Option<f64> {
        let response = self
            .client
            .get(url)
            .timeout(SCRAPE_TIMEOUT)
            .send()
            .await
            .ok()?;
        let text = response.text().await.ok()?;
        Some(parse_tokens_total(&text))
    }
}

/// Sums every Prometheus text-format counter whose metric name ends in
/// `_tokens_total`, ignoring labels.
fn parse_tokens_total(text: &str) -> f64 {
    let mut sum = 0.0;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let name = line.split(['{', ' ']).next().unwrap_or("");
        if !name.ends_with("_tokens_total") {
            continue;
        }
        if let Some(value) = line.split_whitespace().last().and_then(|v| v.parse::<f64>().ok()) {
            sum += value;
        }
    }
    sum
}

/// Appends a snapshot to C2's metrics namespace as a JSON-text record.
pub fn record_snapshot(memory: &MemoryStore, snapshot: &MetricsSnapshot) {
    let text = match serde_json::to_string(snapshot) {
        Ok(text) => text,
        Err(e) => {
            debug!(error = %e, "failed to serialize metrics snapshot, skipping history write");
            return;
        }
    };
    let record = Record::new(NS_METRICS, text, Vec::new())
        .with_numeric("timestamp", snapshot.timestamp as f64);
    if let Err(e) = memory.put(NS_METRICS, record) {
        debug!(error = %e, "failed to persist metrics snapshot");
    }
}

/// Snapshots from the trailing `hours` window, oldest first. Uses a plain
/// scan + filter rather than ANN search — metrics history has no semantic
/// query need, only a numeric time range.
pub fn history(memory: &MemoryStore, hours: i64) -> Vec<MetricsSnapshot> {
    let cutoff = (chrono::Utc::now() - chrono::Duration::hours(hours.max(0))).timestamp() as f64;
    let mut out: Vec<(f64, MetricsSnapshot)> = memory
        .scan(NS_METRICS)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|record| {
            let ts = record.numeric_field("timestamp")?;
            if ts < cutoff {
                return None;
            }
            let snapshot: MetricsSnapshot = serde_json::from_str(&record.text).ok()?;
            Some((ts, snapshot))
        })
        .collect();
    out.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    out.into_iter().map(|(_, s)| s).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_sums_tokens_total_lines() {
        let text = "\
# HELP ollama_prompt_tokens_total total\n\
ollama_prompt_tokens_total{model=\"llama3\"} 120\n\
ollama_completion_tokens_total{model=\"llama3\"} 40\n\
ollama_requests_total 5\n";
        assert_eq!(parse_tokens_total(text), 160.0);
    }

    #[test]
    fn ignores_unrelated_counters() {
        let text = "http_requests_total 42\n";
        assert_eq!(parse_tokens_total(text), 0.0);
    }
}
