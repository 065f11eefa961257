use std::sync::Arc;
use std::time::Duration;

use cortex_core::config::SurpriseConfig;
use cortex_inference::Gateway;
use cortex_memory::{MemoryStore, Record, NS_MEMORIES};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::capture::CaptureStream;
use crate::error::Result;
use crate::types::ScoringOutcome;

const CHECKPOINT_KEY: &str = "scoring_last_id";
/// How many capture-stream entries to pull per poll.
const BATCH_SIZE: usize = 50;
/// Poll interval when the stream has no new entries.
const POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Delay between per-entry processing failures before the worker retries the batch.
const ERROR_BACKOFF: Duration = Duration::from_secs(2);
/// Fixed delay between perplexity retries.
const PERPLEXITY_RETRY_DELAY: Duration = Duration::from_millis(500);
/// Neutral fallback mean log-prob when every perplexity retry fails
/// (perplexity = e).
const FALLBACK_MEAN_LOGPROB: f64 = -1.0;
/// How long to wait for the Inference Gateway to report healthy before the
/// worker starts its main loop.
const GATEWAY_READY_DEADLINE: Duration = Duration::from_secs(120);

/// Scores every capture-stream entry for surprise and writes the surviving
/// ones to C2's `memories` namespace. One instance; runs continuously.
pub struct ScoringWorker {
    capture: Arc<CaptureStream>,
    memory: Arc<MemoryStore>,
    gateway: Arc<Gateway>,
    config: SurpriseConfig,
}

impl ScoringWorker {
    pub fn new(
        capture: Arc<CaptureStream>,
        memory: Arc<MemoryStore>,
        gateway: Arc<Gateway>,
        config: SurpriseConfig,
    ) -> Self {
        Self {
            capture,
            memory,
            gateway,
            config,
        }
    }

    /// Main loop. Polls the capture stream until `shutdown` broadcasts `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("scoring worker starting");

        if !self.gateway.health(GATEWAY_READY_DEADLINE).await {
            warn!("inference gateway did not report healthy within the startup deadline; continuing anyway");
        }

        let mut last_id = self.load_checkpoint();
        let mut interval = tokio::time::interval(POLL_INTERVAL);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.process_batch(last_id).await {
                        Ok(Some(new_last_id)) => last_id = new_last_id,
                        Ok(None) => {}
                        Err(e) => {
                            error!(error = %e, "scoring batch failed, backing off");
                            tokio::time::sleep(ERROR_BACKOFF).await;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scoring worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    fn load_checkpoint(&self) -> i64 {
        match self.capture.get_checkpoint(CHECKPOINT_KEY) {
            Ok(Some(id)) => {
                info!(last_id = id, "resuming scoring worker from checkpoint");
                id
            }
            Ok(None) if self.config.start_from_latest => {
                let latest = self.capture.max_id().ok().flatten().unwrap_or(0);
                info!(last_id = latest, "no checkpoint found, starting from latest entry");
                latest
            }
            Ok(None) => {
                info!("no checkpoint found, starting from earliest entry");
                0
            }
            Err(e) => {
                warn!(error = %e, "failed to load checkpoint, starting from earliest entry");
                0
            }
        }
    }

    /// Process up to `BATCH_SIZE` entries after `last_id`. Returns the new
    /// checkpoint position, or `None` if nothing advanced (empty batch, or
    /// the first entry in the batch failed to store).
    async fn process_batch(&self, last_id: i64) -> Result<Option<i64>> {
        let entries = self.capture.read_after(last_id, BATCH_SIZE)?;
        if entries.is_empty() {
            return Ok(None);
        }
        debug!(count = entries.len(), "scoring batch");

        let mut checkpoint = last_id;
        for entry in entries {
            match self.score_and_store(&entry.message, &entry.metadata).await {
                Ok(outcome) => {
                    match outcome {
                        ScoringOutcome::Stored { surprise, ref record_id } => {
                            info!(entry_id = entry.id, surprise, record_id = %record_id, "memory stored");
                        }
                        ScoringOutcome::Skipped { surprise } => {
                            debug!(entry_id = entry.id, surprise, "memory skipped (below threshold)");
                        }
                    }
                    checkpoint = entry.id;
                }
                Err(e) => {
                    warn!(entry_id = entry.id, error = %e, "storing memory failed, stopping batch for retry");
                    break;
                }
            }
        }

        if checkpoint != last_id {
            self.capture.set_checkpoint(CHECKPOINT_KEY, checkpoint)?;
            Ok(Some(checkpoint))
        } else {
            Ok(None)
        }
    }

    /// Score a single message and store it in C2 if surprising enough.
    /// Storage failure is the only error path this returns — a failed
    /// perplexity call falls back rather than propagating.
    async fn score_and_store(
        &self,
        message: &str,
        metadata: &serde_json::Value,
    ) -> Result<ScoringOutcome> {
        if message.is_empty() {
            return Ok(ScoringOutcome::Skipped { surprise: 0.0 });
        }

        let (mean_logprob, perplexity_fallback) = self.perplexity_with_retries(message).await;
        let perplexity = (-mean_logprob).exp();
        let normalized_perplexity = (1.0_f64)
            .min((perplexity + self.config.perplexity_offset).ln() / self.config.perplexity_divisor);

        let distance = self.novelty_distance(message).await;

        let surprise = self.config.weight_perplexity * normalized_perplexity
            + self.config.weight_novelty * distance;

        if surprise < self.config.threshold {
            return Ok(ScoringOutcome::Skipped { surprise });
        }

        let session_tag = metadata.get("session_tag").and_then(|v| v.as_str());
        let mut record = Record::new(NS_MEMORIES, message, Vec::new())
            .with_numeric("perplexity", perplexity)
            .with_numeric("surprise", surprise)
            .with_metadata(metadata.clone());
        if let Some(tag) = session_tag {
            record = record.with_tag("session_tag", tag);
        }
        if perplexity_fallback {
            record = record.with_tag("perplexity_fallback", "true");
        }

        let memory = self.memory.clone();
        let stored = tokio::task::spawn_blocking(move || memory.put(NS_MEMORIES, record))
            .await
            .map_err(|e| crate::error::SurpriseError::Archive(format!("join error: {e}")))??;

        Ok(ScoringOutcome::Stored {
            surprise,
            record_id: stored.id,
        })
    }

    /// Up to `scoring_retries` attempts at a fixed delay. Returns the fallback
    /// mean log-prob (and a flag) rather than an error — the caller never
    /// drops the message over a perplexity failure.
    async fn perplexity_with_retries(&self, message: &str) -> (f64, bool) {
        let retries = self.config.scoring_retries.max(1);
        for attempt in 1..=retries {
            match self.gateway.mean_logprob(message).await {
                Ok(logprob) => return (logprob, false),
                Err(e) => {
                    warn!(attempt, error = %e, "perplexity call failed");
                    if attempt < retries {
                        tokio::time::sleep(PERPLEXITY_RETRY_DELAY).await;
                    }
                }
            }
        }
        error!(
            retries,
            "perplexity calculation failed after all retries, using fallback"
        );
        (FALLBACK_MEAN_LOGPROB, true)
    }

    async fn novelty_distance(&self, message: &str) -> f64 {
        let memory = self.memory.clone();
        let message = message.to_string();
        let result =
            tokio::task::spawn_blocking(move || memory.search(NS_MEMORIES, &message, 1, &[])).await;

        match result {
            Ok(Ok(hits)) if hits.is_empty() => 1.0,
            Ok(Ok(hits)) => hits[0].distance as f64,
            Ok(Err(e)) => {
                warn!(error = %e, "novelty search failed, using neutral distance");
                0.5
            }
            Err(e) => {
                warn!(error = %e, "novelty search task panicked, using neutral distance");
                0.5
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_perplexity_caps_at_one() {
        let offset = 1.0;
        let divisor = 5.0;
        let perplexity = 1e6_f64;
        let normalized = (1.0_f64).min((perplexity + offset).ln() / divisor);
        assert!((normalized - 1.0).abs() < 1e-9);
    }

    #[test]
    fn surprise_formula_matches_spec_weights() {
        let weight_perplexity = 0.6;
        let weight_novelty = 0.4;
        let normalized_perplexity = 0.5;
        let distance = 1.0;
        let surprise = weight_perplexity * normalized_perplexity + weight_novelty * distance;
        assert!((surprise - 0.7).abs() < 1e-9);
    }
}
