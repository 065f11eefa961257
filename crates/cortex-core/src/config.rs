use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 7890;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 30;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Top-level config (`cortex.toml` + `CORTEX_`-prefixed env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CortexConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub surprise: SurpriseConfig,
    #[serde(default)]
    pub archival: ArchivalConfig,
    #[serde(default)]
    pub persona: PersonaConfig,
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub features: FeatureFlags,
}

impl Default for CortexConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            providers: ProvidersConfig::default(),
            memory: MemoryConfig::default(),
            surprise: SurpriseConfig::default(),
            archival: ArchivalConfig::default(),
            persona: PersonaConfig::default(),
            reasoning: ReasoningConfig::default(),
            sandbox: SandboxConfig::default(),
            voice: VoiceConfig::default(),
            logging: LoggingConfig::default(),
            features: FeatureFlags::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_rate_limit_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_rate_limit_max_requests(),
            window_secs: default_rate_limit_window_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub anthropic: Option<AnthropicConfig>,
    pub openai: Option<OpenAiProviderConfig>,
    pub ollama: Option<OllamaConfig>,
    /// Priority order of provider ids tried on each request; the router
    /// cascades to the next entry when one is unhealthy or times out.
    #[serde(default = "default_fallback_order")]
    pub fallback_order: Vec<String>,
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Per-backend call deadline (spec §5: "per-backend inference default 60 s").
    /// Bounds a single attempt in the fallback chain, not the whole cascade.
    #[serde(default = "default_provider_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            anthropic: None,
            openai: None,
            ollama: None,
            fallback_order: default_fallback_order(),
            default_model: default_model(),
            call_timeout_secs: default_provider_call_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    pub api_key: String,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
}

/// C2 vector memory configuration: on-disk SQLite store plus ANN index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_vector_index_path")]
    pub vector_index_path: String,
    #[serde(default = "default_embedding_dims")]
    pub embedding_dims: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            vector_index_path: default_vector_index_path(),
            embedding_dims: default_embedding_dims(),
        }
    }
}

/// C3 surprise-scoring weights. Kept as configuration rather than constants:
/// defaults are not empirically tuned and are expected to be adjusted per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurpriseConfig {
    #[serde(default = "default_weight_perplexity")]
    pub weight_perplexity: f64,
    #[serde(default = "default_weight_novelty")]
    pub weight_novelty: f64,
    #[serde(default = "default_perplexity_offset")]
    pub perplexity_offset: f64,
    #[serde(default = "default_perplexity_divisor")]
    pub perplexity_divisor: f64,
    #[serde(default = "default_surprise_threshold")]
    pub threshold: f64,
    #[serde(default = "default_scoring_retries")]
    pub scoring_retries: u32,
    #[serde(default = "default_capture_buffer_len")]
    pub capture_buffer_len: usize,
    /// Checkpoint start policy when no prior checkpoint exists: `false` (default)
    /// starts from the earliest unprocessed entry so nothing queued before the
    /// worker's first run is silently skipped; `true` starts from the latest.
    #[serde(default)]
    pub start_from_latest: bool,
}

impl Default for SurpriseConfig {
    fn default() -> Self {
        Self {
            weight_perplexity: default_weight_perplexity(),
            weight_novelty: default_weight_novelty(),
            perplexity_offset: default_perplexity_offset(),
            perplexity_divisor: default_perplexity_divisor(),
            threshold: default_surprise_threshold(),
            scoring_retries: default_scoring_retries(),
            capture_buffer_len: default_capture_buffer_len(),
            start_from_latest: false,
        }
    }
}

/// C3 cold-tier archival worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivalConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_archival_hour")]
    pub hour_utc: u32,
    #[serde(default = "default_archival_minute")]
    pub minute_utc: u32,
    /// Always keep at least this many of the newest records in the hot tier.
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,
    /// Records older than this many days are eligible for archival.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
    #[serde(default = "default_cold_storage_path")]
    pub cold_storage_path: String,
}

impl Default for ArchivalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hour_utc: default_archival_hour(),
            minute_utc: default_archival_minute(),
            keep_recent: default_keep_recent(),
            max_age_days: default_max_age_days(),
            cold_storage_path: default_cold_storage_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    #[serde(default = "default_persona_data_root")]
    pub data_root: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            data_root: default_persona_data_root(),
        }
    }
}

/// C4 reasoning engines: ReAct step budget and the external collaborators
/// its standard tool set calls out to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    #[serde(default = "default_agent_max_steps")]
    pub agent_max_steps: usize,
    /// URL templates tried in order for the `web_search` tool, each containing
    /// a literal `{query}` placeholder. Empty by default: the tool reports a
    /// clear configuration error rather than silently doing nothing.
    #[serde(default)]
    pub web_search_providers: Vec<String>,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            agent_max_steps: default_agent_max_steps(),
            web_search_providers: Vec::new(),
        }
    }
}

/// The sandboxed code-execution collaborator used by the `sandbox_python`
/// tool and the recursive agent's `CodeExecution` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "default_sandbox_base_url")]
    pub base_url: String,
    #[serde(default = "default_sandbox_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            base_url: default_sandbox_base_url(),
            timeout_secs: default_sandbox_timeout_secs(),
        }
    }
}

/// The speech-to-text/text-to-speech collaborator behind `/voice/*`
/// (Faster-Whisper/XTTS-v2 in the original; out of scope to reimplement —
/// this crate only proxies to it). Gated separately by `features.enable_voice`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default = "default_voice_base_url")]
    pub base_url: String,
    #[serde(default = "default_voice_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_voice_base_url(),
            timeout_secs: default_voice_timeout_secs(),
        }
    }
}

fn default_voice_base_url() -> String {
    "http://localhost:8600".to_string()
}
fn default_voice_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Run C3's capture + scoring pipeline rather than scoring inline.
    #[serde(default = "bool_true")]
    pub async_memory: bool,
    /// Expose the `/voice/*` thin stub endpoints.
    #[serde(default)]
    pub enable_voice: bool,
    /// Run the archival worker at all (independent of `archival.enabled`,
    /// this is the master switch checked at startup).
    #[serde(default = "bool_true")]
    pub archive_enabled: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            async_memory: true,
            enable_voice: false,
            archive_enabled: true,
        }
    }
}

fn bool_true() -> bool {
    true
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_rate_limit_max_requests() -> u32 {
    DEFAULT_RATE_LIMIT_MAX_REQUESTS
}
fn default_rate_limit_window_secs() -> u64 {
    DEFAULT_RATE_LIMIT_WINDOW_SECS
}
fn default_fallback_order() -> Vec<String> {
    vec!["anthropic".to_string(), "openai".to_string(), "ollama".to_string()]
}
fn default_model() -> String {
    "claude-sonnet-4-6".to_string()
}
fn default_provider_call_timeout_secs() -> u64 {
    60
}
fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_db_path() -> String {
    format!("{}/memory.db", data_root())
}
fn default_vector_index_path() -> String {
    format!("{}/vector.usearch", data_root())
}
fn default_embedding_dims() -> usize {
    384
}
fn default_weight_perplexity() -> f64 {
    0.6
}
fn default_weight_novelty() -> f64 {
    0.4
}
fn default_perplexity_offset() -> f64 {
    1.0
}
fn default_perplexity_divisor() -> f64 {
    5.0
}
fn default_surprise_threshold() -> f64 {
    0.7
}
fn default_scoring_retries() -> u32 {
    3
}
fn default_capture_buffer_len() -> usize {
    1024
}
fn default_archival_hour() -> u32 {
    3
}
fn default_archival_minute() -> u32 {
    0
}
fn default_keep_recent() -> usize {
    500
}
fn default_max_age_days() -> i64 {
    30
}
fn default_cold_storage_path() -> String {
    format!("{}/cold", data_root())
}
fn default_persona_data_root() -> String {
    data_root()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_agent_max_steps() -> usize {
    10
}
fn default_sandbox_base_url() -> String {
    "http://localhost:8700".to_string()
}
fn default_sandbox_timeout_secs() -> u64 {
    10
}

fn data_root() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cortex", home)
}

impl CortexConfig {
    /// Load config from a TOML file with `CORTEX_`-prefixed env var overrides.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: CortexConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CORTEX_").split("_"))
            .extract()
            .map_err(|e| crate::error::CortexError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    format!("{}/cortex.toml", data_root())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let cfg = CortexConfig::default();
        assert!(
            (cfg.surprise.weight_perplexity + cfg.surprise.weight_novelty - 1.0).abs() < 1e-9
        );
        assert_eq!(cfg.providers.fallback_order.len(), 3);
        assert_eq!(cfg.gateway.rate_limit.max_requests, 30);
        assert_eq!(cfg.gateway.rate_limit.window_secs, 60);
    }
}
