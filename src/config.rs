use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::diagnosis::RankingFilter;

/// Application-level constants
pub const APP_NAME: &str = "Triage Dialogue";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default chat-completion base URL (local Ollama, OpenAI-compatible surface).
pub const DEFAULT_LLM_BASE_URL: &str = "http://localhost:11434/v1";
pub const DEFAULT_LLM_MODEL: &str = "medgemma";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;
pub const DEFAULT_BIND_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8787);

/// Minimum score a ranked condition needs to be shown.
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.1;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "triage_dialogue=info,tower_http=warn"
}

/// Runtime configuration for the gateway binary.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub timeout_secs: u64,
    pub retry_backoff: Duration,
    pub bind_addr: SocketAddr,
    pub score_threshold: f32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            llm_api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            bind_addr: DEFAULT_BIND_ADDR,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }
}

impl GatewayConfig {
    /// Build the configuration from `TRIAGE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Unparseable values are logged and replaced by the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let llm_base_url = non_empty("TRIAGE_LLM_BASE_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .unwrap_or(defaults.llm_base_url);
        let llm_model = non_empty("TRIAGE_LLM_MODEL")
            .map(|v| v.trim().to_string())
            .unwrap_or(defaults.llm_model);
        let llm_api_key = non_empty("TRIAGE_LLM_API_KEY").map(|v| v.trim().to_string());

        let timeout_secs = parse_or("TRIAGE_LLM_TIMEOUT_SECS", non_empty("TRIAGE_LLM_TIMEOUT_SECS"), defaults.timeout_secs)
            .max(1);
        let retry_backoff = Duration::from_millis(parse_or(
            "TRIAGE_RETRY_BACKOFF_MS",
            non_empty("TRIAGE_RETRY_BACKOFF_MS"),
            DEFAULT_RETRY_BACKOFF_MS,
        ));
        let bind_addr = parse_or("TRIAGE_BIND_ADDR", non_empty("TRIAGE_BIND_ADDR"), defaults.bind_addr);

        let score_threshold: f32 = parse_or(
            "TRIAGE_SCORE_THRESHOLD",
            non_empty("TRIAGE_SCORE_THRESHOLD"),
            defaults.score_threshold,
        );
        let score_threshold = if (0.0..=1.0).contains(&score_threshold) {
            score_threshold
        } else {
            tracing::warn!(score_threshold, "Score threshold outside 0..1, using default");
            DEFAULT_SCORE_THRESHOLD
        };

        Self {
            llm_base_url,
            llm_model,
            llm_api_key,
            timeout_secs,
            retry_backoff,
            bind_addr,
            score_threshold,
        }
    }

    /// Ranking filter for library callers that drive a
    /// `ConversationOrchestrator`. The HTTP gateway serves diagnoses
    /// unfiltered, so the binary itself does not use it.
    pub fn ranking_filter(&self) -> RankingFilter {
        RankingFilter::new(self.score_threshold)
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(value) => match value.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!(key, "Invalid configuration value, using default");
                default
            }
        },
    }
}
