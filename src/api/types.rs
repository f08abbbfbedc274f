//! Shared types for the gateway API layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::reasoning::types::ReasoningBackend;

/// Requests allowed per client in any 60-second window.
pub const REQUESTS_PER_MINUTE: u32 = 60;

/// Requests allowed per client in any one-hour window.
pub const REQUESTS_PER_HOUR: u32 = 600;

/// Most client ids tracked at once. New ids beyond this are refused until
/// older windows expire.
pub const MAX_TRACKED_CLIENTS: usize = 10_000;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

// ═══════════════════════════════════════════════════════════
// API context - shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware. Holds no conversation
/// state.
#[derive(Clone)]
pub struct ApiContext {
    pub backend: Arc<dyn ReasoningBackend + Send + Sync>,
    pub model: String,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl ApiContext {
    pub fn new(backend: Arc<dyn ReasoningBackend + Send + Sync>, model: &str) -> Self {
        Self::with_rate_limiter(backend, model, RateLimiter::new())
    }

    pub fn with_rate_limiter(
        backend: Arc<dyn ReasoningBackend + Send + Sync>,
        model: &str,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            backend,
            model: model.to_string(),
            rate_limiter: Arc::new(Mutex::new(limiter)),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Rate limiter - per-client sliding windows
// ═══════════════════════════════════════════════════════════

/// Sliding-window rate limiter keyed by client id.
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    per_minute: u32,
    per_hour: u32,
    max_clients: usize,
    last_sweep: Option<Instant>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(REQUESTS_PER_MINUTE, REQUESTS_PER_HOUR)
    }

    pub fn with_limits(per_minute: u32, per_hour: u32) -> Self {
        Self {
            windows: HashMap::new(),
            per_minute,
            per_hour,
            max_clients: MAX_TRACKED_CLIENTS,
            last_sweep: None,
        }
    }

    pub fn with_max_clients(mut self, max_clients: usize) -> Self {
        self.max_clients = max_clients.max(1);
        self
    }

    /// Check if a client is within rate limits. Returns `Ok(())` or
    /// `Err(retry_after_secs)` if exceeded.
    pub fn check(&mut self, client_id: &str) -> Result<(), u64> {
        self.check_at(client_id, Instant::now())
    }

    fn check_at(&mut self, client_id: &str, now: Instant) -> Result<(), u64> {
        let sweep_due = self
            .last_sweep
            .map_or(true, |last| now.saturating_duration_since(last) >= MINUTE);
        if sweep_due || self.windows.len() >= self.max_clients {
            self.sweep(now);
        }

        if !self.windows.contains_key(client_id) && self.windows.len() >= self.max_clients {
            tracing::warn!(tracked = self.windows.len(), "Rate limiter client table full");
            return Err(60);
        }

        let entries = self.windows.entry(client_id.to_string()).or_default();

        entries.retain(|ts| now.saturating_duration_since(*ts) < HOUR);

        let last_minute = entries
            .iter()
            .filter(|ts| now.saturating_duration_since(**ts) < MINUTE)
            .count() as u32;
        if last_minute >= self.per_minute {
            return Err(60);
        }

        if entries.len() as u32 >= self.per_hour {
            return Err(3600);
        }

        entries.push(now);
        Ok(())
    }

    /// Number of client ids currently held.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Drop every client whose window holds nothing from the last hour.
    fn sweep(&mut self, now: Instant) {
        self.windows
            .retain(|_, entries| entries.iter().any(|ts| now.saturating_duration_since(*ts) < HOUR));
        self.last_sweep = Some(now);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_minute_limit() {
        let mut limiter = RateLimiter::with_limits(3, 100);
        for _ in 0..3 {
            assert!(limiter.check("tablet").is_ok());
        }
        assert_eq!(limiter.check("tablet"), Err(60));
    }

    #[test]
    fn hour_limit_applies_independently() {
        let mut limiter = RateLimiter::with_limits(100, 2);
        assert!(limiter.check("tablet").is_ok());
        assert!(limiter.check("tablet").is_ok());
        assert_eq!(limiter.check("tablet"), Err(3600));
    }

    #[test]
    fn clients_are_isolated() {
        let mut limiter = RateLimiter::with_limits(1, 10);
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_err());
        assert!(limiter.check("b").is_ok());
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn expired_clients_are_forgotten() {
        let mut limiter = RateLimiter::with_limits(5, 50);
        let start = Instant::now();
        for i in 0..100 {
            assert!(limiter.check_at(&format!("client-{i}"), start).is_ok());
        }
        assert_eq!(limiter.tracked_clients(), 100);

        let later = start + HOUR + Duration::from_secs(1);
        assert!(limiter.check_at("client-new", later).is_ok());
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn recent_clients_survive_a_sweep() {
        let mut limiter = RateLimiter::with_limits(5, 50);
        let start = Instant::now();
        assert!(limiter.check_at("old", start).is_ok());
        assert!(limiter.check_at("recent", start + Duration::from_secs(3000)).is_ok());

        assert!(limiter
            .check_at("fresh", start + HOUR + Duration::from_secs(1))
            .is_ok());
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn client_table_is_capped() {
        let mut limiter = RateLimiter::with_limits(5, 50).with_max_clients(3);
        let start = Instant::now();
        for id in ["a", "b", "c"] {
            assert!(limiter.check_at(id, start).is_ok());
        }
        assert_eq!(limiter.check_at("d", start), Err(60));
        assert!(limiter.check_at("a", start).is_ok());
        assert_eq!(limiter.tracked_clients(), 3);

        // Once the old windows lapse, new ids get in again
        assert!(limiter.check_at("d", start + HOUR).is_ok());
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn default_limits() {
        let limiter = RateLimiter::default();
        assert_eq!(limiter.per_minute, REQUESTS_PER_MINUTE);
        assert_eq!(limiter.per_hour, REQUESTS_PER_HOUR);
    }
}
