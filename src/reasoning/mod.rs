pub mod types;
pub mod recovery;
pub mod classify;
pub mod sanitize;
pub mod prompt;
pub mod client;
pub mod gateway;
pub mod remote;

pub use types::*;
pub use recovery::*;
pub use classify::*;
pub use sanitize::*;
pub use prompt::*;
pub use client::*;
pub use gateway::*;
pub use remote::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReasoningError {
    #[error("Reasoning endpoint is not reachable at {0}")]
    Connection(String),

    #[error("Reasoning endpoint rate limited the request")]
    RateLimited { retry_after: Option<u64> },

    #[error("Reasoning endpoint returned error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("No usable diagnosis conditions after {0} attempts")]
    NoConditions(usize),
}

impl ReasoningError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ReasoningError::RateLimited { .. })
    }

    /// Transport-level failures worth another attempt. Rate limits never are.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReasoningError::Connection(_)
                | ReasoningError::HttpClient(_)
                | ReasoningError::Upstream { .. }
                | ReasoningError::ResponseParsing(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_not_retryable() {
        let err = ReasoningError::RateLimited { retry_after: Some(30) };
        assert!(err.is_rate_limited());
        assert!(!err.is_retryable());
    }

    #[test]
    fn transport_errors_are_retryable() {
        assert!(ReasoningError::Connection("http://x".into()).is_retryable());
        assert!(ReasoningError::HttpClient("timeout".into()).is_retryable());
        assert!(ReasoningError::Upstream { status: 503, body: String::new() }.is_retryable());
        assert!(!ReasoningError::NoConditions(3).is_retryable());
    }

    #[test]
    fn upstream_error_message_includes_status() {
        let err = ReasoningError::Upstream { status: 502, body: "bad gateway".into() };
        assert_eq!(
            err.to_string(),
            "Reasoning endpoint returned error (status 502): bad gateway"
        );
    }
}
