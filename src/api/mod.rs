//! HTTP surface of the reasoning gateway.
//!
//! Stateless: every request carries the full conversation history, so any
//! instance can serve any turn. Routes are nested under `/api/` behind a
//! per-client rate limiter.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::gateway_api_router;
pub use server::{start_gateway_server_on, GatewayServer, GatewaySession};
pub use types::ApiContext;
