//! API middleware. Currently only the per-client rate limiter, which runs
//! before any handler so rejected requests never reach the backend.

pub mod rate;
