//! API endpoint handlers. Backend calls are blocking and run on
//! `spawn_blocking`.

pub mod diagnose;
pub mod health;
pub mod interactive;
