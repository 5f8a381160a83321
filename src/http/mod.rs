//! HTTP layer — low-level REST client with per-endpoint retry policies.

pub mod client;
pub mod retry;

pub use client::NotifyHttp;
pub use retry::{RetryConfig, RetryPolicy};
