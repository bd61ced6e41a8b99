//! # rove-agent
//!
//! Everything that talks to the network on behalf of the agent loop.
//!
//! - [`ChatModel`] - the one seam between the loop and an LLM endpoint
//! - [`OpenAiClient`] - OpenAI-compatible chat-completions client (Bearer or Azure auth)
//! - [`complete_with_retry`] - LLM calls retried on 429, 5xx, and connection failures
//! - [`HttpFetcher`] - outbound GET/HEAD with a fresh timeout per attempt and retries
//! - [`testing`] - scripted model and stub HTTP server for tests
//!
//! Both wrappers sit on top of [`rove_core::retry::with_retry`].

mod client;
mod http;
mod model;
mod retry;
pub mod testing;

pub use client::{classify_reqwest_error, OpenAiClient};
pub use http::{is_retryable_http_error, HttpFetcher, HttpResponse};
pub use model::ChatModel;
pub use retry::{complete_with_retry, is_retryable_llm_error};
