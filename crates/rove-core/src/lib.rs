//! # rove-core
//!
//! Core types for the Rove single-agent tool loop.
//!
//! Rove drives one LLM conversation against one repository: the model either
//! calls a tool or answers, and the loop keeps going until the model signals
//! `done` or the turn budget runs out.
//!
//! ## Contents
//!
//! - [`RoveError`] - the unified error type shared by every crate
//! - [`config`] - layered configuration (defaults, `.rove/config.toml`, env)
//! - [`retry`] - exponential backoff engine used for every network call
//! - [`fail_open`] - graceful degradation for non-critical calls
//! - [`types`] - transcript messages and the chat-completion wire shape

pub mod config;
mod error;
pub mod fail_open;
pub mod retry;
pub mod types;

pub use config::RoveConfig;
pub use error::{NetworkErrorKind, Result, RoveError};
pub use retry::{retry_all, with_retry, Backoff, RetryPolicy};
pub use types::*;
