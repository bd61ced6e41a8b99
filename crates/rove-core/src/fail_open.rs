//! Fail-open helpers for non-critical calls
//!
//! Some LLM calls only polish the conversation: rewriting the user's request
//! before the first turn, or asking for a follow-up reply after the model
//! went quiet. When those fail the task carries on without them.
//!
//! DO NOT use fail-open for:
//! - The main turn request (the task cannot continue without it)
//! - Tool execution (failures are reported back to the model instead)

use std::future::Future;
use tracing::warn;

use crate::Result;

/// Await an operation whose failure should not stop the task
///
/// Logs the error via `tracing::warn!` and returns `None`.
///
/// ```no_run
/// use rove_core::fail_open::fail_open;
/// use rove_core::Result;
///
/// async fn enhance() -> Result<String> {
///     Ok("clearer request".to_string())
/// }
///
/// async fn example() {
///     let prompt = fail_open("prompt_enhancement", enhance())
///         .await
///         .unwrap_or_else(|| "original request".to_string());
/// }
/// ```
pub async fn fail_open<Fut, T>(operation_name: &str, operation: Fut) -> Option<T>
where
    Fut: Future<Output = Result<T>>,
{
    match operation.await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}
