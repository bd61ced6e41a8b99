//! Resilient LLM calls

use rove_core::retry::{with_retry, Backoff, RetryPolicy};
use rove_core::{AssistantReply, ChatRequest, Result, RoveError};
use tracing::{instrument, warn};

use crate::model::ChatModel;

/// Rate limiting, server errors, and connection failures are worth retrying
pub fn is_retryable_llm_error(err: &RoveError) -> bool {
    err.is_rate_limited() || err.is_server_error() || err.is_connection_failure()
}

/// Log line for a failed attempt that is about to be retried
///
/// Rate limiting is reported separately from other failures.
fn retry_message(err: &RoveError, attempt: u32) -> String {
    if err.is_rate_limited() {
        format!("LLM rate limited (429) on attempt {}, backing off", attempt)
    } else {
        format!("LLM call failed on attempt {}: {}", attempt, err)
    }
}

/// Call `model` with retries under `backoff`
///
/// No timeout is added here; the model's transport has its own.
#[instrument(skip_all, fields(model = %request.model))]
pub async fn complete_with_retry<M>(
    model: &M,
    request: &ChatRequest,
    backoff: Backoff,
) -> Result<AssistantReply>
where
    M: ChatModel + ?Sized,
{
    let policy = RetryPolicy::new(backoff, is_retryable_llm_error)
        .on_retry(|err, attempt| warn!("{}", retry_message(err, attempt)));

    with_retry(&policy, || model.complete(request)).await
}
