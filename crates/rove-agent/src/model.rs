//! The chat model seam

use async_trait::async_trait;
use rove_core::{AssistantReply, ChatRequest, Result};

/// One chat-completion round trip
///
/// Implementations return the first choice's message. Transport and status
/// failures must come back as [`rove_core::RoveError`] variants the retry
/// predicates understand (`Api { status }`, `Network`, `Timeout`).
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<AssistantReply>;
}

#[async_trait]
impl<M: ChatModel + ?Sized> ChatModel for std::sync::Arc<M> {
    async fn complete(&self, request: &ChatRequest) -> Result<AssistantReply> {
        (**self).complete(request).await
    }
}
