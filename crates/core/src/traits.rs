use crate::{ChatMessage, CompletionRequest, LlmError};
use async_trait::async_trait;

/// A single chat completion round trip. Retries, timeouts and quota handling
/// belong to the implementation; callers propagate its errors unchanged.
#[async_trait]
pub trait ChatCompletion {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        request: &CompletionRequest,
    ) -> Result<String, LlmError>;
}

#[async_trait]
impl<T> ChatCompletion for std::sync::Arc<T>
where
    T: ChatCompletion + Send + Sync + ?Sized,
{
    async fn complete(
        &self,
        messages: &[ChatMessage],
        request: &CompletionRequest,
    ) -> Result<String, LlmError> {
        (**self).complete(messages, request).await
    }
}
