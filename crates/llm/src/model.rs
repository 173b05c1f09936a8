//! Completion model port.

use async_trait::async_trait;
use pipeline::{CollaboratorError, GenerationUsage, PhaseName};

/// One prompt sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// Phase issuing the prompt, for routing and accounting.
    pub phase: PhaseName,
    /// System instructions.
    pub system: String,
    /// User prompt.
    pub prompt: String,
    /// Output token ceiling.
    pub max_tokens: u32,
}

/// The model's answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Raw text output.
    pub text: String,
    /// Tokens and cost for the call.
    pub usage: GenerationUsage,
}

/// A hosted text-completion model.
///
/// Implementations map rate limits and 5xx responses to
/// [`CollaboratorError::Transient`] (with `retry_after` when the provider
/// suggests one) and refusals to [`CollaboratorError::Rejected`].
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Completes `request`.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CollaboratorError>;
}

#[async_trait]
impl<T: CompletionModel + ?Sized> CompletionModel for std::sync::Arc<T> {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CollaboratorError> {
        (**self).complete(request).await
    }
}
