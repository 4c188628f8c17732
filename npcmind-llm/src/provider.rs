//! The seam between the tier chain and concrete backends.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{ProviderReply, ProviderRequest};

/// One inference backend.
///
/// Implementations only perform the call. Deadlines are enforced by the
/// caller, which drops the future when a tier's timeout expires; a reply
/// that would have arrived later is never observed.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Model or backend name for logs.
    fn name(&self) -> &str;

    /// Send `request` and return the raw reply text.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Transport`] or [`ProviderError::Http`] when
    /// the backend cannot be reached or refuses the request, and
    /// [`ProviderError::MalformedResponse`] when the reply envelope is not
    /// what the backend's API documents.
    async fn complete(&self, request: &ProviderRequest) -> Result<ProviderReply, ProviderError>;
}
