//! The capability every video backend implements.

use async_trait::async_trait;

use super::kind::GeneratorKind;
use super::request::GenerationRequest;
use super::result::GenerationResult;

/// Produces a video from an image and a prompt.
///
/// Implementations hold no per-call state and must be callable at any time.
/// `generate` reports every internal failure (network, timeout, missing
/// credentials, automation step) as [`GenerationResult::Failure`]; it is the
/// only place a driver converts its own errors.
#[async_trait]
pub trait VideoDriver: Send + Sync {
    fn kind(&self) -> GeneratorKind;

    async fn generate(&self, request: &GenerationRequest) -> GenerationResult;
}
