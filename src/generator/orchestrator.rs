//! Fallback orchestration across video drivers.
//!
//! A request is dispatched to the requested (or default) kind. When that kind is
//! not registered, or its attempt fails, the orchestrator walks the static
//! fallback chain of the originally requested kind. Attempts run one after
//! another and each kind is tried at most once.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;

use super::driver::VideoDriver;
use super::kind::GeneratorKind;
use super::registry::{GeneratorRegistry, StatusReport};
use super::request::GenerationRequest;
use super::result::{AttemptError, GenerationFailure, GenerationResult, Provenance};

/// Per-call dispatch choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Kind to use instead of the registry default.
    pub requested: Option<GeneratorKind>,
    /// Whether failed or unavailable kinds may be substituted.
    pub fallback: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            requested: None,
            fallback: true,
        }
    }
}

impl DispatchOptions {
    pub fn requested(kind: GeneratorKind) -> Self {
        Self {
            requested: Some(kind),
            ..Self::default()
        }
    }

    pub fn without_fallback(mut self) -> Self {
        self.fallback = false;
        self
    }
}

pub struct Orchestrator {
    registry: GeneratorRegistry,
}

impl Orchestrator {
    pub fn new(registry: GeneratorRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &GeneratorRegistry {
        &self.registry
    }

    pub fn status_report(&self) -> StatusReport {
        self.registry.status_report()
    }

    /// Kinds that will be attempted, in order, for a request targeting
    /// `original`.
    pub fn plan(&self, original: GeneratorKind, fallback: bool) -> Vec<GeneratorKind> {
        let mut plan = Vec::with_capacity(3);
        if self.registry.contains(original) {
            plan.push(original);
        }
        if fallback {
            plan.extend(
                original
                    .fallback_chain()
                    .iter()
                    .copied()
                    .filter(|&kind| self.registry.contains(kind)),
            );
        }
        plan
    }

    /// Generate a video, falling back to other drivers when allowed.
    ///
    /// Always returns a result. On success the result carries provenance; on
    /// exhaustion it carries the last attempt's error plus the earlier ones.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        options: DispatchOptions,
    ) -> GenerationResult {
        let Some(original) = options.requested.or(self.registry.default_kind()) else {
            return GenerationResult::failure("no video generator is available");
        };

        if !self.registry.contains(original) {
            if options.fallback {
                log::warn!(
                    "{} generator is not available, looking for an alternative",
                    original
                );
            } else {
                return GenerationResult::failure(format!(
                    "{} generator is unavailable",
                    original
                ));
            }
        }

        let plan = self.plan(original, options.fallback);
        if plan.is_empty() {
            return GenerationResult::failure("no video generator is available");
        }

        let mut errors: Vec<AttemptError> = Vec::new();
        let mut attempts = 0u32;

        for kind in plan {
            let Some(driver) = self.registry.get(kind) else {
                continue;
            };
            attempts += 1;
            if attempts > 1 {
                log::info!("Retrying with fallback generator: {}", kind);
            }

            match invoke(driver, request).await {
                GenerationResult::Success(mut success) => {
                    log::info!("Video generated by {}", kind.display_name());
                    success.provenance = Some(Provenance::new(kind, original, attempts));
                    return GenerationResult::Success(success);
                }
                GenerationResult::Failure(failure) => {
                    log::error!("{} generator failed: {}", kind, failure.error);
                    errors.push(AttemptError {
                        generator: kind,
                        error: failure.error,
                    });
                }
            }
        }

        exhausted(errors)
    }
}

/// Run one attempt, turning a panicking driver into an attempt failure.
///
/// This is the only place the orchestrator intercepts anything a driver did
/// not report itself.
async fn invoke(driver: &dyn VideoDriver, request: &GenerationRequest) -> GenerationResult {
    let kind = driver.kind();
    log::info!(
        "Starting video generation with {} (image: {}, duration: {}s)",
        kind,
        request.image_path().display(),
        request.duration().seconds()
    );

    match AssertUnwindSafe(driver.generate(request)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => GenerationResult::failure(format!(
            "{} generator crashed: {}",
            kind,
            panic_message(payload.as_ref())
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn exhausted(mut errors: Vec<AttemptError>) -> GenerationResult {
    match errors.pop() {
        Some(last) => GenerationResult::Failure(GenerationFailure {
            error: last.error,
            generator: Some(last.generator),
            previous_errors: errors,
        }),
        None => GenerationResult::failure("no video generator is available"),
    }
}
