//! Video generator selection and fallback.
//!
//! Drivers implement [`VideoDriver`]; the [`GeneratorRegistry`] decides which
//! ones exist and which is the default, and the [`Orchestrator`] runs a
//! request against them with fallback and provenance tagging.

mod driver;
mod image;
mod kind;
mod orchestrator;
mod registry;
mod request;
mod result;

pub use driver::VideoDriver;
pub use image::{AspectRatio, ImageGenerator};
pub use kind::{GeneratorKind, UnknownGeneratorKind};
pub use orchestrator::{DispatchOptions, Orchestrator};
pub use registry::{select_default, GeneratorInfo, GeneratorRegistry, RegistryBuilder, StatusReport};
pub use request::{
    GenerationRequest, GenerationRequestBuilder, QualityMode, ValidationError, VideoDuration,
    DEFAULT_CFG_SCALE, MAX_OUTPUT_COUNT,
};
pub use result::{
    Artifact, AttemptError, GenerationFailure, GenerationOutput, GenerationResult,
    GenerationSuccess, Provenance,
};
