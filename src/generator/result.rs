//! Normalized results returned by every generator.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::kind::GeneratorKind;

/// A produced file on local storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
}

impl Artifact {
    /// Describe an existing, non-empty file.
    ///
    /// Fails when the file is missing or empty, so a successful result never
    /// points at nothing.
    pub fn inspect(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() || metadata.len() == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("artifact {} is empty or not a file", path.display()),
            ));
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            size_bytes: metadata.len(),
        })
    }
}

/// What a successful generation produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "output", rename_all = "snake_case")]
pub enum GenerationOutput {
    /// A finished file.
    Artifact(Artifact),
    /// The backend UI was primed but the final submission is left to a human.
    AwaitingManualCompletion { message: String },
}

/// Which backend produced a result and whether a fallback happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provenance {
    pub generator_type: GeneratorKind,
    pub generator_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_from: Option<GeneratorKind>,
    pub attempts: u32,
}

impl Provenance {
    /// Provenance for `kind`, recording `requested` only when it differs.
    pub fn new(kind: GeneratorKind, requested: GeneratorKind, attempts: u32) -> Self {
        Self {
            generator_type: kind,
            generator_name: kind.display_name().to_string(),
            fallback_from: (kind != requested).then_some(requested),
            attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationSuccess {
    #[serde(flatten)]
    pub output: GenerationOutput,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Summary of an earlier failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptError {
    pub generator: GeneratorKind,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationFailure {
    /// Message of the most recent attempt.
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<GeneratorKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub previous_errors: Vec<AttemptError>,
}

/// Outcome of a generation or edit call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum GenerationResult {
    Success(GenerationSuccess),
    Failure(GenerationFailure),
}

impl GenerationResult {
    pub fn artifact(artifact: Artifact) -> Self {
        GenerationResult::Success(GenerationSuccess {
            output: GenerationOutput::Artifact(artifact),
            provenance: None,
            note: None,
        })
    }

    pub fn awaiting_manual_completion(message: impl Into<String>) -> Self {
        GenerationResult::Success(GenerationSuccess {
            output: GenerationOutput::AwaitingManualCompletion {
                message: message.into(),
            },
            provenance: None,
            note: None,
        })
    }

    pub fn failure(error: impl Into<String>) -> Self {
        GenerationResult::Failure(GenerationFailure {
            error: error.into(),
            generator: None,
            previous_errors: Vec::new(),
        })
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        if let GenerationResult::Success(success) = &mut self {
            success.note = Some(note.into());
        }
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GenerationResult::Success(_))
    }

    /// The produced file, if this is an artifact success.
    pub fn artifact_ref(&self) -> Option<&Artifact> {
        match self {
            GenerationResult::Success(GenerationSuccess {
                output: GenerationOutput::Artifact(artifact),
                ..
            }) => Some(artifact),
            _ => None,
        }
    }

    pub fn provenance(&self) -> Option<&Provenance> {
        match self {
            GenerationResult::Success(success) => success.provenance.as_ref(),
            GenerationResult::Failure(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            GenerationResult::Failure(failure) => Some(&failure.error),
            GenerationResult::Success(_) => None,
        }
    }
}
