//! Validated video generation requests.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default creativity scale when the caller does not send one.
pub const DEFAULT_CFG_SCALE: f32 = 0.5;

/// Largest number of outputs any backend can produce in one request.
pub const MAX_OUTPUT_COUNT: u8 = 4;

/// Generation quality mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QualityMode {
    #[default]
    #[serde(rename = "std", alias = "standard")]
    Standard,
    #[serde(rename = "pro", alias = "professional")]
    Professional,
}

impl QualityMode {
    pub fn as_str(self) -> &'static str {
        match self {
            QualityMode::Standard => "std",
            QualityMode::Professional => "pro",
        }
    }
}

impl fmt::Display for QualityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "std" | "standard" => Ok(QualityMode::Standard),
            "pro" | "professional" => Ok(QualityMode::Professional),
            other => Err(ValidationError::UnsupportedMode(other.to_string())),
        }
    }
}

/// Video length supported by the backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoDuration {
    #[default]
    Five,
    Ten,
}

impl VideoDuration {
    pub fn seconds(self) -> u32 {
        match self {
            VideoDuration::Five => 5,
            VideoDuration::Ten => 10,
        }
    }
}

impl TryFrom<u32> for VideoDuration {
    type Error = ValidationError;

    fn try_from(secs: u32) -> Result<Self, Self::Error> {
        match secs {
            5 => Ok(VideoDuration::Five),
            10 => Ok(VideoDuration::Ten),
            other => Err(ValidationError::UnsupportedDuration(other)),
        }
    }
}

impl Serialize for VideoDuration {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.seconds())
    }
}

/// Errors for requests that no backend could satisfy.
///
/// These are reported before any driver runs and are never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("unsupported duration {0}s (supported: 5, 10)")]
    UnsupportedDuration(u32),

    #[error("cfg_scale must be between 0.0 and 1.0, got {0}")]
    CfgScaleOutOfRange(f32),

    #[error("unsupported mode '{0}' (supported: std, pro)")]
    UnsupportedMode(String),

    #[error("input image not found: {}", .0.display())]
    ImageNotFound(PathBuf),

    #[error("{0}")]
    Invalid(String),
}

/// Input to every video driver.
///
/// Only obtainable through [`GenerationRequestBuilder::build`], so every value
/// already satisfies the bounds the drivers rely on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    image_path: PathBuf,
    prompt: String,
    negative_prompt: String,
    cfg_scale: f32,
    mode: QualityMode,
    duration: VideoDuration,
    output_count: u8,
}

impl GenerationRequest {
    pub fn builder(
        image_path: impl Into<PathBuf>,
        prompt: impl Into<String>,
    ) -> GenerationRequestBuilder {
        GenerationRequestBuilder {
            image_path: image_path.into(),
            prompt: prompt.into(),
            negative_prompt: String::new(),
            cfg_scale: DEFAULT_CFG_SCALE,
            mode: QualityMode::default(),
            duration: 5,
            output_count: 1,
            require_existing_image: true,
        }
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn negative_prompt(&self) -> &str {
        &self.negative_prompt
    }

    pub fn cfg_scale(&self) -> f32 {
        self.cfg_scale
    }

    pub fn mode(&self) -> QualityMode {
        self.mode
    }

    pub fn duration(&self) -> VideoDuration {
        self.duration
    }

    pub fn output_count(&self) -> u8 {
        self.output_count
    }
}

/// Builder collecting raw request fields before validation.
#[derive(Debug, Clone)]
pub struct GenerationRequestBuilder {
    image_path: PathBuf,
    prompt: String,
    negative_prompt: String,
    cfg_scale: f32,
    mode: QualityMode,
    duration: u32,
    output_count: u32,
    require_existing_image: bool,
}

impl GenerationRequestBuilder {
    pub fn negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        self.negative_prompt = negative_prompt.into();
        self
    }

    pub fn cfg_scale(mut self, cfg_scale: f32) -> Self {
        self.cfg_scale = cfg_scale;
        self
    }

    pub fn mode(mut self, mode: QualityMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn duration(mut self, seconds: u32) -> Self {
        self.duration = seconds;
        self
    }

    /// Requested number of outputs; clamped to `1..=4` on build.
    pub fn output_count(mut self, count: u32) -> Self {
        self.output_count = count;
        self
    }

    /// Skip the up-front existence check of the input image.
    ///
    /// Drivers then report a missing image as an ordinary attempt failure.
    pub fn allow_missing_image(mut self) -> Self {
        self.require_existing_image = false;
        self
    }

    pub fn build(self) -> Result<GenerationRequest, ValidationError> {
        if self.image_path.as_os_str().is_empty() {
            return Err(ValidationError::MissingField("image_path"));
        }
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::MissingField("prompt"));
        }
        let duration = VideoDuration::try_from(self.duration)?;
        if !(0.0..=1.0).contains(&self.cfg_scale) {
            return Err(ValidationError::CfgScaleOutOfRange(self.cfg_scale));
        }
        if self.require_existing_image && !self.image_path.is_file() {
            return Err(ValidationError::ImageNotFound(self.image_path));
        }

        let output_count = self.output_count.clamp(1, MAX_OUTPUT_COUNT as u32) as u8;

        Ok(GenerationRequest {
            image_path: self.image_path,
            prompt: self.prompt,
            negative_prompt: self.negative_prompt,
            cfg_scale: self.cfg_scale,
            mode: self.mode,
            duration,
            output_count,
        })
    }
}
