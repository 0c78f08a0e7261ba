//! Image generation backends.
//!
//! Image generation has exactly one active backend per process, chosen at
//! startup. There is no fallback between image backends.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::result::GenerationResult;

/// Supported output aspect ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:3")]
    Standard,
    #[serde(rename = "3:4")]
    StandardPortrait,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Portrait => "9:16",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Square => "1:1",
            AspectRatio::Standard => "4:3",
            AspectRatio::StandardPortrait => "3:4",
        }
    }

    /// Pixel size used by the local backends.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            AspectRatio::Portrait => (720, 1280),
            AspectRatio::Landscape => (1280, 720),
            AspectRatio::Square => (1024, 1024),
            AspectRatio::Standard => (1024, 768),
            AspectRatio::StandardPortrait => (768, 1024),
        }
    }

    /// Parse a ratio, falling back to square for unknown values.
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or(AspectRatio::Square)
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "9:16" => Ok(AspectRatio::Portrait),
            "16:9" => Ok(AspectRatio::Landscape),
            "1:1" => Ok(AspectRatio::Square),
            "4:3" => Ok(AspectRatio::Standard),
            "3:4" => Ok(AspectRatio::StandardPortrait),
            other => Err(format!("unsupported aspect ratio '{}'", other)),
        }
    }
}

/// Produces a still image from a prompt.
///
/// Like [`super::VideoDriver`], failures come back as
/// [`GenerationResult::Failure`].
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Short backend name for logs and status reports.
    fn name(&self) -> &'static str;

    async fn generate_image(&self, prompt: &str, aspect_ratio: AspectRatio) -> GenerationResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions_table() {
        assert_eq!(AspectRatio::Portrait.dimensions(), (720, 1280));
        assert_eq!(AspectRatio::Landscape.dimensions(), (1280, 720));
        assert_eq!(AspectRatio::Square.dimensions(), (1024, 1024));
        assert_eq!(AspectRatio::Standard.dimensions(), (1024, 768));
        assert_eq!(AspectRatio::StandardPortrait.dimensions(), (768, 1024));
    }

    #[test]
    fn test_unknown_ratio_is_square() {
        assert_eq!(AspectRatio::parse_lenient("21:9"), AspectRatio::Square);
        assert_eq!(AspectRatio::parse_lenient("16:9"), AspectRatio::Landscape);
    }

    #[test]
    fn test_serde_uses_ratio_strings() {
        let ratio: AspectRatio = serde_json::from_str("\"3:4\"").unwrap();
        assert_eq!(ratio, AspectRatio::StandardPortrait);
        assert_eq!(serde_json::to_string(&AspectRatio::Portrait).unwrap(), "\"9:16\"");
    }
}
