//! Backend identities for video generation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifies one of the video generation backends.
///
/// The ordering of the variants is the automatic selection precedence: the
/// remote API is preferred, the browser automation comes next, and the
/// placeholder is the last resort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GeneratorKind {
    /// Signed REST API (KlingAI).
    #[serde(rename = "klingai_api")]
    RemoteApi,
    /// Browser automation of the KlingAI web UI.
    #[serde(rename = "klingai_web")]
    BrowserAutomation,
    /// Local synthetic backend, no credentials needed.
    #[serde(rename = "placeholder")]
    Placeholder,
}

impl GeneratorKind {
    /// All kinds in automatic selection order.
    pub const PRECEDENCE: [GeneratorKind; 3] = [
        GeneratorKind::RemoteApi,
        GeneratorKind::BrowserAutomation,
        GeneratorKind::Placeholder,
    ];

    /// Stable wire name used in JSON results and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            GeneratorKind::RemoteApi => "klingai_api",
            GeneratorKind::BrowserAutomation => "klingai_web",
            GeneratorKind::Placeholder => "placeholder",
        }
    }

    /// Human-readable backend name.
    pub fn display_name(self) -> &'static str {
        match self {
            GeneratorKind::RemoteApi => "KlingAI API",
            GeneratorKind::BrowserAutomation => "KlingAI Web (WebDriver)",
            GeneratorKind::Placeholder => "Test Placeholder",
        }
    }

    /// Candidates tried, in order, after this kind failed or was unavailable.
    ///
    /// Each list is tried at most once per request, so a request never makes
    /// more than three attempts.
    pub fn fallback_chain(self) -> &'static [GeneratorKind] {
        match self {
            GeneratorKind::RemoteApi => {
                &[GeneratorKind::BrowserAutomation, GeneratorKind::Placeholder]
            }
            GeneratorKind::BrowserAutomation => {
                &[GeneratorKind::RemoteApi, GeneratorKind::Placeholder]
            }
            GeneratorKind::Placeholder => &[],
        }
    }

    /// Parse the short names used by `VIDEO_GENERATOR_TYPE` (`api`, `web`,
    /// `placeholder`). Returns `None` for empty, `auto` or unknown values.
    pub fn from_override(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "api" => Some(GeneratorKind::RemoteApi),
            "web" => Some(GeneratorKind::BrowserAutomation),
            "placeholder" => Some(GeneratorKind::Placeholder),
            _ => None,
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known generator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown generator type '{0}' (expected api, web or placeholder)")]
pub struct UnknownGeneratorKind(pub String);

impl FromStr for GeneratorKind {
    type Err = UnknownGeneratorKind;

    /// Accepts both the short override names and the wire names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(kind) = GeneratorKind::from_override(s) {
            return Ok(kind);
        }
        match s.trim().to_lowercase().as_str() {
            "klingai_api" => Ok(GeneratorKind::RemoteApi),
            "klingai_web" => Ok(GeneratorKind::BrowserAutomation),
            _ => Err(UnknownGeneratorKind(s.to_string())),
        }
    }
}
