//! Configuration file handling for imageauto.
//!
//! Settings are loaded from `~/.config/imageauto/config.toml` (or a custom path)
//! and then overridden by environment variables. Credentials are only ever read
//! from the environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::generator::GeneratorKind;

pub const KLINGAI_API_KEY_ENV: &str = "KLINGAI_API_KEY";
pub const KLINGAI_SECRET_KEY_ENV: &str = "KLINGAI_SECRET_KEY";
pub const KLINGAI_EMAIL_ENV: &str = "KLINGAI_EMAIL";
pub const KLINGAI_PASSWORD_ENV: &str = "KLINGAI_PASSWORD";
pub const VIDEO_GENERATOR_TYPE_ENV: &str = "VIDEO_GENERATOR_TYPE";
pub const USE_PLACEHOLDER_ENV: &str = "USE_PLACEHOLDER_GENERATOR";

/// Configuration file structure for imageauto.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub generators: GeneratorConfig,
    #[serde(default)]
    pub klingai: KlingApiConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub imagefx: ImageFxConfig,
    #[serde(default)]
    pub ffmpeg: FfmpegConfig,
    #[serde(skip)]
    pub credentials: Credentials,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the `images/`, `videos/` and `edited/` directories.
    pub content_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            content_dir: PathBuf::from("uploads"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// `api`, `web` or `placeholder`; anything else means automatic selection.
    pub forced: Option<String>,
    /// Use placeholder backends for images and videos regardless of credentials.
    pub use_placeholder: bool,
}

impl GeneratorConfig {
    /// The forced kind, if `forced` names one.
    ///
    /// Unset, empty and `auto` select automatically without comment; any
    /// other unrecognised value is logged and also selects automatically.
    pub fn forced_kind(&self) -> Option<GeneratorKind> {
        let value = self.forced.as_deref().map(str::trim)?;
        if value.is_empty() || value.eq_ignore_ascii_case("auto") {
            return None;
        }
        match value.parse::<GeneratorKind>() {
            Ok(kind) => Some(kind),
            Err(e) => {
                log::warn!("{}, selecting automatically", e);
                None
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KlingApiConfig {
    pub base_url: String,
    pub model_name: String,
    pub poll_interval_ms: u64,
    pub max_wait_secs: u64,
    pub max_image_bytes: u64,
    pub request_timeout_secs: u64,
}

impl Default for KlingApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-singapore.klingai.com".to_string(),
            model_name: "kling-v1".to_string(),
            poll_interval_ms: 5_000,
            max_wait_secs: 600,
            max_image_bytes: 10 * 1024 * 1024,
            request_timeout_secs: 30,
        }
    }
}

impl KlingApiConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    /// W3C WebDriver endpoint (chromedriver by default).
    pub webdriver_url: String,
    pub site_url: String,
    pub headless: bool,
    /// How long a primed session stays open for manual completion.
    pub hold_open_secs: u64,
    /// Ceiling for one whole browser invocation.
    pub max_session_secs: u64,
    /// Budget for locating one UI element.
    pub step_timeout_ms: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            site_url: "https://klingai.com/global/".to_string(),
            headless: false,
            hold_open_secs: 120,
            max_session_secs: 300,
            step_timeout_ms: 3_000,
        }
    }
}

impl WebConfig {
    pub fn hold_open(&self) -> Duration {
        Duration::from_secs(self.hold_open_secs)
    }

    pub fn max_session(&self) -> Duration {
        Duration::from_secs(self.max_session_secs)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ImageFxConfig {
    pub url: String,
    pub headless: bool,
    pub render_timeout_secs: u64,
}

impl Default for ImageFxConfig {
    fn default() -> Self {
        Self {
            url: "https://labs.google/fx/tools/image-fx".to_string(),
            headless: true,
            render_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FfmpegConfig {
    pub path: PathBuf,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("ffmpeg"),
        }
    }
}

/// Secrets for the credentialed backends.
#[derive(Clone, Default)]
pub struct Credentials {
    pub kling_access_key: Option<String>,
    pub kling_secret_key: Option<String>,
    pub kling_email: Option<String>,
    pub kling_password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(value: &Option<String>) -> &'static str {
            if value.is_some() {
                "<set>"
            } else {
                "<unset>"
            }
        }
        f.debug_struct("Credentials")
            .field("kling_access_key", &redact(&self.kling_access_key))
            .field("kling_secret_key", &redact(&self.kling_secret_key))
            .field("kling_email", &redact(&self.kling_email))
            .field("kling_password", &redact(&self.kling_password))
            .finish()
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

impl AppConfig {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            Self::load_from_explicit(path)
        } else {
            Ok(AppConfig::default())
        }
    }

    /// Load configuration from a path that must exist.
    pub fn load_from_explicit(path: PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            path: path.clone(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError { path, source: e })
    }

    /// Apply environment overrides from the process environment.
    pub fn with_env(mut self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok());
        self
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// Empty values count as unset.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        self.credentials = Credentials {
            kling_access_key: get(KLINGAI_API_KEY_ENV),
            kling_secret_key: get(KLINGAI_SECRET_KEY_ENV),
            kling_email: get(KLINGAI_EMAIL_ENV),
            kling_password: get(KLINGAI_PASSWORD_ENV),
        };

        if let Some(forced) = get(VIDEO_GENERATOR_TYPE_ENV) {
            self.generators.forced = Some(forced);
        }
        if let Some(flag) = get(USE_PLACEHOLDER_ENV) {
            self.generators.use_placeholder = parse_flag(&flag);
        }
        if let Some(flag) = get("KLINGAI_WEB_HEADLESS") {
            self.web.headless = parse_flag(&flag);
        }
        if let Some(flag) = get("IMAGEFX_HEADLESS") {
            self.imagefx.headless = parse_flag(&flag);
        }
        if let Some(url) = get("WEBDRIVER_URL") {
            self.web.webdriver_url = url;
        }
        if let Some(path) = get("FFMPEG_PATH") {
            self.ffmpeg.path = PathBuf::from(path);
        }
        if let Some(dir) = get("CONTENT_DIR") {
            self.storage.content_dir = PathBuf::from(dir);
        }
        if let Some(host) = get("HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => log::warn!("Ignoring invalid PORT value '{}'", port),
            }
        }
    }

    /// Render the file-backed part of the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeError)
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    SerializeError(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::SerializeError(source) => {
                write!(f, "Failed to serialize config: {}", source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::SerializeError(source) => Some(source),
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("imageauto").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/imageauto/config.toml")
        })
}
