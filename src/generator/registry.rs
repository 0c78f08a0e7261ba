//! Discovery and default selection of video drivers.

use std::collections::BTreeMap;

use serde::Serialize;

use super::driver::VideoDriver;
use super::kind::GeneratorKind;
use crate::config::AppConfig;
use crate::kling::KlingApiDriver;
use crate::placeholder::PlaceholderVideoDriver;
use crate::storage::ContentStore;
use crate::web::KlingWebDriver;

/// Pick the default kind among `available`.
///
/// A forced kind wins when it is available; otherwise the first available kind
/// in [`GeneratorKind::PRECEDENCE`] is chosen.
pub fn select_default(
    available: &[GeneratorKind],
    forced: Option<GeneratorKind>,
) -> Option<GeneratorKind> {
    if let Some(kind) = forced {
        if available.contains(&kind) {
            return Some(kind);
        }
        log::warn!(
            "Forced generator '{}' is not available, using automatic selection",
            kind
        );
    }
    GeneratorKind::PRECEDENCE
        .into_iter()
        .find(|kind| available.contains(kind))
}

/// One registered generator as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratorInfo {
    #[serde(rename = "type")]
    pub kind: GeneratorKind,
    pub name: &'static str,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub default_generator: Option<GeneratorKind>,
    pub available_generators: usize,
    pub generators: Vec<GeneratorInfo>,
}

/// The set of drivers usable in this process.
///
/// Built once; drivers are never added or replaced afterwards.
pub struct GeneratorRegistry {
    drivers: BTreeMap<GeneratorKind, Box<dyn VideoDriver>>,
    default_kind: Option<GeneratorKind>,
}

impl GeneratorRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Instantiate every driver whose credentials are configured.
    ///
    /// The placeholder is always registered. In placeholder-only mode it is the
    /// only driver, whatever credentials are present.
    pub fn from_config(config: &AppConfig, store: &ContentStore) -> Self {
        let mut builder = Self::builder().forced(config.generators.forced_kind());
        let credentials = &config.credentials;

        if config.generators.use_placeholder {
            log::info!("Placeholder-only mode: skipping credentialed generators");
        } else {
            match (&credentials.kling_access_key, &credentials.kling_secret_key) {
                (Some(access_key), Some(secret_key)) => {
                    match KlingApiDriver::new(
                        access_key.clone(),
                        secret_key.clone(),
                        config.klingai.clone(),
                        store.videos_dir(),
                    ) {
                        Ok(driver) => {
                            log::info!("KlingAI API generator initialized");
                            builder = builder.driver(Box::new(driver));
                        }
                        Err(e) => log::warn!("KlingAI API generator unavailable: {}", e),
                    }
                }
                _ => log::debug!("KlingAI API credentials not set"),
            }

            match (&credentials.kling_email, &credentials.kling_password) {
                (Some(email), Some(password)) => {
                    match KlingWebDriver::new(email.clone(), password.clone(), config.web.clone()) {
                        Ok(driver) => {
                            log::info!("KlingAI web generator initialized");
                            builder = builder.driver(Box::new(driver));
                        }
                        Err(e) => log::warn!("KlingAI web generator unavailable: {}", e),
                    }
                }
                _ => log::debug!("KlingAI web login not set"),
            }
        }

        builder
            .driver(Box::new(PlaceholderVideoDriver::new(store.videos_dir())))
            .build()
    }

    pub fn default_kind(&self) -> Option<GeneratorKind> {
        self.default_kind
    }

    pub fn contains(&self, kind: GeneratorKind) -> bool {
        self.drivers.contains_key(&kind)
    }

    pub fn get(&self, kind: GeneratorKind) -> Option<&dyn VideoDriver> {
        self.drivers.get(&kind).map(|driver| driver.as_ref())
    }

    pub fn kinds(&self) -> Vec<GeneratorKind> {
        self.drivers.keys().copied().collect()
    }

    pub fn available(&self) -> Vec<GeneratorInfo> {
        self.drivers
            .keys()
            .map(|&kind| GeneratorInfo {
                kind,
                name: kind.display_name(),
                available: true,
            })
            .collect()
    }

    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            default_generator: self.default_kind,
            available_generators: self.drivers.len(),
            generators: self.available(),
        }
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    drivers: BTreeMap<GeneratorKind, Box<dyn VideoDriver>>,
    forced: Option<GeneratorKind>,
}

impl RegistryBuilder {
    /// Register a driver under its own kind, replacing any earlier one.
    pub fn driver(mut self, driver: Box<dyn VideoDriver>) -> Self {
        self.drivers.insert(driver.kind(), driver);
        self
    }

    pub fn forced(mut self, forced: Option<GeneratorKind>) -> Self {
        self.forced = forced;
        self
    }

    pub fn build(self) -> GeneratorRegistry {
        let kinds: Vec<GeneratorKind> = self.drivers.keys().copied().collect();
        let default_kind = select_default(&kinds, self.forced);
        if let Some(kind) = default_kind {
            log::info!("Default video generator: {}", kind.display_name());
        }
        GeneratorRegistry {
            drivers: self.drivers,
            default_kind,
        }
    }
}
