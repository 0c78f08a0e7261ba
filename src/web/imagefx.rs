//! Image generation through the ImageFX web tool.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use super::webdriver::{Locator, Session, SessionOptions, WebDriverClient, WebDriverError};
use crate::config::ImageFxConfig;
use crate::generator::{Artifact, AspectRatio, GenerationResult, ImageGenerator};
use crate::storage::stamped_name;

pub struct ImageFxGenerator {
    client: WebDriverClient,
    config: ImageFxConfig,
    images_dir: PathBuf,
    step_timeout: Duration,
}

impl ImageFxGenerator {
    pub fn new(
        webdriver_url: &str,
        config: ImageFxConfig,
        images_dir: PathBuf,
        step_timeout: Duration,
    ) -> Result<Self, WebDriverError> {
        Ok(Self {
            client: WebDriverClient::new(webdriver_url)?,
            config,
            images_dir,
            step_timeout,
        })
    }

    async fn run(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<Artifact, WebDriverError> {
        let session = self
            .client
            .start_session(SessionOptions::headless(self.config.headless))
            .await?;

        let outcome = self.render(&session, prompt, aspect_ratio).await;

        if let Err(e) = session.delete().await {
            log::warn!("Failed to close browser session: {}", e);
        }
        outcome
    }

    async fn render(
        &self,
        session: &Session,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<Artifact, WebDriverError> {
        session.navigate(&self.config.url).await?;

        let field = session
            .wait_for(&Locator::css("textarea"), self.step_timeout)
            .await?;
        session.clear(&field).await?;
        session.send_keys(&field, prompt).await?;
        log::debug!("Requested aspect ratio {} (left to the page default)", aspect_ratio);

        let create = session
            .wait_for(
                &Locator::xpath("//button[contains(., 'Create') or contains(., 'Generate')]"),
                self.step_timeout,
            )
            .await?;
        session.click(&create).await?;

        let render_timeout = Duration::from_secs(self.config.render_timeout_secs);
        session
            .wait_for(&Locator::css("img[src^=\"blob:\"]"), render_timeout)
            .await
            .map_err(|_| {
                WebDriverError::StepFailed(format!(
                    "no image appeared within {}s",
                    render_timeout.as_secs()
                ))
            })?;

        let png = session.screenshot().await?;
        tokio::fs::create_dir_all(&self.images_dir).await?;
        let path = self.images_dir.join(stamped_name("imagefx", "png"));
        tokio::fs::write(&path, png).await?;
        log::info!("Saved ImageFX capture to {}", path.display());

        Ok(Artifact::inspect(&path)?)
    }
}

#[async_trait]
impl ImageGenerator for ImageFxGenerator {
    fn name(&self) -> &'static str {
        "imagefx"
    }

    async fn generate_image(&self, prompt: &str, aspect_ratio: AspectRatio) -> GenerationResult {
        if prompt.trim().is_empty() {
            return GenerationResult::failure("prompt is required");
        }
        match self.run(prompt, aspect_ratio).await {
            Ok(artifact) => GenerationResult::artifact(artifact),
            Err(e) => GenerationResult::failure(format!("ImageFX: {}", e)),
        }
    }
}
