//! KlingAI web UI automation.
//!
//! Primes the image-to-video form in a real browser and leaves the final
//! "Generate" click to a human. The browser stays open for a while so the
//! user can finish, then the session is closed.

use std::path::PathBuf;

use async_trait::async_trait;

use super::webdriver::{Locator, Session, SessionOptions, WebDriverClient, WebDriverError};
use crate::config::WebConfig;
use crate::generator::{GenerationRequest, GenerationResult, GeneratorKind, VideoDriver};

pub struct KlingWebDriver {
    email: String,
    password: String,
    config: WebConfig,
    client: WebDriverClient,
}

impl KlingWebDriver {
    pub fn new(email: String, password: String, config: WebConfig) -> Result<Self, WebDriverError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(WebDriverError::MissingCredentials);
        }
        let client = WebDriverClient::new(&config.webdriver_url)?;
        Ok(Self {
            email,
            password,
            config,
            client,
        })
    }

    async fn run(&self, request: &GenerationRequest) -> Result<String, WebDriverError> {
        let image = tokio::fs::canonicalize(request.image_path())
            .await
            .map_err(|e| {
                WebDriverError::StepFailed(format!(
                    "input image {} is not readable: {}",
                    request.image_path().display(),
                    e
                ))
            })?;

        let session = self
            .client
            .start_session(SessionOptions::headless(self.config.headless))
            .await?;

        let ceiling = self.config.max_session();
        let outcome = tokio::time::timeout(ceiling, self.prime(&session, request, image)).await;

        if let Err(e) = session.delete().await {
            log::warn!("Failed to close browser session: {}", e);
        }

        match outcome {
            Ok(result) => result,
            Err(_) => Err(WebDriverError::SessionTimeout {
                secs: ceiling.as_secs(),
            }),
        }
    }

    async fn prime(
        &self,
        session: &Session,
        request: &GenerationRequest,
        image: PathBuf,
    ) -> Result<String, WebDriverError> {
        log::info!("Opening {}", self.config.site_url);
        session.navigate(&self.config.site_url).await?;

        self.login(session).await?;
        self.open_image_to_video(session).await?;
        self.upload_image(session, &image).await?;
        self.fill_prompts(session, request).await?;

        let hold = self.config.hold_open();
        log::info!(
            "Form is ready; press Generate in the browser. Keeping it open for {:?}",
            hold
        );
        tokio::time::sleep(hold).await;

        Ok("KlingAI video generation is set up in the browser; press Generate to finish".to_string())
    }

    async fn login(&self, session: &Session) -> Result<(), WebDriverError> {
        let step = self.config.step_timeout();
        let sign_in = session
            .find_first_of(
                &[
                    Locator::xpath("//button[contains(., 'Sign in')]"),
                    Locator::xpath("//a[contains(., 'Sign in')]"),
                    Locator::xpath("//*[self::button or self::a][contains(., 'Log in') or contains(., 'Login')]"),
                ],
                step,
            )
            .await?;

        let Some(sign_in) = sign_in else {
            log::info!("No sign-in button, assuming an existing login");
            return Ok(());
        };
        session.click(&sign_in).await?;

        let email = session
            .find_first_of(
                &[
                    Locator::css("input[type=\"email\"]"),
                    Locator::css("input[placeholder*=\"email\" i]"),
                ],
                step,
            )
            .await?
            .ok_or_else(|| WebDriverError::StepFailed("login form did not appear".to_string()))?;
        session.send_keys(&email, &self.email).await?;

        let password = session
            .wait_for(&Locator::css("input[type=\"password\"]"), step)
            .await?;
        session.send_keys(&password, &self.password).await?;

        let submit = session
            .find_first_of(
                &[
                    Locator::css("button[type=\"submit\"]"),
                    Locator::xpath("//button[contains(., 'Sign in') or contains(., 'Login')]"),
                ],
                step,
            )
            .await?
            .ok_or_else(|| WebDriverError::StepFailed("login submit button not found".to_string()))?;
        session.click(&submit).await?;
        log::info!("Login submitted");
        Ok(())
    }

    async fn open_image_to_video(&self, session: &Session) -> Result<(), WebDriverError> {
        let step = self.config.step_timeout();

        let create = session
            .find_first_of(
                &[
                    Locator::xpath("//*[self::button or self::a or @role='button'][normalize-space(.)='Create']"),
                    Locator::xpath("//*[self::button or self::a][contains(., 'Create')]"),
                ],
                step,
            )
            .await?
            .ok_or_else(|| WebDriverError::StepFailed("Create button not found".to_string()))?;
        session.click(&create).await?;

        let url = session.current_url().await?.to_lowercase();
        if url.contains("video") {
            log::debug!("Already on the video page");
        } else {
            let video = session
                .find_first_of(
                    &[
                        Locator::xpath("//*[contains(@class, 'menu-item')][contains(., 'Video')]"),
                        Locator::xpath("//a[contains(@href, 'video')]"),
                        Locator::xpath("//*[self::button or self::a][contains(., 'Video')]"),
                    ],
                    step,
                )
                .await?
                .ok_or_else(|| WebDriverError::StepFailed("Video option not found".to_string()))?;
            session.click(&video).await?;
        }

        match session
            .find_first_of(
                &[Locator::xpath("//*[self::button or self::div][normalize-space(.)='Image to Video']")],
                step,
            )
            .await?
        {
            Some(tab) => session.click(&tab).await?,
            None => log::debug!("Image to Video tab not found, assuming it is selected"),
        }
        Ok(())
    }

    async fn upload_image(&self, session: &Session, image: &std::path::Path) -> Result<(), WebDriverError> {
        let input = session
            .find_first_of(
                &[
                    Locator::css("input[type=\"file\"]"),
                    Locator::css("input[accept*=\"image\"]"),
                ],
                self.config.step_timeout(),
            )
            .await?;

        match input {
            Some(input) => {
                session
                    .send_keys(&input, &image.to_string_lossy())
                    .await?;
                log::info!("Uploaded {}", image.display());
            }
            None => log::warn!("No file input found; upload the image manually"),
        }
        Ok(())
    }

    async fn fill_prompts(
        &self,
        session: &Session,
        request: &GenerationRequest,
    ) -> Result<(), WebDriverError> {
        let step = self.config.step_timeout();

        let prompt = session
            .find_first_of(
                &[
                    Locator::css("textarea[placeholder*=\"describe\" i]"),
                    Locator::css("textarea[placeholder*=\"creative\" i]"),
                    Locator::css("textarea"),
                ],
                step,
            )
            .await?
            .ok_or_else(|| WebDriverError::StepFailed("prompt field not found".to_string()))?;
        session.clear(&prompt).await?;
        session.send_keys(&prompt, request.prompt()).await?;

        if !request.negative_prompt().trim().is_empty() {
            match session
                .find_first_of(&[Locator::css("textarea[placeholder*=\"negative\" i]")], step)
                .await?
            {
                Some(field) => {
                    session.clear(&field).await?;
                    session.send_keys(&field, request.negative_prompt()).await?;
                }
                None => log::warn!("Negative prompt field not found, skipping"),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VideoDriver for KlingWebDriver {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::BrowserAutomation
    }

    async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        match self.run(request).await {
            Ok(message) => GenerationResult::awaiting_manual_completion(message)
                .with_note("final submission is left to the user"),
            Err(e) => GenerationResult::failure(format!("KlingAI web: {}", e)),
        }
    }
}
