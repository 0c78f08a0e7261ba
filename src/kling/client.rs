//! KlingClient - talks to the KlingAI image-to-video REST API.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use super::retry::{is_gateway_status, is_transient_network_error, parse_retry_after, RetryPolicy};
use super::token::fresh_token;
use crate::config::KlingApiConfig;
use crate::generator::GenerationRequest;

/// Connection timeout for every request.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const HTTP_STATUS_TOO_MANY_REQUESTS: u16 = 429;

const IMAGE2VIDEO_PATH: &str = "/v1/videos/image2video";

/// Body of an image-to-video submission.
#[derive(Debug, Clone, Serialize)]
pub struct Image2VideoRequest {
    pub model_name: String,
    /// Base64-encoded input image.
    pub image: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    pub cfg_scale: f32,
    pub mode: String,
    /// Seconds, as a string ("5" or "10").
    pub duration: String,
}

impl Image2VideoRequest {
    pub fn new(model_name: &str, image_base64: String, request: &GenerationRequest) -> Self {
        let negative = request.negative_prompt().trim();
        Self {
            model_name: model_name.to_string(),
            image: image_base64,
            prompt: request.prompt().to_string(),
            negative_prompt: (!negative.is_empty()).then(|| negative.to_string()),
            cfg_scale: request.cfg_scale(),
            mode: request.mode().as_str().to_string(),
            duration: request.duration().seconds().to_string(),
        }
    }
}

/// Standard KlingAI response envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T, KlingError> {
        if self.code != 0 {
            return Err(KlingError::Envelope {
                code: self.code,
                message: self.message,
            });
        }
        self.data
            .ok_or_else(|| KlingError::ApiError("response has no data".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct SubmitData {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct TaskData {
    task_status: String,
    #[serde(default)]
    task_status_msg: Option<String>,
    #[serde(default)]
    task_result: Option<TaskResult>,
}

#[derive(Debug, Default, Deserialize)]
struct TaskResult {
    #[serde(default)]
    videos: Vec<VideoOutput>,
}

#[derive(Debug, Deserialize)]
struct VideoOutput {
    url: String,
}

/// Status of a submitted task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    Submitted,
    Processing,
    Succeeded { video_url: String },
    Failed { error: String },
    /// Anything the API reports that we do not know; polling continues.
    Unknown(String),
}

/// Client for the KlingAI API.
pub struct KlingClient {
    access_key: String,
    secret_key: String,
    settings: KlingApiConfig,
    retry: RetryPolicy,
    http_client: reqwest::Client,
}

impl KlingClient {
    /// Create a client with explicit credentials.
    ///
    /// # Errors
    ///
    /// Returns `KlingError::MissingCredentials` if either key is empty.
    pub fn new(
        access_key: String,
        secret_key: String,
        settings: KlingApiConfig,
    ) -> Result<Self, KlingError> {
        if access_key.trim().is_empty() || secret_key.trim().is_empty() {
            return Err(KlingError::MissingCredentials);
        }

        let http_client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            access_key,
            secret_key,
            settings,
            retry: RetryPolicy::default(),
            http_client,
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        self.settings.base_url.trim_end_matches('/')
    }

    pub fn settings(&self) -> &KlingApiConfig {
        &self.settings
    }

    fn bearer(&self) -> Result<String, KlingError> {
        let token = fresh_token(&self.access_key, &self.secret_key)?;
        Ok(format!("Bearer {}", token))
    }

    /// Submit an image-to-video task and return its task id.
    ///
    /// # Errors
    ///
    /// `KlingError::RateLimit` on HTTP 429, `KlingError::Unavailable` on a
    /// gateway error, `KlingError::Envelope` when the API answers with a
    /// non-zero code, `KlingError::HttpError` when the request fails.
    pub async fn submit(&self, body: &Image2VideoRequest) -> Result<String, KlingError> {
        let url = format!("{}{}", self.base_url(), IMAGE2VIDEO_PATH);

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", self.bearer()?)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == HTTP_STATUS_TOO_MANY_REQUESTS {
                let retry_after_secs = parse_retry_after(response.headers());
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Rate limit exceeded".to_string());
                log::warn!(
                    "Rate limited by KlingAI API. Retry-After: {:?} seconds",
                    retry_after_secs
                );
                return Err(KlingError::RateLimit {
                    message,
                    retry_after_secs,
                });
            }

            if is_gateway_status(status.as_u16()) {
                return Err(KlingError::Unavailable {
                    status: status.as_u16(),
                });
            }

            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(KlingError::ApiError(format!(
                "submission failed with status {}: {}",
                status, error_text
            )));
        }

        let envelope: Envelope<SubmitData> = response.json().await?;
        Ok(envelope.into_data()?.task_id)
    }

    /// Submit with retries on rate limiting and transient network failures.
    ///
    /// Any other error is returned immediately.
    pub async fn submit_with_retry(&self, body: &Image2VideoRequest) -> Result<String, KlingError> {
        let policy = self.retry;
        let mut network_attempt = 0u32;
        let mut rate_limit_attempt = 0u32;

        loop {
            let error = match self.submit(body).await {
                Ok(task_id) => return Ok(task_id),
                Err(e) => e,
            };

            let transient = match &error {
                KlingError::HttpError(http_err) => is_transient_network_error(http_err),
                KlingError::Unavailable { .. } => true,
                _ => false,
            };

            if transient {
                network_attempt += 1;
                if network_attempt > policy.network_retries {
                    log::error!(
                        "Network error after {} attempts. Giving up. Error: {}",
                        network_attempt,
                        error
                    );
                    return Err(KlingError::NetworkError {
                        message: error.to_string(),
                        attempts: network_attempt,
                    });
                }
                let delay = policy.backoff(network_attempt - 1);
                log::warn!(
                    "Network error (attempt {}/{}): {}. Retrying in {:?}...",
                    network_attempt,
                    policy.network_retries + 1,
                    error,
                    delay
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if let KlingError::RateLimit {
                retry_after_secs, ..
            } = &error
            {
                rate_limit_attempt += 1;
                if rate_limit_attempt > policy.rate_limit_retries {
                    log::error!(
                        "Rate limit exceeded after {} attempts. Giving up.",
                        rate_limit_attempt
                    );
                    return Err(error);
                }
                let delay = policy.rate_limit_delay(rate_limit_attempt - 1, *retry_after_secs);
                log::info!(
                    "Rate limited (attempt {}/{}). Retrying in {:?}...",
                    rate_limit_attempt,
                    policy.rate_limit_retries + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            return Err(error);
        }
    }

    /// Query the status of a task once.
    pub async fn poll_status(&self, task_id: &str) -> Result<TaskStatus, KlingError> {
        let url = format!("{}{}/{}", self.base_url(), IMAGE2VIDEO_PATH, task_id);

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", self.bearer()?)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(KlingError::ApiError(format!(
                "status check failed with status {}: {}",
                status, error_text
            )));
        }

        let envelope: Envelope<TaskData> = response.json().await?;
        let task = envelope.into_data()?;

        Ok(match task.task_status.to_lowercase().as_str() {
            "submitted" => TaskStatus::Submitted,
            "processing" => TaskStatus::Processing,
            "succeed" => match task
                .task_result
                .unwrap_or_default()
                .videos
                .into_iter()
                .next()
            {
                Some(video) => TaskStatus::Succeeded {
                    video_url: video.url,
                },
                None => TaskStatus::Failed {
                    error: "task succeeded but returned no video".to_string(),
                },
            },
            "failed" => TaskStatus::Failed {
                error: task
                    .task_status_msg
                    .unwrap_or_else(|| "unknown error".to_string()),
            },
            other => TaskStatus::Unknown(other.to_string()),
        })
    }

    /// Poll a task until it finishes, fails or `max_wait` elapses.
    ///
    /// Errors while polling are logged and polling goes on; only a reported
    /// task failure or the deadline end the wait early.
    pub async fn wait_for_video(&self, task_id: &str) -> Result<String, KlingError> {
        use tokio::time::Instant;

        let max_wait = self.settings.max_wait();
        let interval = self.settings.poll_interval();
        let start_time = Instant::now();

        loop {
            if start_time.elapsed() > max_wait {
                log::error!("Task {} timed out after {:?}", task_id, max_wait);
                return Err(KlingError::Timeout {
                    waited_secs: max_wait.as_secs(),
                });
            }

            match self.poll_status(task_id).await {
                Ok(TaskStatus::Submitted) => log::debug!("Task {}: submitted", task_id),
                Ok(TaskStatus::Processing) => log::info!("Task {}: processing...", task_id),
                Ok(TaskStatus::Succeeded { video_url }) => {
                    log::info!("Task {} complete", task_id);
                    return Ok(video_url);
                }
                Ok(TaskStatus::Failed { error }) => {
                    log::error!("Task {} failed: {}", task_id, error);
                    return Err(KlingError::TaskFailed(error));
                }
                Ok(TaskStatus::Unknown(status)) => {
                    log::warn!("Task {}: unknown status '{}'", task_id, status)
                }
                Err(e) => log::warn!("Status check for task {} failed: {}", task_id, e),
            }

            tokio::time::sleep(interval).await;
        }
    }

    /// Stream a finished video to `dest`.
    pub async fn download_video(&self, url: &str, dest: &Path) -> Result<PathBuf, KlingError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let response = self.http_client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(KlingError::ApiError(format!(
                "video download failed with status {}",
                status
            )));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();

        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;

        Ok(dest.to_path_buf())
    }
}

/// Errors from the KlingAI API driver.
#[derive(Debug, thiserror::Error)]
pub enum KlingError {
    #[error("KlingAI access key and secret key are required")]
    MissingCredentials,

    #[error("failed to sign API token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("API error {code}: {message}")]
    Envelope { code: i64, message: String },

    #[error("service unavailable (HTTP {status})")]
    Unavailable { status: u16 },

    #[error("Rate limited: {message}")]
    RateLimit {
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Network error: {message} (after {attempts} attempts)")]
    NetworkError { message: String, attempts: u32 },

    #[error("video generation timed out after {waited_secs}s")]
    Timeout { waited_secs: u64 },

    #[error("video generation failed: {0}")]
    TaskFailed(String),

    #[error("input image is {size} bytes, limit is {limit}")]
    ImageTooLarge { size: u64, limit: u64 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
