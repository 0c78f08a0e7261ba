use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;

use super::client::{Image2VideoRequest, KlingClient, KlingError};
use crate::config::KlingApiConfig;
use crate::generator::{Artifact, GenerationRequest, GenerationResult, GeneratorKind, VideoDriver};
use crate::storage::{discard_partial, stamped_name};

/// Video driver backed by the KlingAI REST API.
pub struct KlingApiDriver {
    client: KlingClient,
    videos_dir: PathBuf,
}

impl KlingApiDriver {
    pub fn new(
        access_key: String,
        secret_key: String,
        settings: KlingApiConfig,
        videos_dir: PathBuf,
    ) -> Result<Self, KlingError> {
        let client = KlingClient::new(access_key, secret_key, settings)?;
        Ok(Self::with_client(client, videos_dir))
    }

    pub fn with_client(client: KlingClient, videos_dir: PathBuf) -> Self {
        Self { client, videos_dir }
    }

    async fn run(&self, request: &GenerationRequest) -> Result<Artifact, KlingError> {
        let limit = self.client.settings().max_image_bytes;
        let size = tokio::fs::metadata(request.image_path()).await?.len();
        if size > limit {
            return Err(KlingError::ImageTooLarge { size, limit });
        }

        let bytes = tokio::fs::read(request.image_path()).await?;
        let image = base64::engine::general_purpose::STANDARD.encode(bytes);
        if request.output_count() > 1 {
            log::debug!(
                "KlingAI image2video produces one video per task, ignoring output_count={}",
                request.output_count()
            );
        }
        let body = Image2VideoRequest::new(&self.client.settings().model_name, image, request);

        let task_id = self.client.submit_with_retry(&body).await?;
        log::info!("KlingAI task submitted: {}", task_id);

        let video_url = self.client.wait_for_video(&task_id).await?;
        let dest = self.videos_dir.join(stamped_name("klingai", "mp4"));
        log::info!("Downloading video to {}", dest.display());
        match self.fetch(&video_url, &dest).await {
            Ok(artifact) => Ok(artifact),
            Err(e) => {
                discard_partial(&dest).await;
                Err(e)
            }
        }
    }

    async fn fetch(&self, video_url: &str, dest: &Path) -> Result<Artifact, KlingError> {
        let path = self.client.download_video(video_url, dest).await?;
        Ok(Artifact::inspect(path)?)
    }
}

#[async_trait]
impl VideoDriver for KlingApiDriver {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::RemoteApi
    }

    async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        match self.run(request).await {
            Ok(artifact) => GenerationResult::artifact(artifact),
            Err(e) => GenerationResult::failure(format!("KlingAI API: {}", e)),
        }
    }
}
