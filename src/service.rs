//! MediaService - the single entry point used by the HTTP layer and the CLI.
//!
//! Owns the video orchestrator, the one image backend chosen at startup and
//! the video editor. Adds no recovery of its own: driver failures come back
//! from the orchestrator already summarised.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::editor::{self, EditOptions, VideoEditor};
use crate::generator::{
    AspectRatio, DispatchOptions, GenerationRequest, GenerationResult, GeneratorKind,
    GeneratorRegistry, ImageGenerator, Orchestrator, QualityMode, StatusReport, ValidationError,
};
use crate::placeholder::PlaceholderImageGenerator;
use crate::storage::{ContentStore, StorageError};
use crate::web::{ImageFxGenerator, WebDriverError};

/// Optional video settings shared by direct calls and workflows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoSettings {
    #[serde(default)]
    pub negative_prompt: String,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub cfg_scale: Option<f32>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub output_count: Option<u32>,
    /// `api`, `web`, `placeholder` or a wire name.
    #[serde(default, rename = "generatorType", alias = "generator_type")]
    pub generator: Option<String>,
    #[serde(default)]
    pub fallback: Option<bool>,
}

impl VideoSettings {
    fn dispatch_options(&self) -> Result<DispatchOptions, ValidationError> {
        let requested = match self.generator.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(name) => Some(
                name.parse::<GeneratorKind>()
                    .map_err(|e| ValidationError::Invalid(e.to_string()))?,
            ),
        };
        Ok(DispatchOptions {
            requested,
            fallback: self.fallback.unwrap_or(true),
        })
    }

    fn build_request(
        &self,
        image_path: PathBuf,
        prompt: &str,
        require_image: bool,
    ) -> Result<GenerationRequest, ValidationError> {
        let mut builder = GenerationRequest::builder(image_path, prompt)
            .negative_prompt(self.negative_prompt.clone());
        if let Some(duration) = self.duration {
            builder = builder.duration(duration);
        }
        if let Some(cfg_scale) = self.cfg_scale {
            builder = builder.cfg_scale(cfg_scale);
        }
        if let Some(mode) = self.mode.as_deref() {
            builder = builder.mode(mode.parse::<QualityMode>()?);
        }
        if let Some(count) = self.output_count {
            builder = builder.output_count(count);
        }
        if !require_image {
            builder = builder.allow_missing_image();
        }
        builder.build()
    }
}

/// Input of [`MediaService::generate_video`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoParams {
    pub image_path: PathBuf,
    pub prompt: String,
    #[serde(flatten)]
    pub settings: VideoSettings,
}

impl VideoParams {
    pub fn new(image_path: impl Into<PathBuf>, prompt: impl Into<String>) -> Self {
        Self {
            image_path: image_path.into(),
            prompt: prompt.into(),
            settings: VideoSettings::default(),
        }
    }
}

/// Input of [`MediaService::complete_workflow`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowParams {
    pub image_prompt: String,
    pub video_prompt: String,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub video_options: VideoSettings,
    #[serde(default)]
    pub edit_options: Option<EditOptions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStage {
    Image,
    Video,
    Edit,
}

/// Result of a full image → video → edit run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WorkflowOutcome {
    Completed {
        image: GenerationResult,
        video: GenerationResult,
        #[serde(skip_serializing_if = "Option::is_none")]
        edited_video: Option<GenerationResult>,
    },
    /// A stage did not succeed; its result is returned unchanged.
    Aborted {
        stage: WorkflowStage,
        result: GenerationResult,
    },
}

impl WorkflowOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, WorkflowOutcome::Completed { .. })
    }
}

/// Errors while assembling the service at startup.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("content directory: {0}")]
    Storage(#[from] StorageError),

    #[error("image backend: {0}")]
    ImageBackend(#[from] WebDriverError),
}

pub struct MediaService {
    orchestrator: Orchestrator,
    image_generator: Box<dyn ImageGenerator>,
    editor: VideoEditor,
    store: ContentStore,
}

impl MediaService {
    pub fn new(
        orchestrator: Orchestrator,
        image_generator: Box<dyn ImageGenerator>,
        editor: VideoEditor,
        store: ContentStore,
    ) -> Self {
        Self {
            orchestrator,
            image_generator,
            editor,
            store,
        }
    }

    /// Build every component from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let store = ContentStore::new(&config.storage.content_dir);
        store.ensure_layout()?;

        let registry = GeneratorRegistry::from_config(config, &store);

        let image_generator: Box<dyn ImageGenerator> = if config.generators.use_placeholder {
            Box::new(PlaceholderImageGenerator::new(store.images_dir()))
        } else {
            Box::new(ImageFxGenerator::new(
                &config.web.webdriver_url,
                config.imagefx.clone(),
                store.images_dir(),
                config.web.step_timeout(),
            )?)
        };
        log::info!("Image generator: {}", image_generator.name());

        let editor = VideoEditor::new(&config.ffmpeg.path, store.edited_dir());

        Ok(Self::new(
            Orchestrator::new(registry),
            image_generator,
            editor,
            store,
        ))
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn image_backend(&self) -> &'static str {
        self.image_generator.name()
    }

    pub fn generators(&self) -> StatusReport {
        self.orchestrator.status_report()
    }

    /// Client paths may be absolute or relative to the content directory.
    fn resolve_input(&self, path: &Path) -> PathBuf {
        if path.is_relative() && !path.exists() {
            let under_root = self.store.root().join(path);
            if under_root.exists() {
                return under_root;
            }
        }
        path.to_path_buf()
    }

    pub async fn generate_image(&self, prompt: &str, aspect_ratio: AspectRatio) -> GenerationResult {
        log::info!("Generating image ({}) with {}", aspect_ratio, self.image_backend());
        self.image_generator.generate_image(prompt, aspect_ratio).await
    }

    /// Validate and dispatch a video request.
    ///
    /// Invalid input is rejected before any driver runs.
    pub async fn generate_video(&self, params: VideoParams) -> Result<GenerationResult, ValidationError> {
        let options = params.settings.dispatch_options()?;
        let image = self.resolve_input(&params.image_path);
        let request = params.settings.build_request(image, &params.prompt, true)?;
        Ok(self.orchestrator.generate(&request, options).await)
    }

    /// Apply one edit. Parameter problems are validation errors; anything that
    /// goes wrong while FFmpeg runs is a failure result.
    pub async fn edit_video(
        &self,
        video_path: &Path,
        options: &EditOptions,
    ) -> Result<GenerationResult, ValidationError> {
        if video_path.as_os_str().is_empty() {
            return Err(ValidationError::MissingField("video_path"));
        }
        editor::validate(options).map_err(|e| ValidationError::Invalid(e.to_string()))?;

        let video = self.resolve_input(video_path);
        Ok(match self.editor.apply(&video, options).await {
            Ok(artifact) => GenerationResult::artifact(artifact),
            Err(e) => GenerationResult::failure(format!("{} failed: {}", options.action(), e)),
        })
    }

    /// Image, then video from that image, then the optional edit.
    ///
    /// Stops at the first stage that does not succeed.
    pub async fn complete_workflow(
        &self,
        params: WorkflowParams,
    ) -> Result<WorkflowOutcome, ValidationError> {
        if params.image_prompt.trim().is_empty() {
            return Err(ValidationError::MissingField("image_prompt"));
        }
        let dispatch = params.video_options.dispatch_options()?;
        // Check the video settings before spending time on the image.
        params
            .video_options
            .build_request(PathBuf::from("pending.png"), &params.video_prompt, false)?;
        if let Some(edit) = &params.edit_options {
            editor::validate(edit).map_err(|e| ValidationError::Invalid(e.to_string()))?;
        }
        let aspect_ratio = params
            .aspect_ratio
            .as_deref()
            .map(AspectRatio::parse_lenient)
            .unwrap_or_default();

        log::info!("Workflow: generating image");
        let image = self.generate_image(&params.image_prompt, aspect_ratio).await;
        let Some(image_path) = image.artifact_ref().map(|a| a.path.clone()) else {
            return Ok(WorkflowOutcome::Aborted {
                stage: WorkflowStage::Image,
                result: image,
            });
        };

        log::info!("Workflow: generating video");
        let request = params
            .video_options
            .build_request(image_path, &params.video_prompt, true)?;
        let video = self.orchestrator.generate(&request, dispatch).await;
        if !video.is_success() {
            return Ok(WorkflowOutcome::Aborted {
                stage: WorkflowStage::Video,
                result: video,
            });
        }

        let Some(edit) = params.edit_options else {
            return Ok(WorkflowOutcome::Completed {
                image,
                video,
                edited_video: None,
            });
        };

        let Some(video_path) = video.artifact_ref().map(|a| a.path.clone()) else {
            return Ok(WorkflowOutcome::Aborted {
                stage: WorkflowStage::Edit,
                result: GenerationResult::failure(
                    "video is awaiting manual completion; there is no file to edit",
                ),
            });
        };

        log::info!("Workflow: editing video");
        let edited = match self.editor.apply(&video_path, &edit).await {
            Ok(artifact) => GenerationResult::artifact(artifact),
            Err(e) => GenerationResult::failure(format!("{} failed: {}", edit.action(), e)),
        };
        if !edited.is_success() {
            return Ok(WorkflowOutcome::Aborted {
                stage: WorkflowStage::Edit,
                result: edited,
            });
        }

        Ok(WorkflowOutcome::Completed {
            image,
            video,
            edited_video: Some(edited),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_video_params_from_json() {
        let params: VideoParams = serde_json::from_value(json!({
            "image_path": "images/a.png",
            "prompt": "waves",
            "duration": 10,
            "mode": "pro",
            "generatorType": "web",
            "fallback": false
        }))
        .unwrap();
        assert_eq!(params.settings.duration, Some(10));
        let options = params.settings.dispatch_options().unwrap();
        assert_eq!(options.requested, Some(GeneratorKind::BrowserAutomation));
        assert!(!options.fallback);
    }

    #[test]
    fn test_unknown_generator_is_validation_error() {
        let settings = VideoSettings {
            generator: Some("sora".to_string()),
            ..VideoSettings::default()
        };
        assert!(matches!(
            settings.dispatch_options(),
            Err(ValidationError::Invalid(_))
        ));
    }

    #[test]
    fn test_build_request_applies_settings() {
        let settings = VideoSettings {
            negative_prompt: "blur".to_string(),
            duration: Some(10),
            cfg_scale: Some(0.8),
            mode: Some("pro".to_string()),
            output_count: Some(2),
            ..VideoSettings::default()
        };
        let request = settings
            .build_request(PathBuf::from("x.png"), "sky", false)
            .unwrap();
        assert_eq!(request.duration().seconds(), 10);
        assert_eq!(request.mode(), QualityMode::Professional);
        assert_eq!(request.negative_prompt(), "blur");
        assert_eq!(request.output_count(), 2);
    }

    #[test]
    fn test_workflow_outcome_serialization() {
        let outcome = WorkflowOutcome::Aborted {
            stage: WorkflowStage::Video,
            result: GenerationResult::failure("down"),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["outcome"], "aborted");
        assert_eq!(value["stage"], "video");
        assert_eq!(value["result"]["error"], "down");
    }
}
