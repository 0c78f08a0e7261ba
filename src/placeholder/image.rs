use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::{DynamicImage, Rgba};

use super::canvas;
use super::PlaceholderError;
use crate::generator::{Artifact, AspectRatio, GenerationResult, ImageGenerator};
use crate::storage::stamped_name;

/// Offline image backend producing a labelled gradient PNG.
pub struct PlaceholderImageGenerator {
    images_dir: PathBuf,
}

impl PlaceholderImageGenerator {
    pub fn new(images_dir: PathBuf) -> Self {
        Self { images_dir }
    }

    async fn run(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<Artifact, PlaceholderError> {
        tokio::fs::create_dir_all(&self.images_dir).await?;
        let path = self.images_dir.join(stamped_name("placeholder", "png"));

        let prompt = prompt.to_string();
        let target = path.clone();
        tokio::task::spawn_blocking(move || render_image(&prompt, aspect_ratio, &target))
            .await
            .map_err(|e| PlaceholderError::Worker(e.to_string()))??;

        log::info!("Placeholder image written to {}", path.display());
        Ok(Artifact::inspect(&path)?)
    }
}

fn render_image(prompt: &str, aspect_ratio: AspectRatio, target: &Path) -> Result<(), PlaceholderError> {
    let (width, height) = aspect_ratio.dimensions();
    let mut image = DynamicImage::ImageRgb8(canvas::vertical_gradient(width, height)).to_rgba8();

    // Accent band across the upper third and a ring in the centre stand in for
    // the prompt, so different prompts give visibly different images.
    let accent = canvas::accent_color(prompt);
    canvas::fill_rect(&mut image, width / 10, height / 4, width * 8 / 10, 8, accent);
    canvas::ring(
        &mut image,
        (width / 2) as i64,
        (height / 2) as i64,
        width.min(height) / 8,
        4,
        Rgba([255, 255, 255, 255]),
    );

    image.save_with_format(target, image::ImageFormat::Png)?;
    Ok(())
}

#[async_trait]
impl ImageGenerator for PlaceholderImageGenerator {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    async fn generate_image(&self, prompt: &str, aspect_ratio: AspectRatio) -> GenerationResult {
        if prompt.trim().is_empty() {
            return GenerationResult::failure("prompt is required");
        }
        match self.run(prompt, aspect_ratio).await {
            Ok(artifact) => GenerationResult::artifact(artifact),
            Err(e) => GenerationResult::failure(format!("placeholder: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_png_matches_aspect_ratio() {
        let dir = tempfile::tempdir().unwrap();
        let generator = PlaceholderImageGenerator::new(dir.path().to_path_buf());
        let result = generator
            .generate_image("lighthouse at dusk", AspectRatio::Landscape)
            .await;
        let artifact = result.artifact_ref().unwrap();
        assert!(artifact.file_name.starts_with("placeholder_"));
        assert!(artifact.file_name.ends_with(".png"));

        let decoded = image::open(&artifact.path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1280, 720));
    }

    #[tokio::test]
    async fn test_blank_prompt_fails() {
        let dir = tempfile::tempdir().unwrap();
        let generator = PlaceholderImageGenerator::new(dir.path().to_path_buf());
        let result = generator.generate_image("  ", AspectRatio::Square).await;
        assert_eq!(result.error_message(), Some("prompt is required"));
    }
}
