use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, Rgba, RgbaImage};

use super::canvas::{self, DIM_ALPHA, FALLBACK_CANVAS};
use super::PlaceholderError;
use crate::generator::{Artifact, GenerationRequest, GenerationResult, GeneratorKind, VideoDriver};
use crate::storage::{discard_partial, stamped_name};

/// Frames per second of the placeholder animation.
pub const FPS: u32 = 10;

/// Upper bound on frames per animation.
pub const MAX_FRAMES: u32 = 50;

/// Longest edge of the input image after thumbnailing.
pub const MAX_EDGE: u32 = 800;

/// GIF encoder speed, 1 (best) to 30 (fastest).
const ENCODER_SPEED: i32 = 20;

const PROGRESS_GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);

pub fn frame_count(duration_secs: u32) -> u32 {
    (FPS * duration_secs).min(MAX_FRAMES)
}

/// Offline driver that renders a short animated GIF from the request.
pub struct PlaceholderVideoDriver {
    videos_dir: PathBuf,
}

impl PlaceholderVideoDriver {
    pub fn new(videos_dir: PathBuf) -> Self {
        Self { videos_dir }
    }

    async fn run(&self, request: &GenerationRequest) -> Result<Artifact, PlaceholderError> {
        tokio::fs::create_dir_all(&self.videos_dir).await?;
        let gif_path = self.videos_dir.join(stamped_name("test_video", "gif"));
        let info_path = info_path_for(&gif_path);
        produce(request, &gif_path, &info_path).await
    }
}

/// Write the animation and its sidecar, removing both if either step fails.
async fn produce(
    request: &GenerationRequest,
    gif_path: &Path,
    info_path: &Path,
) -> Result<Artifact, PlaceholderError> {
    match write_files(request, gif_path, info_path).await {
        Ok(artifact) => {
            log::info!("Placeholder video written to {}", gif_path.display());
            Ok(artifact)
        }
        Err(e) => {
            discard_partial(gif_path).await;
            discard_partial(info_path).await;
            Err(e)
        }
    }
}

async fn write_files(
    request: &GenerationRequest,
    gif_path: &Path,
    info_path: &Path,
) -> Result<Artifact, PlaceholderError> {
    let request_owned = request.clone();
    let target = gif_path.to_path_buf();
    tokio::task::spawn_blocking(move || render_animation(&request_owned, &target))
        .await
        .map_err(|e| PlaceholderError::Worker(e.to_string()))??;

    tokio::fs::write(info_path, describe(request)).await?;
    Ok(Artifact::inspect(gif_path)?)
}

/// `<stem>_info.txt` next to the animation.
fn info_path_for(gif_path: &Path) -> PathBuf {
    let stem = gif_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    gif_path.with_file_name(format!("{}_info.txt", stem))
}

/// Load the input image, thumbnailed, or a flat canvas when it is missing or
/// unreadable.
fn base_frame(image_path: &Path) -> Result<RgbaImage, PlaceholderError> {
    if !image_path.is_file() {
        log::debug!(
            "Input image {} not found, using a flat canvas",
            image_path.display()
        );
        return Ok(canvas::flat_canvas(FALLBACK_CANVAS.0, FALLBACK_CANVAS.1));
    }
    let mut image = match image::open(image_path) {
        Ok(image) => image,
        Err(e) => {
            log::warn!(
                "Could not decode {} ({}), using a flat canvas",
                image_path.display(),
                e
            );
            return Ok(canvas::flat_canvas(FALLBACK_CANVAS.0, FALLBACK_CANVAS.1));
        }
    };
    if image.width() > MAX_EDGE || image.height() > MAX_EDGE {
        image = image.thumbnail(MAX_EDGE, MAX_EDGE);
    }
    Ok(image.to_rgba8())
}

/// Render every frame of the animation.
pub fn render_frames(base: &RgbaImage, total: u32, accent: Rgba<u8>) -> Vec<RgbaImage> {
    let (width, height) = base.dimensions();
    let mut dimmed = base.clone();
    canvas::dim(&mut dimmed, DIM_ALPHA);

    (0..total)
        .map(|i| {
            let mut frame = dimmed.clone();
            let progress = i as f32 / total as f32;
            canvas::progress_bar(&mut frame, progress, PROGRESS_GREEN);

            let pulse = (10.0 * (progress - 0.5).abs()) as u32;
            canvas::ring(
                &mut frame,
                (width / 2) as i64,
                (height / 2) as i64,
                20 + pulse,
                2,
                accent,
            );
            frame
        })
        .collect()
}

fn render_animation(request: &GenerationRequest, target: &Path) -> Result<(), PlaceholderError> {
    let base = base_frame(request.image_path())?;
    let total = frame_count(request.duration().seconds());
    let frames = render_frames(&base, total, canvas::accent_color(request.prompt()));

    let file = BufWriter::new(File::create(target)?);
    let mut encoder = GifEncoder::new_with_speed(file, ENCODER_SPEED);
    encoder.set_repeat(Repeat::Infinite)?;
    encoder.encode_frames(frames.into_iter().map(|buffer| {
        Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(1000 / FPS, 1))
    }))?;
    Ok(())
}

fn describe(request: &GenerationRequest) -> String {
    let image_name = request
        .image_path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!(
        "Test Video Information\n\
         ======================\n\
         Type: Placeholder (GIF Animation)\n\
         Original Image: {}\n\
         Prompt: {}\n\
         Prompt Fingerprint: {}\n\
         Negative Prompt: {}\n\
         Duration: {} seconds\n\
         Mode: {}\n\
         CFG Scale: {}\n\
         Generated: {}\n\
         \n\
         Note: This is a test placeholder, not a real video.\n",
        image_name,
        request.prompt(),
        canvas::prompt_fingerprint(request.prompt()),
        request.negative_prompt(),
        request.duration().seconds(),
        request.mode(),
        request.cfg_scale(),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
    )
}

#[async_trait]
impl VideoDriver for PlaceholderVideoDriver {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Placeholder
    }

    async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        match self.run(request).await {
            Ok(artifact) => GenerationResult::artifact(artifact)
                .with_note("test GIF animation, not a real video"),
            Err(e) => GenerationResult::failure(format!("placeholder: {}", e)),
        }
    }
}
