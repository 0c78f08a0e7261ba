//! FFmpeg-backed video editing.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use super::options::{
    EditOptions, MergeParams, SubtitleCue, SubtitleParams, TrimParams, WatermarkParams,
};
use crate::generator::Artifact;
use crate::storage::stamped_name;

/// How many trailing stderr lines are kept in a failure.
const STDERR_TAIL_LINES: usize = 20;

/// Errors that can occur while editing.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("FFmpeg not found; install it or set FFMPEG_PATH")]
    FfmpegNotFound,

    #[error("failed to spawn FFmpeg: {0}")]
    SpawnFailed(std::io::Error),

    #[error("FFmpeg exited with code {exit_code:?}: {stderr}")]
    ProcessFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("invalid edit parameters: {0}")]
    InvalidParams(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// `HH:MM:SS,mmm` as used by SRT files.
pub fn seconds_to_srt_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

pub fn render_srt(cues: &[SubtitleCue]) -> String {
    cues.iter()
        .enumerate()
        .map(|(i, cue)| {
            format!(
                "{}\n{} --> {}\n{}\n\n",
                i + 1,
                seconds_to_srt_time(cue.start),
                seconds_to_srt_time(cue.end),
                cue.text
            )
        })
        .collect()
}

/// RGB hex for a colour name; unknown names are white.
pub fn color_to_hex(color: &str) -> &'static str {
    match color.trim().to_lowercase().as_str() {
        "black" => "000000",
        "red" => "FF0000",
        "green" => "00FF00",
        "blue" => "0000FF",
        "yellow" => "FFFF00",
        _ => "FFFFFF",
    }
}

/// ASS colour literal (`&HBBGGRR&`) for a colour name.
pub fn ass_colour(color: &str) -> String {
    let rgb = color_to_hex(color);
    format!("&H{}{}{}&", &rgb[4..6], &rgb[2..4], &rgb[0..2])
}

/// Escape a path for use inside an FFmpeg filter argument.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

fn arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub fn subtitle_filter(srt_path: &Path, params: &SubtitleParams) -> String {
    format!(
        "subtitles={}:force_style='FontSize={},PrimaryColour={},Alignment={}'",
        escape_filter_path(srt_path),
        params.font_size,
        ass_colour(&params.font_color),
        params.position.alignment()
    )
}

pub fn subtitle_args(input: &Path, srt_path: &Path, params: &SubtitleParams, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        arg(input),
        "-vf".to_string(),
        subtitle_filter(srt_path, params),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        arg(output),
    ]
}

/// Seek before the input and copy streams, so no re-encode happens.
pub fn trim_args(input: &Path, params: &TrimParams, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-ss".to_string(),
        format!("{}", params.start_time),
        "-t".to_string(),
        format!("{}", params.duration()),
        "-i".to_string(),
        arg(input),
        "-c".to_string(),
        "copy".to_string(),
        arg(output),
    ]
}

pub fn merge_args(inputs: &[PathBuf], output: &Path) -> Vec<String> {
    let mut args = vec!["-y".to_string()];
    for input in inputs {
        args.push("-i".to_string());
        args.push(arg(input));
    }
    let streams: String = (0..inputs.len())
        .map(|i| format!("[{i}:v][{i}:a]"))
        .collect();
    args.extend([
        "-filter_complex".to_string(),
        format!("{}concat=n={}:v=1:a=1[outv][outa]", streams, inputs.len()),
        "-map".to_string(),
        "[outv]".to_string(),
        "-map".to_string(),
        "[outa]".to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        arg(output),
    ]);
    args
}

pub fn watermark_filter(params: &WatermarkParams) -> String {
    format!(
        "[1:v]format=rgba,colorchannelmixer=aa={}[wm];[0:v][wm]overlay={}",
        params.opacity,
        params.position.overlay_coordinates()
    )
}

pub fn watermark_args(input: &Path, params: &WatermarkParams, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        arg(input),
        "-i".to_string(),
        arg(&params.watermark_path),
        "-filter_complex".to_string(),
        watermark_filter(params),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        arg(output),
    ]
}

/// Check parameters before any process is spawned.
pub fn validate(options: &EditOptions) -> Result<(), EditError> {
    match options {
        EditOptions::AddSubtitles(params) => {
            if params.subtitles.is_empty() {
                return Err(EditError::InvalidParams("at least one subtitle is required".into()));
            }
            if let Some(cue) = params.subtitles.iter().find(|c| c.end <= c.start || c.start < 0.0) {
                return Err(EditError::InvalidParams(format!(
                    "subtitle '{}' must end after it starts",
                    cue.text
                )));
            }
        }
        EditOptions::Trim(params) => {
            if params.start_time < 0.0 || params.end_time <= params.start_time {
                return Err(EditError::InvalidParams(
                    "end_time must be greater than start_time".into(),
                ));
            }
        }
        EditOptions::Merge(params) => {
            if params.additional_videos.is_empty() {
                return Err(EditError::InvalidParams(
                    "additional_videos must name at least one video".into(),
                ));
            }
        }
        EditOptions::AddWatermark(params) => {
            if !(0.0..=1.0).contains(&params.opacity) {
                return Err(EditError::InvalidParams(
                    "opacity must be between 0.0 and 1.0".into(),
                ));
            }
        }
    }
    Ok(())
}

/// Runs edit actions through an FFmpeg binary.
#[derive(Debug, Clone)]
pub struct VideoEditor {
    ffmpeg_path: PathBuf,
    output_dir: PathBuf,
}

impl VideoEditor {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Apply one edit to `video` and return the new file.
    pub async fn apply(&self, video: &Path, options: &EditOptions) -> Result<Artifact, EditError> {
        validate(options)?;
        require_file(video)?;
        tokio::fs::create_dir_all(&self.output_dir).await?;

        log::info!("Applying {} to {}", options.action(), video.display());
        let output = match options {
            EditOptions::AddSubtitles(params) => self.add_subtitles(video, params).await?,
            EditOptions::Trim(params) => self.trim(video, params).await?,
            EditOptions::Merge(params) => self.merge(video, params).await?,
            EditOptions::AddWatermark(params) => self.add_watermark(video, params).await?,
        };
        Ok(Artifact::inspect(output)?)
    }

    fn output_path(&self, prefix: &str, ext: &str) -> PathBuf {
        self.output_dir.join(stamped_name(prefix, ext))
    }

    async fn add_subtitles(&self, video: &Path, params: &SubtitleParams) -> Result<PathBuf, EditError> {
        let srt_path = self.output_path("subtitles", "srt");
        tokio::fs::write(&srt_path, render_srt(&params.subtitles)).await?;
        let output = self.output_path("edited", "mp4");
        self.run(&subtitle_args(video, &srt_path, params, &output)).await?;
        Ok(output)
    }

    async fn trim(&self, video: &Path, params: &TrimParams) -> Result<PathBuf, EditError> {
        let output = self.output_path("trimmed", "mp4");
        self.run(&trim_args(video, params, &output)).await?;
        Ok(output)
    }

    async fn merge(&self, video: &Path, params: &MergeParams) -> Result<PathBuf, EditError> {
        let mut inputs = Vec::with_capacity(params.additional_videos.len() + 1);
        inputs.push(video.to_path_buf());
        for extra in &params.additional_videos {
            require_file(extra)?;
            inputs.push(extra.clone());
        }
        let output = self.output_path("merged", "mp4");
        self.run(&merge_args(&inputs, &output)).await?;
        Ok(output)
    }

    async fn add_watermark(&self, video: &Path, params: &WatermarkParams) -> Result<PathBuf, EditError> {
        require_file(&params.watermark_path)?;
        let output = self.output_path("watermarked", "mp4");
        self.run(&watermark_args(video, params, &output)).await?;
        Ok(output)
    }

    async fn run(&self, args: &[String]) -> Result<(), EditError> {
        log::debug!("{} {}", self.ffmpeg_path.display(), args.join(" "));
        let output = tokio::process::Command::new(&self.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EditError::FfmpegNotFound
                } else {
                    EditError::SpawnFailed(e)
                }
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let lines: Vec<&str> = stderr.lines().collect();
        let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
        log::error!("FFmpeg failed: {}", tail);
        Err(EditError::ProcessFailed {
            exit_code: output.status.code(),
            stderr: tail,
        })
    }
}

fn require_file(path: &Path) -> Result<(), EditError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(EditError::InputNotFound(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srt_time_format() {
        assert_eq!(seconds_to_srt_time(0.0), "00:00:00,000");
        assert_eq!(seconds_to_srt_time(2.5), "00:00:02,500");
        assert_eq!(seconds_to_srt_time(3725.042), "01:02:05,042");
    }

    #[test]
    fn test_ass_colour_is_bgr() {
        assert_eq!(ass_colour("red"), "&H0000FF&");
        assert_eq!(ass_colour("White"), "&HFFFFFF&");
        assert_eq!(ass_colour("magenta"), "&HFFFFFF&");
    }

    #[test]
    fn test_filter_path_escaping() {
        assert_eq!(
            escape_filter_path(Path::new("C:\\clips\\it's.srt")),
            "C\\:/clips/it\\'s.srt"
        );
    }
}
