//! Post-processing of generated videos with FFmpeg.

mod ffmpeg;
mod options;

pub use ffmpeg::{
    ass_colour, color_to_hex, merge_args, render_srt, seconds_to_srt_time, subtitle_args,
    subtitle_filter, trim_args, validate, watermark_args, watermark_filter, EditError,
    VideoEditor,
};
pub use options::{
    EditOptions, MergeParams, SubtitleCue, SubtitleParams, SubtitlePosition, TrimParams,
    WatermarkParams, WatermarkPosition,
};
