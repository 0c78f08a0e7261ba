//! Edit requests as clients send them.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One edit action and its parameters.
///
/// Wire form: `{"action": "trim", "params": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "params", rename_all = "snake_case")]
pub enum EditOptions {
    #[serde(alias = "subtitles")]
    AddSubtitles(SubtitleParams),
    Trim(TrimParams),
    Merge(MergeParams),
    #[serde(alias = "watermark")]
    AddWatermark(WatermarkParams),
}

impl EditOptions {
    pub fn action(&self) -> &'static str {
        match self {
            EditOptions::AddSubtitles(_) => "add_subtitles",
            EditOptions::Trim(_) => "trim",
            EditOptions::Merge(_) => "merge",
            EditOptions::AddWatermark(_) => "add_watermark",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleCue {
    pub text: String,
    /// Seconds from the start of the video.
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitlePosition {
    Top,
    Center,
    #[default]
    Bottom,
}

impl SubtitlePosition {
    /// ASS numpad alignment code.
    pub fn alignment(self) -> u8 {
        match self {
            SubtitlePosition::Bottom => 2,
            SubtitlePosition::Center => 5,
            SubtitlePosition::Top => 8,
        }
    }
}

fn default_font_size() -> u32 {
    24
}

fn default_font_color() -> String {
    "white".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleParams {
    pub subtitles: Vec<SubtitleCue>,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    /// Colour name; unknown names render white.
    #[serde(default = "default_font_color")]
    pub font_color: String,
    #[serde(default)]
    pub position: SubtitlePosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimParams {
    pub start_time: f64,
    pub end_time: f64,
}

impl TrimParams {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeParams {
    /// Videos appended after the edited one, in order.
    pub additional_videos: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
    Center,
}

impl WatermarkPosition {
    /// `overlay` filter coordinates.
    pub fn overlay_coordinates(self) -> &'static str {
        match self {
            WatermarkPosition::TopLeft => "x=10:y=10",
            WatermarkPosition::TopRight => "x=W-w-10:y=10",
            WatermarkPosition::BottomLeft => "x=10:y=H-h-10",
            WatermarkPosition::BottomRight => "x=W-w-10:y=H-h-10",
            WatermarkPosition::Center => "x=(W-w)/2:y=(H-h)/2",
        }
    }
}

fn default_opacity() -> f32 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkParams {
    pub watermark_path: PathBuf,
    #[serde(default)]
    pub position: WatermarkPosition,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trim_from_json() {
        let options: EditOptions = serde_json::from_value(json!({
            "action": "trim",
            "params": {"start_time": 1.0, "end_time": 3.5}
        }))
        .unwrap();
        match options {
            EditOptions::Trim(params) => assert_eq!(params.duration(), 2.5),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_short_aliases() {
        let options: EditOptions = serde_json::from_value(json!({
            "action": "watermark",
            "params": {"watermark_path": "logo.png"}
        }))
        .unwrap();
        assert_eq!(options.action(), "add_watermark");
        if let EditOptions::AddWatermark(params) = options {
            assert_eq!(params.position, WatermarkPosition::BottomRight);
            assert_eq!(params.opacity, 0.5);
        }

        let options: EditOptions = serde_json::from_value(json!({
            "action": "subtitles",
            "params": {"subtitles": [{"text": "hi", "start": 0, "end": 1}]}
        }))
        .unwrap();
        if let EditOptions::AddSubtitles(params) = options {
            assert_eq!(params.font_size, 24);
            assert_eq!(params.font_color, "white");
            assert_eq!(params.position, SubtitlePosition::Bottom);
        } else {
            panic!("expected subtitles");
        }
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let result: Result<EditOptions, _> = serde_json::from_value(json!({
            "action": "explode",
            "params": {}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_watermark_positions_parse_kebab_case() {
        let position: WatermarkPosition = serde_json::from_value(json!("top-left")).unwrap();
        assert_eq!(position.overlay_coordinates(), "x=10:y=10");
    }
}
