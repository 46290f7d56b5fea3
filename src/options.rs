use std::path::PathBuf;

use crate::{
    error::{ComposeError, ComposeResult},
    model::NormalizationProfile,
    params::OneOrMany,
};

/// Per-request composition options. Every field has a default.
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct ComposeOptions {
    pub use_transitions: bool,
    /// `xfade` transition name(s), one per join.
    pub transitions: OneOrMany<String>,
    /// Blend duration(s) in seconds, one per join.
    pub transition_durations: OneOrMany<f64>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Prepend a lead-in equal to the blend duration so clip openings survive the blend.
    pub preserve_clip_starts: bool,
    pub pad_color: String,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            use_transitions: false,
            transitions: OneOrMany::One("fade".to_string()),
            transition_durations: OneOrMany::One(1.0),
            width: 1280,
            height: 720,
            fps: 30,
            preserve_clip_starts: true,
            pad_color: "black".to_string(),
        }
    }
}

impl ComposeOptions {
    pub fn validate(&self) -> ComposeResult<()> {
        if self.width < 2 || self.height < 2 {
            return Err(ComposeError::validation(format!(
                "width/height must be >= 2, got {}x{}",
                self.width, self.height
            )));
        }
        if self.fps == 0 {
            return Err(ComposeError::validation("fps must be >= 1"));
        }
        if self.pad_color.trim().is_empty() {
            return Err(ComposeError::validation("pad_color must be non-empty"));
        }
        Ok(())
    }

    pub fn with_transitions(
        mut self,
        names: impl Into<OneOrMany<String>>,
        durations: impl Into<OneOrMany<f64>>,
    ) -> Self {
        self.use_transitions = true;
        self.transitions = names.into();
        self.transition_durations = durations.into();
        self
    }

    pub fn profile(&self) -> NormalizationProfile {
        NormalizationProfile {
            width: self.width,
            height: self.height,
            fps: self.fps,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VideoSource {
    pub video_url: String,
}

/// JSON payload accepted by the `combine-videos` endpoint and the CLI.
///
/// Absent option keys fall back to [`ComposeOptions::default`].
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CombineRequest {
    pub video_urls: Vec<VideoSource>,
    pub id: Option<String>,
    /// Accepted for compatibility; delivery happens outside this crate.
    pub webhook_url: Option<String>,
    pub use_transitions: Option<bool>,
    pub transitions: Option<OneOrMany<String>>,
    pub transition_durations: Option<OneOrMany<f64>>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
    pub preserve_clip_starts: Option<bool>,
    pub pad_color: Option<String>,
}

impl CombineRequest {
    pub fn from_json_slice(bytes: &[u8]) -> ComposeResult<Self> {
        let req: Self =
            serde_json::from_slice(bytes).map_err(|e| ComposeError::serde(e.to_string()))?;
        if req.video_urls.is_empty() {
            return Err(ComposeError::validation("video_urls must not be empty"));
        }
        Ok(req)
    }

    pub fn sources(&self) -> Vec<String> {
        self.video_urls.iter().map(|s| s.video_url.clone()).collect()
    }

    pub fn options(&self) -> ComposeOptions {
        let d = ComposeOptions::default();
        ComposeOptions {
            use_transitions: self.use_transitions.unwrap_or(d.use_transitions),
            transitions: self.transitions.clone().unwrap_or(d.transitions),
            transition_durations: self
                .transition_durations
                .clone()
                .unwrap_or(d.transition_durations),
            width: self.width.unwrap_or(d.width),
            height: self.height.unwrap_or(d.height),
            fps: self.fps.unwrap_or(d.fps),
            preserve_clip_starts: self.preserve_clip_starts.unwrap_or(d.preserve_clip_starts),
            pad_color: self.pad_color.clone().unwrap_or(d.pad_color),
        }
    }
}

/// Encoder settings for the re-encoding (transition) path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodeSettings {
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_codec: String,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: "veryfast".to_string(),
            crf: 18,
            audio_codec: "aac".to_string(),
        }
    }
}

/// Deployment-level configuration shared by every request a [`crate::Composer`] handles.
#[derive(Clone, Debug)]
pub struct ComposerConfig {
    /// Directory holding fetched inputs and produced outputs.
    pub staging_dir: PathBuf,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub encode: EncodeSettings,
}

impl ComposerConfig {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            encode: EncodeSettings::default(),
        }
    }

    pub fn with_binaries(mut self, ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        self.ffmpeg_bin = ffmpeg.into();
        self.ffprobe_bin = ffprobe.into();
        self
    }

    pub fn with_encode(mut self, encode: EncodeSettings) -> Self {
        self.encode = encode;
        self
    }

    pub fn validate(&self) -> ComposeResult<()> {
        if self.ffmpeg_bin.trim().is_empty() || self.ffprobe_bin.trim().is_empty() {
            return Err(ComposeError::validation(
                "ffmpeg/ffprobe binary names must be non-empty",
            ));
        }
        if self.encode.crf > 51 {
            return Err(ComposeError::validation(format!(
                "crf must be within 0..=51, got {}",
                self.encode.crf
            )));
        }
        if self.encode.preset.trim().is_empty() {
            return Err(ComposeError::validation("encoder preset must be non-empty"));
        }
        Ok(())
    }

    pub fn input_stem(&self, job_id: &str, index: usize) -> PathBuf {
        self.staging_dir.join(format!("{job_id}_input_{index}"))
    }

    pub fn output_path(&self, job_id: &str) -> PathBuf {
        self.staging_dir.join(format!("{job_id}.mp4"))
    }
}
