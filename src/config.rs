//! Pipeline configuration.
//!
//! Settings are grouped per stage and loaded from an optional TOML file,
//! with defaults matching the tuned production values. The CLI layers its
//! own flag/env overrides on top of whatever is loaded here.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default processing deadline for one document, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// PDF rendering (page splitting) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Render resolution in dots per inch.
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    /// Thread hint passed to the renderer.
    #[serde(default = "default_render_threads")]
    pub thread_count: u32,
}

/// Orientation detection (OSD) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsdSettings {
    /// Fraction of each edge cropped away before classification.
    /// 0.15 keeps the central 70% of the page, dropping scanner noise.
    #[serde(default = "default_osd_crop")]
    pub crop_fraction: f32,
    /// Long-edge size the crop is resized to before classification.
    #[serde(default = "default_osd_resize")]
    pub resize_px: u32,
    /// Minimum classifier confidence required to apply a rotation.
    #[serde(default = "default_osd_confidence")]
    pub confidence_threshold: f32,
}

/// Skew detection and correction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeskewSettings {
    /// Long-edge size the page is resized to before detection.
    /// 1200px is the accuracy/speed sweet spot for projection profiles.
    #[serde(default = "default_deskew_resize")]
    pub resize_px: u32,
    /// How many top-scoring candidate angles are averaged into the estimate.
    #[serde(default = "default_deskew_peaks")]
    pub num_peaks: usize,
    /// Scan range: candidate angles cover [-max_angle, +max_angle] degrees.
    #[serde(default = "default_deskew_max_angle")]
    pub max_angle: f32,
    /// Angle resolution of the candidate grid, in degrees.
    #[serde(default = "default_deskew_step")]
    pub angle_step: f32,
    /// Corrections at or below this absolute angle are skipped.
    #[serde(default = "default_skew_threshold")]
    pub threshold: f32,
}

/// Text recognition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionSettings {
    /// Default language set, combined into one recognizer pass.
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    /// Recognition engine mode (tesseract --oem).
    #[serde(default = "default_oem")]
    pub oem: u8,
    /// Page segmentation mode (tesseract --psm).
    #[serde(default = "default_psm")]
    pub psm: u8,
}

/// Coordinator scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Concurrent page workers per stage round. 0 means one per CPU.
    #[serde(default)]
    pub workers: usize,
    /// Document-level processing deadline in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Coordinate store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Maximum retained documents; oldest are evicted beyond this.
    /// None keeps everything for the process lifetime.
    #[serde(default)]
    pub max_documents: Option<usize>,
}

/// Application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub render: RenderSettings,
    #[serde(default)]
    pub osd: OsdSettings,
    #[serde(default)]
    pub deskew: DeskewSettings,
    #[serde(default)]
    pub recognition: RecognitionSettings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub store: StoreSettings,
}

impl Settings {
    /// Effective worker count for stage rounds.
    pub fn worker_count(&self) -> usize {
        if self.pipeline.workers > 0 {
            self.pipeline.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        }
    }
}

/// Load settings from a TOML file, or defaults when no file is given.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("cannot read config {}: {}", path.display(), e))?;
            let settings: Settings = toml::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
            Ok(settings)
        }
        None => Ok(Settings::default()),
    }
}

fn default_dpi() -> u32 {
    200
}

fn default_render_threads() -> u32 {
    4
}

fn default_osd_crop() -> f32 {
    0.15
}

fn default_osd_resize() -> u32 {
    2048
}

fn default_osd_confidence() -> f32 {
    2.0
}

fn default_deskew_resize() -> u32 {
    1200
}

fn default_deskew_peaks() -> usize {
    20
}

fn default_deskew_max_angle() -> f32 {
    5.0
}

fn default_deskew_step() -> f32 {
    0.25
}

fn default_skew_threshold() -> f32 {
    0.1
}

fn default_languages() -> Vec<String> {
    vec!["eng".to_string()]
}

fn default_oem() -> u8 {
    3
}

fn default_psm() -> u8 {
    3
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            dpi: default_dpi(),
            thread_count: default_render_threads(),
        }
    }
}

impl Default for OsdSettings {
    fn default() -> Self {
        Self {
            crop_fraction: default_osd_crop(),
            resize_px: default_osd_resize(),
            confidence_threshold: default_osd_confidence(),
        }
    }
}

impl Default for DeskewSettings {
    fn default() -> Self {
        Self {
            resize_px: default_deskew_resize(),
            num_peaks: default_deskew_peaks(),
            max_angle: default_deskew_max_angle(),
            angle_step: default_deskew_step(),
            threshold: default_skew_threshold(),
        }
    }
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            oem: default_oem(),
            psm: default_psm(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            workers: 0,
            timeout_secs: default_timeout(),
        }
    }
}
