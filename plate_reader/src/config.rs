//! Pipeline configuration.
//!
//! Every tunable of the plate reader lives here and is handed to each
//! component at construction. Values come from an optional JSON file, then
//! command line overrides, and are checked by [`PipelineConfig::validate`]
//! before anything is built from them.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PlateError, Result};

pub const PLATE_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub source: SourceConfig,
    pub proposer: ProposerConfig,
    pub preprocess: PreprocessConfig,
    pub ocr: OcrConfig,
    pub normalizer: NormalizerConfig,
    pub tracker: TrackerConfig,
    pub capture: CaptureConfig,
    pub display: DisplayConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Camera index, used when `file` is not set.
    pub device_index: i32,
    /// Read frames from a video file instead of a device.
    pub file: Option<PathBuf>,
    pub width: i32,
    pub height: i32,
    /// Pace file playback to at most this many frames per second.
    pub max_fps: Option<u32>,
    /// Restart the file when it ends.
    pub loop_file: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            file: None,
            width: 640,
            height: 480,
            max_fps: None,
            loop_file: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContourRetrieval {
    Tree,
    List,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProposerConfig {
    pub blur_kernel: i32,
    pub canny_low: f64,
    pub canny_high: f64,
    /// Polygon approximation tolerance as a fraction of the contour perimeter.
    pub approx_epsilon: f64,
    pub retrieval: ContourRetrieval,
    pub min_width: i32,
    pub min_height: i32,
    /// Exclusive lower bound on width / height.
    pub min_aspect: f64,
    /// Exclusive upper bound on width / height.
    pub max_aspect: f64,
    pub edge_margin: i32,
    /// Stop OCR after this many candidates in one frame.
    pub max_ocr_attempts: Option<usize>,
}

impl Default for ProposerConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 5,
            canny_low: 100.0,
            canny_high: 200.0,
            approx_epsilon: 0.02,
            retrieval: ContourRetrieval::Tree,
            min_width: 60,
            min_height: 15,
            min_aspect: 2.0,
            max_aspect: 6.5,
            edge_margin: 5,
            max_ocr_attempts: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub clahe_clip_limit: f64,
    pub clahe_tile_grid: i32,
    pub bilateral_diameter: i32,
    pub bilateral_sigma_color: f64,
    pub bilateral_sigma_space: f64,
    pub close_kernel: i32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            clahe_clip_limit: 2.0,
            clahe_tile_grid: 8,
            bilateral_diameter: 11,
            bilateral_sigma_color: 90.0,
            bilateral_sigma_space: 90.0,
            close_kernel: 2,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tesseract data directory; the system default when unset.
    pub data_path: Option<String>,
    pub language: String,
    pub whitelist: String,
    /// Tesseract page segmentation mode. 7 treats the image as one text line.
    pub page_seg_mode: i32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            language: "eng".to_string(),
            whitelist: PLATE_WHITELIST.to_string(),
            page_seg_mode: 7,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub min_len: usize,
    pub max_len: usize,
    /// Also require an anchored pattern match on the cleaned token.
    pub strict: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            min_len: 5,
            max_len: 8,
            strict: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Consecutive identical readings needed to confirm a plate.
    pub confirm_threshold: u32,
    /// Empty ticks tolerated before the accumulated state is dropped.
    pub miss_tolerance: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            confirm_threshold: 3,
            miss_tolerance: 0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub enabled: bool,
    pub directory: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from("captures"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    Window,
    Rtp,
    Headless,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub mode: DisplayMode,
    pub window_title: String,
    pub rtp_host: String,
    pub rtp_port: u16,
    /// Also write the annotated stream to this video file.
    pub record_to: Option<PathBuf>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            mode: DisplayMode::Window,
            window_title: "Plate reader - press ESC to quit".to_string(),
            rtp_host: "127.0.0.1".to_string(),
            rtp_port: 5000,
            record_to: None,
        }
    }
}

impl PipelineConfig {
    /// Reads a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(PlateError::InvalidConfig(msg.to_string()));

        if self.source.width <= 0 || self.source.height <= 0 {
            return invalid("source width and height must be positive");
        }
        if self.source.max_fps == Some(0) {
            return invalid("source max_fps must be positive");
        }

        let p = &self.proposer;
        if p.blur_kernel <= 0 || p.blur_kernel % 2 == 0 {
            return invalid("proposer blur_kernel must be a positive odd number");
        }
        if p.canny_low < 0.0 || p.canny_low > p.canny_high {
            return invalid("proposer canny thresholds must satisfy 0 <= low <= high");
        }
        if p.approx_epsilon <= 0.0 {
            return invalid("proposer approx_epsilon must be positive");
        }
        if p.min_width <= 0 || p.min_height <= 0 {
            return invalid("proposer minimum region size must be positive");
        }
        if p.min_aspect < 0.0 || p.min_aspect >= p.max_aspect {
            return invalid("proposer aspect bounds must satisfy 0 <= min < max");
        }
        if p.edge_margin < 0 {
            return invalid("proposer edge_margin cannot be negative");
        }
        if p.max_ocr_attempts == Some(0) {
            return invalid("proposer max_ocr_attempts must be positive");
        }

        let pre = &self.preprocess;
        if pre.clahe_clip_limit <= 0.0 || pre.clahe_tile_grid <= 0 {
            return invalid("preprocess CLAHE parameters must be positive");
        }
        if pre.bilateral_diameter <= 0 || pre.close_kernel <= 0 {
            return invalid("preprocess filter sizes must be positive");
        }

        if self.ocr.whitelist.is_empty() {
            return invalid("ocr whitelist cannot be empty");
        }

        let n = &self.normalizer;
        if n.min_len == 0 || n.min_len > n.max_len {
            return invalid("normalizer length bounds must satisfy 0 < min <= max");
        }

        if self.tracker.confirm_threshold == 0 {
            return invalid("tracker confirm_threshold must be at least 1");
        }

        Ok(())
    }
}
