use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::params::{Confidence, DEFAULT_CONFIDENCE};

const DEFAULT_MODEL_PATH: &str = "best.onnx";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_CAMERA_FPS: u32 = 30;
const DEFAULT_OUTPUT_DIR: &str = "road_damage_out";

pub const CONFIG_ENV: &str = "ROAD_DAMAGE_CONFIG";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AppConfigFile {
    confidence: Option<f32>,
    font_path: Option<PathBuf>,
    model: Option<ModelConfigFile>,
    camera: Option<CameraConfigFile>,
    output: Option<OutputConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfigFile {
    path: Option<PathBuf>,
    input_size: Option<u32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OutputConfigFile {
    dir: Option<PathBuf>,
    keep_frames: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub confidence: Confidence,
    pub font_path: Option<PathBuf>,
    pub model: ModelSettings,
    pub camera: CameraSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    /// Weights file, or `stub://...` for the stub backend.
    pub path: PathBuf,
    /// Side of the square network input.
    pub input_size: u32,
    pub iou_threshold: f32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_MODEL_PATH),
            input_size: DEFAULT_INPUT_SIZE,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// Device node, or `stub://...` for synthetic frames.
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device: DEFAULT_CAMERA_DEVICE.to_string(),
            width: DEFAULT_CAMERA_WIDTH,
            height: DEFAULT_CAMERA_HEIGHT,
            target_fps: DEFAULT_CAMERA_FPS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub dir: PathBuf,
    /// Keep every streamed frame instead of only the latest one.
    pub keep_frames: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            keep_frames: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            confidence: Confidence::default(),
            font_path: None,
            model: ModelSettings::default(),
            camera: CameraSettings::default(),
            output: OutputSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load from the file named by `ROAD_DAMAGE_CONFIG` (if set), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Like `load`, but reads `path` instead of consulting `ROAD_DAMAGE_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => AppConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AppConfigFile) -> Result<Self> {
        let confidence = Confidence::new(file.confidence.unwrap_or(DEFAULT_CONFIDENCE))?;
        let model = file.model.unwrap_or_default();
        let camera = file.camera.unwrap_or_default();
        let output = file.output.unwrap_or_default();
        Ok(Self {
            confidence,
            font_path: file.font_path,
            model: ModelSettings {
                path: model
                    .path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
                input_size: model.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
                iou_threshold: model.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
            },
            camera: CameraSettings {
                device: camera
                    .device
                    .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
                width: camera.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
                height: camera.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
                target_fps: camera.target_fps.unwrap_or(DEFAULT_CAMERA_FPS),
            },
            output: OutputSettings {
                dir: output
                    .dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
                keep_frames: output.keep_frames.unwrap_or(false),
            },
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(path) = non_empty_env("ROAD_DAMAGE_MODEL") {
            self.model.path = PathBuf::from(path);
        }
        if let Some(value) = non_empty_env("ROAD_DAMAGE_CONFIDENCE") {
            let value: f32 = value
                .parse()
                .map_err(|_| anyhow!("ROAD_DAMAGE_CONFIDENCE must be a number between 0 and 1"))?;
            self.confidence = Confidence::new(value)?;
        }
        if let Some(device) = non_empty_env("ROAD_DAMAGE_CAMERA") {
            self.camera.device = device;
        }
        if let Some(dir) = non_empty_env("ROAD_DAMAGE_OUT_DIR") {
            self.output.dir = PathBuf::from(dir);
        }
        if let Some(font) = non_empty_env("ROAD_DAMAGE_FONT") {
            self.font_path = Some(PathBuf::from(font));
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.model.input_size == 0 || self.model.input_size % 32 != 0 {
            return Err(anyhow!(
                "model input_size must be a positive multiple of 32, got {}",
                self.model.input_size
            ));
        }
        if !(self.model.iou_threshold > 0.0 && self.model.iou_threshold <= 1.0) {
            return Err(anyhow!(
                "model iou_threshold must be within (0, 1], got {}",
                self.model.iou_threshold
            ));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera width and height must be greater than zero"));
        }
        if self.camera.device.trim().is_empty() {
            return Err(anyhow!("camera device must not be empty"));
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
