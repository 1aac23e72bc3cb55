use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_API_ADDR: &str = "0.0.0.0:5000";
const DEFAULT_MODEL_PATH: &str = "models/rrb_classifier.onnx";
const DEFAULT_POSE_MODEL_PATH: &str = "models/pose_landmarks.onnx";
const DEFAULT_LABEL_ENCODER_PATH: &str = "models/label_encoder.json";
const DEFAULT_SEQUENCE_LENGTH: usize = 30;
const DEFAULT_IMAGE_SIZE: u32 = 224;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.7;
const DEFAULT_MIN_DETECTION_DURATION_S: f64 = 2.0;
const DEFAULT_FPS: f64 = 30.0;
const DEFAULT_MAX_CONSECUTIVE_READ_FAILURES: u32 = 10;
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;
const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;
const DEFAULT_NORMAL_LABEL: &str = "normal";
const DEFAULT_EXTENSIONS: [&str; 5] = ["mp4", "avi", "mov", "mkv", "webm"];
const DEFAULT_CATEGORIES: [&str; 6] = [
    "hand_flapping",
    "head_banging",
    "head_nodding",
    "spinning",
    "atypical_hand_movements",
    "normal",
];

/// Tunables of the detection pipeline. Immutable once built; every pipeline
/// component receives it (or a copy) at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorConfig {
    /// Frames per classified sequence.
    pub sequence_length: usize,
    /// Square input size of the pose model, in pixels.
    pub image_size: u32,
    /// Minimum top-class probability for a sequence to count as a detection.
    pub confidence_threshold: f32,
    /// Minimum run duration, in seconds, for a detection to be reported.
    pub min_detection_duration: f64,
    /// Frame rate used when the video reports none or cannot be opened.
    pub default_fps: f64,
    /// Consecutive decode failures after which the frame stream ends.
    pub max_consecutive_read_failures: u32,
    /// Optional cap on frames read per video.
    pub max_frames: Option<u64>,
    /// Class label meaning "no repetitive behavior".
    pub normal_label: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sequence_length: DEFAULT_SEQUENCE_LENGTH,
            image_size: DEFAULT_IMAGE_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            min_detection_duration: DEFAULT_MIN_DETECTION_DURATION_S,
            default_fps: DEFAULT_FPS,
            max_consecutive_read_failures: DEFAULT_MAX_CONSECUTIVE_READ_FAILURES,
            max_frames: None,
            normal_label: DEFAULT_NORMAL_LABEL.to_string(),
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sequence_length == 0 {
            return Err(anyhow!("sequence_length must be at least 1"));
        }
        if self.image_size == 0 {
            return Err(anyhow!("image_size must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(anyhow!("confidence_threshold must be within [0, 1]"));
        }
        if !self.min_detection_duration.is_finite() || self.min_detection_duration < 0.0 {
            return Err(anyhow!("min_detection_duration must be a non-negative number"));
        }
        if !self.default_fps.is_finite() || self.default_fps <= 0.0 {
            return Err(anyhow!("default_fps must be positive"));
        }
        if self.max_consecutive_read_failures == 0 {
            return Err(anyhow!("max_consecutive_read_failures must be at least 1"));
        }
        if self.normal_label.trim().is_empty() {
            return Err(anyhow!("normal_label must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Default)]
struct ServiceConfigFile {
    api_addr: Option<String>,
    upload_dir: Option<PathBuf>,
    allowed_extensions: Option<Vec<String>>,
    max_upload_size: Option<u64>,
    max_concurrent_requests: Option<usize>,
    expose_error_details: Option<bool>,
    categories: Option<Vec<String>>,
    model: Option<ModelConfigFile>,
    detection: Option<DetectionConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    path: Option<PathBuf>,
    pose_path: Option<PathBuf>,
    label_encoder_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    sequence_length: Option<usize>,
    image_size: Option<u32>,
    confidence_threshold: Option<f32>,
    min_detection_duration: Option<f64>,
    default_fps: Option<f64>,
    max_consecutive_read_failures: Option<u32>,
    max_frames: Option<u64>,
    normal_label: Option<String>,
}

/// Settings of the HTTP detection service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub api_addr: String,
    pub model_path: PathBuf,
    pub pose_model_path: PathBuf,
    pub label_encoder_path: PathBuf,
    pub upload_dir: PathBuf,
    pub allowed_extensions: Vec<String>,
    pub max_upload_size: u64,
    /// Requests handled at once; further connections get 503.
    pub max_concurrent_requests: usize,
    /// Include error chains in 500 responses. Never enable in production.
    pub expose_error_details: bool,
    pub categories: Vec<String>,
    pub detector: DetectorConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_addr: DEFAULT_API_ADDR.to_string(),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            pose_model_path: PathBuf::from(DEFAULT_POSE_MODEL_PATH),
            label_encoder_path: PathBuf::from(DEFAULT_LABEL_ENCODER_PATH),
            upload_dir: std::env::temp_dir(),
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            max_upload_size: DEFAULT_MAX_UPLOAD_BYTES,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            expose_error_details: false,
            categories: DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect(),
            detector: DetectorConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("RRB_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ServiceConfigFile) -> Self {
        let defaults = ServiceConfig::default();
        let model = file.model.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();
        let detector_defaults = defaults.detector;
        let detector = DetectorConfig {
            sequence_length: detection
                .sequence_length
                .unwrap_or(detector_defaults.sequence_length),
            image_size: detection.image_size.unwrap_or(detector_defaults.image_size),
            confidence_threshold: detection
                .confidence_threshold
                .unwrap_or(detector_defaults.confidence_threshold),
            min_detection_duration: detection
                .min_detection_duration
                .unwrap_or(detector_defaults.min_detection_duration),
            default_fps: detection.default_fps.unwrap_or(detector_defaults.default_fps),
            max_consecutive_read_failures: detection
                .max_consecutive_read_failures
                .unwrap_or(detector_defaults.max_consecutive_read_failures),
            max_frames: detection.max_frames.or(detector_defaults.max_frames),
            normal_label: detection
                .normal_label
                .unwrap_or(detector_defaults.normal_label),
        };
        Self {
            api_addr: file.api_addr.unwrap_or(defaults.api_addr),
            model_path: model.path.unwrap_or(defaults.model_path),
            pose_model_path: model.pose_path.unwrap_or(defaults.pose_model_path),
            label_encoder_path: model
                .label_encoder_path
                .unwrap_or(defaults.label_encoder_path),
            upload_dir: file.upload_dir.unwrap_or(defaults.upload_dir),
            allowed_extensions: file
                .allowed_extensions
                .map(|exts| normalize_extensions(&exts))
                .unwrap_or(defaults.allowed_extensions),
            max_upload_size: file.max_upload_size.unwrap_or(defaults.max_upload_size),
            max_concurrent_requests: file
                .max_concurrent_requests
                .unwrap_or(defaults.max_concurrent_requests),
            expose_error_details: file
                .expose_error_details
                .unwrap_or(defaults.expose_error_details),
            categories: file.categories.unwrap_or(defaults.categories),
            detector,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(addr) = env_nonempty("RRB_API_ADDR") {
            self.api_addr = addr;
        }
        if let Some(path) = env_nonempty("RRB_MODEL_PATH") {
            self.model_path = PathBuf::from(path);
        }
        if let Some(path) = env_nonempty("RRB_POSE_MODEL_PATH") {
            self.pose_model_path = PathBuf::from(path);
        }
        if let Some(path) = env_nonempty("RRB_LABEL_ENCODER_PATH") {
            self.label_encoder_path = PathBuf::from(path);
        }
        if let Some(dir) = env_nonempty("RRB_UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(dir);
        }
        if let Some(exts) = env_nonempty("RRB_ALLOWED_EXTENSIONS") {
            let parsed = normalize_extensions(&split_csv(&exts));
            if !parsed.is_empty() {
                self.allowed_extensions = parsed;
            }
        }
        if let Some(value) = env_nonempty("RRB_SEQUENCE_LENGTH") {
            self.detector.sequence_length = value
                .parse()
                .map_err(|_| anyhow!("RRB_SEQUENCE_LENGTH must be a positive integer"))?;
        }
        if let Some(value) = env_nonempty("RRB_CONFIDENCE_THRESHOLD") {
            self.detector.confidence_threshold = value
                .parse()
                .map_err(|_| anyhow!("RRB_CONFIDENCE_THRESHOLD must be a number"))?;
        }
        if let Some(value) = env_nonempty("RRB_MIN_DETECTION_DURATION") {
            self.detector.min_detection_duration = value
                .parse()
                .map_err(|_| anyhow!("RRB_MIN_DETECTION_DURATION must be a number of seconds"))?;
        }
        if let Some(value) = env_nonempty("RRB_MAX_UPLOAD_BYTES") {
            self.max_upload_size = value
                .parse()
                .map_err(|_| anyhow!("RRB_MAX_UPLOAD_BYTES must be an integer number of bytes"))?;
        }
        if let Some(value) = env_nonempty("RRB_MAX_CONCURRENT_REQUESTS") {
            self.max_concurrent_requests = value
                .parse()
                .map_err(|_| anyhow!("RRB_MAX_CONCURRENT_REQUESTS must be a positive integer"))?;
        }
        if let Some(value) = env_nonempty("RRB_DEBUG") {
            self.expose_error_details = parse_bool(&value)
                .ok_or_else(|| anyhow!("RRB_DEBUG must be true/false"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.detector.validate()?;
        if self.allowed_extensions.is_empty() {
            return Err(anyhow!("at least one allowed extension is required"));
        }
        if self.max_upload_size == 0 {
            return Err(anyhow!("max_upload_size must be greater than zero"));
        }
        if self.max_concurrent_requests == 0 {
            return Err(anyhow!("max_concurrent_requests must be at least 1"));
        }
        if self.categories.is_empty() {
            return Err(anyhow!("categories must not be empty"));
        }
        Ok(())
    }

    /// Extension check on the client-supplied file name (case-insensitive).
    pub fn is_allowed_file(&self, filename: &str) -> bool {
        match filename.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => {
                let ext = ext.to_ascii_lowercase();
                self.allowed_extensions.iter().any(|allowed| *allowed == ext)
            }
            _ => false,
        }
    }
}

fn read_config_file(path: &Path) -> Result<ServiceConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn normalize_extensions(exts: &[String]) -> Vec<String> {
    exts.iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
