use crate::models::pose::{PoseError, PoseResult, DEFAULT_FRAME_RATE, MAX_KEYPOINTS, NUM_KEYPOINTS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which landmark provider an extraction run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Try the detector, fall back to synthetic when it cannot be built
    Auto,
    Detector,
    Synthetic,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendKind::Auto),
            "detector" => Ok(BackendKind::Detector),
            "synthetic" => Ok(BackendKind::Synthetic),
            other => Err(format!(
                "unknown backend '{}'. Must be one of: auto, detector, synthetic",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelComplexity {
    Lite = 0,  // Fastest, less accurate
    Full = 1,  // Balanced
    Heavy = 2, // Slowest, most accurate
}

/// Extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Landmark provider selection
    pub backend: BackendKind,
    /// Size of the landmark topology (MediaPipe Pose uses 33)
    pub num_keypoints: usize,
    /// Frame rate assumed when a container reports none
    pub default_frame_rate: f64,
    /// Frame rate of image-sequence directories
    pub image_sequence_fps: f64,
    /// Minimum confidence for a fresh detection (0.0-1.0)
    pub min_detection_confidence: f32,
    /// Minimum confidence to keep tracking a detected pose (0.0-1.0)
    pub min_tracking_confidence: f32,
    /// Detector model variant
    pub model_complexity: ModelComplexity,
    /// ONNX landmark model, required by the `ml-onnx` detector
    pub model_path: Option<PathBuf>,
    /// Indent the written JSON
    pub pretty_output: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Auto,
            num_keypoints: NUM_KEYPOINTS,
            default_frame_rate: DEFAULT_FRAME_RATE,
            image_sequence_fps: DEFAULT_FRAME_RATE,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
            model_complexity: ModelComplexity::Full,
            model_path: None,
            pretty_output: true,
        }
    }
}

impl ExtractionConfig {
    /// Load configuration from the default location, creating it with defaults if it doesn't exist
    pub fn load() -> PoseResult<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Load configuration from `path`, creating it with defaults if it doesn't exist
    pub fn load_from(path: &Path) -> PoseResult<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                PoseError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
            })?;
            let config: ExtractionConfig = serde_json::from_str(&contents).map_err(|e| {
                PoseError::InvalidConfig(format!("cannot parse {}: {}", path.display(), e))
            })?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> PoseResult<()> {
        self.validate()?;

        let write_failure = |source| PoseError::WriteFailure {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_failure)?;
        }

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| PoseError::InvalidConfig(e.to_string()))?;
        std::fs::write(path, contents).map_err(write_failure)?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> PoseResult<()> {
        if !(1..=MAX_KEYPOINTS).contains(&self.num_keypoints) {
            return Err(PoseError::InvalidConfig(format!(
                "Invalid num_keypoints: {}. Must be between 1 and {}",
                self.num_keypoints, MAX_KEYPOINTS
            )));
        }

        for (name, fps) in [
            ("default_frame_rate", self.default_frame_rate),
            ("image_sequence_fps", self.image_sequence_fps),
        ] {
            if !fps.is_finite() || fps <= 0.0 {
                return Err(PoseError::InvalidConfig(format!(
                    "Invalid {}: {}. Must be a positive number",
                    name, fps
                )));
            }
        }

        for (name, confidence) in [
            ("min_detection_confidence", self.min_detection_confidence),
            ("min_tracking_confidence", self.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(PoseError::InvalidConfig(format!(
                    "Invalid {}: {}. Must be between 0.0 and 1.0",
                    name, confidence
                )));
            }
        }

        Ok(())
    }

    /// Get the default configuration file path
    pub fn get_config_path() -> PoseResult<PathBuf> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| {
                PoseError::InvalidConfig("Could not determine home directory".to_string())
            })?;

        let mut path = PathBuf::from(home);
        path.push(".dance_pose");
        path.push("config.json");

        Ok(path)
    }
}
