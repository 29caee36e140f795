// Data models for pose landmark sequences

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Landmark count of the MediaPipe Pose topology
pub const NUM_KEYPOINTS: usize = 33;

/// Largest supported landmark topology
pub const MAX_KEYPOINTS: usize = 1024;

/// Frame rate used when a source reports none (or nonsense)
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

// ==============================================================================
// Keypoint
// ==============================================================================

/// A single body landmark in normalized image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub id: u32,
    pub x: f64,          // Normalized [0, 1], left to right
    pub y: f64,          // Normalized [0, 1], top to bottom
    pub z: f64,          // Depth relative to the hip midpoint, detector scale
    pub visibility: f64, // Confidence / occlusion score [0, 1]
}

impl Keypoint {
    pub fn new(id: u32, x: f64, y: f64, z: f64, visibility: f64) -> Self {
        Self {
            id,
            x,
            y,
            z,
            visibility,
        }
    }

    pub fn is_visible(&self, threshold: f64) -> bool {
        self.visibility >= threshold
    }

    /// Check the keypoint against a topology of `num_keypoints` landmarks
    pub fn check(&self, num_keypoints: usize) -> Result<(), String> {
        if self.id as usize >= num_keypoints {
            return Err(format!(
                "landmark id {} outside topology of {} keypoints",
                self.id, num_keypoints
            ));
        }
        for (name, value) in [("x", self.x), ("y", self.y), ("visibility", self.visibility)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!(
                    "landmark {} has {} = {} outside [0, 1]",
                    self.id, name, value
                ));
            }
        }
        if !self.z.is_finite() {
            return Err(format!("landmark {} has non-finite z", self.id));
        }
        Ok(())
    }
}

/// Validate one frame's landmarks: ids in range and unique, coordinates in bounds
pub fn check_landmarks(landmarks: &[Keypoint], num_keypoints: usize) -> Result<(), String> {
    let mut seen = HashSet::with_capacity(landmarks.len());
    for keypoint in landmarks {
        keypoint.check(num_keypoints)?;
        if !seen.insert(keypoint.id) {
            return Err(format!("duplicate landmark id {}", keypoint.id));
        }
    }
    Ok(())
}

/// MediaPipe Pose Landmark indices (33 total)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BodyLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl BodyLandmark {
    pub fn id(self) -> u32 {
        self as u32
    }
}

// ==============================================================================
// Pose Frame / Sequence
// ==============================================================================

/// Landmarks for one video frame. `landmarks` is empty when nothing was detected.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseFrame {
    pub frame_index: u64,
    pub timestamp_ms: u64,
    pub landmarks: Vec<Keypoint>,
}

/// Presentation time of a frame in whole milliseconds
pub fn frame_timestamp_ms(frame_index: u64, frame_rate: f64) -> u64 {
    (frame_index as f64 * 1000.0 / frame_rate).round() as u64
}

/// Ordered pose frames of one video plus source metadata.
///
/// Built once by [`crate::core::sequence_builder::PoseSequenceBuilder`] and
/// never mutated afterwards; the fields are read-only through accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseSequence {
    source: String,
    duration_s: f64,
    frame_rate: f64,
    frames: Vec<PoseFrame>,
}

impl PoseSequence {
    pub(crate) fn from_parts(
        source: String,
        duration_s: f64,
        frame_rate: f64,
        frames: Vec<PoseFrame>,
    ) -> Self {
        Self {
            source,
            duration_s,
            frame_rate,
            frames,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn duration_s(&self) -> f64 {
        self.duration_s
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    pub fn frames(&self) -> &[PoseFrame] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Number of frames that carry at least one landmark
    pub fn detected_frames(&self) -> usize {
        self.frames.iter().filter(|f| !f.landmarks.is_empty()).count()
    }

    /// Frame on screen at `seconds` of playback, clamped to the sequence
    pub fn frame_at(&self, seconds: f64) -> Option<&PoseFrame> {
        let last = self.frames.len().checked_sub(1)?;
        let index = (seconds.max(0.0) * self.frame_rate).floor() as usize;
        self.frames.get(index.min(last))
    }
}

/// Summary of a finished extraction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSummary {
    pub source: String,
    pub frame_count: usize,
    pub detected_frames: usize,
    pub empty_frames: usize,
    pub duration_s: f64,
    pub frame_rate: f64,
    pub output_location: PathBuf,
}

// ==============================================================================
// Error Types
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    #[error("Input not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Unreadable container {}: {reason}", path.display())]
    UnreadableContainer { path: PathBuf, reason: String },

    #[error("Pose detector unavailable: {0}")]
    DetectorUnavailable(String),

    #[error("Out-of-order frame: expected {expected}, got {found}")]
    OutOfOrderFrame { expected: u64, found: u64 },

    #[error("Invalid landmarks in frame {frame_index}: {reason}")]
    InvalidLandmark { frame_index: u64, reason: String },

    #[error("Malformed pose sequence: {0}")]
    MalformedSequence(String),

    #[error("Failed to write {}: {source}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Extraction cancelled before frame {frame_index}")]
    Cancelled { frame_index: u64 },
}

pub type PoseResult<T> = Result<T, PoseError>;
