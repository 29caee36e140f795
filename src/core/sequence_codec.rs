//! JSON encoding of pose sequences.
//!
//! Wire layout:
//!
//! ```json
//! {
//!   "version": 1,
//!   "source": "clip.mp4",
//!   "duration_s": 2.0,
//!   "frame_rate": 30.0,
//!   "frames": [
//!     { "frame": 0, "landmarks": [ { "id": 0, "x": 0.5, "y": 0.4, "z": -0.1, "visibility": 0.98 } ] }
//!   ]
//! }
//! ```
//!
//! `timestamp_ms` is derived data and is not stored; decoding recomputes it.

use crate::models::pose::{
    check_landmarks, frame_timestamp_ms, Keypoint, PoseError, PoseFrame, PoseResult, PoseSequence,
    MAX_KEYPOINTS, NUM_KEYPOINTS,
};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

fn default_version() -> u32 {
    SCHEMA_VERSION
}

#[derive(Serialize)]
struct SequenceOut<'a> {
    version: u32,
    source: &'a str,
    duration_s: f64,
    frame_rate: f64,
    frames: Vec<FrameOut<'a>>,
}

#[derive(Serialize)]
struct FrameOut<'a> {
    frame: u64,
    landmarks: &'a [Keypoint],
}

#[derive(Deserialize)]
struct SequenceIn {
    #[serde(default = "default_version")]
    version: u32,
    source: String,
    duration_s: f64,
    frame_rate: f64,
    frames: Vec<FrameIn>,
}

#[derive(Deserialize)]
struct FrameIn {
    frame: u64,
    landmarks: Vec<Keypoint>,
}

fn wire(sequence: &PoseSequence) -> SequenceOut<'_> {
    SequenceOut {
        version: SCHEMA_VERSION,
        source: sequence.source(),
        duration_s: sequence.duration_s(),
        frame_rate: sequence.frame_rate(),
        frames: sequence
            .frames()
            .iter()
            .map(|f| FrameOut {
                frame: f.frame_index,
                landmarks: &f.landmarks,
            })
            .collect(),
    }
}

fn malformed(reason: impl Into<String>) -> PoseError {
    PoseError::MalformedSequence(reason.into())
}

/// Pretty-printed JSON
pub fn encode(sequence: &PoseSequence) -> PoseResult<Vec<u8>> {
    serde_json::to_vec_pretty(&wire(sequence))
        .map_err(|e| malformed(format!("cannot encode sequence: {}", e)))
}

/// Single-line JSON
pub fn encode_compact(sequence: &PoseSequence) -> PoseResult<Vec<u8>> {
    serde_json::to_vec(&wire(sequence))
        .map_err(|e| malformed(format!("cannot encode sequence: {}", e)))
}

/// Decode and validate against the 33-point topology
pub fn decode(bytes: &[u8]) -> PoseResult<PoseSequence> {
    decode_with(bytes, NUM_KEYPOINTS)
}

/// Decode and validate against a topology of `num_keypoints` landmarks.
///
/// Rejects anything a builder could not have produced: unknown version,
/// non-positive rate, frames that are not `0, 1, 2, ...`, out-of-range or
/// duplicate landmarks, and a duration off by a full frame or more.
/// A `num_keypoints` outside `1..=MAX_KEYPOINTS` is `InvalidConfig`.
pub fn decode_with(bytes: &[u8], num_keypoints: usize) -> PoseResult<PoseSequence> {
    if !(1..=MAX_KEYPOINTS).contains(&num_keypoints) {
        return Err(PoseError::InvalidConfig(format!(
            "num_keypoints must be between 1 and {}, got {}",
            MAX_KEYPOINTS, num_keypoints
        )));
    }

    let raw: SequenceIn = serde_json::from_slice(bytes).map_err(|e| malformed(e.to_string()))?;

    if raw.version != SCHEMA_VERSION {
        return Err(malformed(format!(
            "unsupported version {} (expected {})",
            raw.version, SCHEMA_VERSION
        )));
    }

    if !raw.frame_rate.is_finite() || raw.frame_rate <= 0.0 {
        return Err(malformed(format!("frame_rate must be positive, got {}", raw.frame_rate)));
    }

    if !raw.duration_s.is_finite() || raw.duration_s < 0.0 {
        return Err(malformed(format!(
            "duration_s must be non-negative, got {}",
            raw.duration_s
        )));
    }

    let mut frames = Vec::with_capacity(raw.frames.len());
    for (expected, frame) in raw.frames.into_iter().enumerate() {
        let expected = expected as u64;
        if frame.frame != expected {
            return Err(malformed(format!(
                "frame {} found where frame {} was expected",
                frame.frame, expected
            )));
        }

        check_landmarks(&frame.landmarks, num_keypoints)
            .map_err(|reason| malformed(format!("frame {}: {}", frame.frame, reason)))?;

        frames.push(PoseFrame {
            frame_index: frame.frame,
            timestamp_ms: frame_timestamp_ms(frame.frame, raw.frame_rate),
            landmarks: frame.landmarks,
        });
    }

    let expected_duration = frames.len() as f64 / raw.frame_rate;
    if (raw.duration_s - expected_duration).abs() >= 1.0 / raw.frame_rate {
        return Err(malformed(format!(
            "duration_s {} does not match {} frames at {} fps",
            raw.duration_s,
            frames.len(),
            raw.frame_rate
        )));
    }

    Ok(PoseSequence::from_parts(
        raw.source,
        raw.duration_s,
        raw.frame_rate,
        frames,
    ))
}
