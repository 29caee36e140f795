// Deterministic synthetic landmarks for running the pipeline without a model

use crate::core::landmark_provider::LandmarkProvider;
use crate::models::frame::RawFrame;
use crate::models::pose::Keypoint;
use std::f64::consts::TAU;

/// Closed-form periodic motion: every landmark circles the frame center with
/// a phase offset of `id / num_keypoints` of a turn and a vertical amplitude
/// scaled by `id % 5`.
///
/// Output depends only on `(frame_index, frame_rate, id)`, so repeated runs
/// are bit-identical.
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    num_keypoints: usize,
}

impl SyntheticBackend {
    pub fn new(num_keypoints: usize) -> Self {
        Self { num_keypoints }
    }

    /// Exactly `num_keypoints` landmarks for the frame at `frame_index`
    pub fn generate(&self, frame_index: u64, frame_rate: f64) -> Vec<Keypoint> {
        let t = frame_index as f64 / frame_rate.max(1.0);
        let n = self.num_keypoints as f64;

        (0..self.num_keypoints)
            .map(|k| {
                let angle = (k as f64 / n) * TAU + t * 2.0;
                let x = 0.5 + 0.25 * angle.cos();
                let y = 0.5 + 0.25 * angle.sin() * ((k % 5) as f64 / 4.0);
                let z = 0.05 * (angle * 0.5).sin();
                Keypoint::new(k as u32, x.clamp(0.0, 1.0), y.clamp(0.0, 1.0), z, 1.0)
            })
            .collect()
    }
}

impl LandmarkProvider for SyntheticBackend {
    fn process(&mut self, frame: &RawFrame, frame_rate: f64) -> Vec<Keypoint> {
        self.generate(frame.frame_index, frame_rate)
    }

    fn name(&self) -> String {
        format!("synthetic ({} keypoints)", self.num_keypoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pose::{check_landmarks, NUM_KEYPOINTS};

    #[test]
    fn test_exact_keypoint_count_and_ids() {
        let backend = SyntheticBackend::new(NUM_KEYPOINTS);
        let landmarks = backend.generate(12, 30.0);
        assert_eq!(landmarks.len(), NUM_KEYPOINTS);
        for (i, kp) in landmarks.iter().enumerate() {
            assert_eq!(kp.id as usize, i);
            assert_eq!(kp.visibility, 1.0);
        }
        assert!(check_landmarks(&landmarks, NUM_KEYPOINTS).is_ok());
    }

    #[test]
    fn test_bit_identical_across_calls() {
        let a = SyntheticBackend::new(NUM_KEYPOINTS);
        let b = SyntheticBackend::new(NUM_KEYPOINTS);
        for frame_index in [0, 1, 29, 30, 1_000, 123_456] {
            for fps in [24.0, 29.97, 30.0, 60.0] {
                let left = a.generate(frame_index, fps);
                let right = b.generate(frame_index, fps);
                for (l, r) in left.iter().zip(&right) {
                    assert_eq!(l.x.to_bits(), r.x.to_bits());
                    assert_eq!(l.y.to_bits(), r.y.to_bits());
                    assert_eq!(l.z.to_bits(), r.z.to_bits());
                }
            }
        }
    }

    #[test]
    fn test_coordinates_stay_in_unit_square() {
        let backend = SyntheticBackend::new(NUM_KEYPOINTS);
        for frame_index in 0..500 {
            for kp in backend.generate(frame_index, 30.0) {
                assert!((0.0..=1.0).contains(&kp.x), "x out of range: {}", kp.x);
                assert!((0.0..=1.0).contains(&kp.y), "y out of range: {}", kp.y);
            }
        }
    }

    #[test]
    fn test_landmarks_trace_distinct_paths() {
        let backend = SyntheticBackend::new(NUM_KEYPOINTS);
        let frame = backend.generate(45, 30.0);
        for i in 0..frame.len() {
            for j in (i + 1)..frame.len() {
                let same = frame[i].x == frame[j].x && frame[i].y == frame[j].y;
                assert!(!same, "landmarks {} and {} coincide", i, j);
            }
        }
    }

    #[test]
    fn test_motion_between_frames() {
        let backend = SyntheticBackend::new(NUM_KEYPOINTS);
        let first = backend.generate(0, 30.0);
        let later = backend.generate(15, 30.0);
        assert_ne!(first[0].x, later[0].x);
    }

    #[test]
    fn test_known_values_at_origin() {
        let backend = SyntheticBackend::new(NUM_KEYPOINTS);
        let kp = backend.generate(0, 30.0)[0];
        assert_eq!(kp.x, 0.75);
        assert_eq!(kp.y, 0.5);
        assert_eq!(kp.z, 0.0);
    }

    #[test]
    fn test_low_frame_rate_clamped() {
        let backend = SyntheticBackend::new(4);
        assert_eq!(backend.generate(3, 0.5), backend.generate(3, 1.0));
    }
}
