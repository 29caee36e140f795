use crate::core::config::ExtractionConfig;
use crate::core::landmark_provider::LandmarkProvider;
use crate::models::frame::RawFrame;
use crate::models::pose::{Keypoint, PoseResult};
use crate::platform::pose::{DefaultMediaPipe, ModelLandmark, PoseModel};
use tracing::{debug, warn};

// ==============================================================================
// Detector Backend
// ==============================================================================

/// Landmark provider backed by a real pose model.
///
/// Frames are fed one at a time. After a frame with a detection the backend
/// is "tracking" and the next frame is gated by `min_tracking_confidence`;
/// otherwise `min_detection_confidence` applies.
pub struct DetectorBackend {
    model: Box<dyn PoseModel>,
    num_keypoints: usize,
    min_detection_confidence: f32,
    min_tracking_confidence: f32,
    tracking: bool,
}

impl DetectorBackend {
    /// Load the compiled-in model. Fails with `DetectorUnavailable` if it can't be initialized.
    pub fn new(config: &ExtractionConfig) -> PoseResult<Self> {
        config.validate()?;
        let model = DefaultMediaPipe::load(config)?;
        Ok(Self::with_model(Box::new(model), config))
    }

    /// Wrap an already loaded model
    pub fn with_model(model: Box<dyn PoseModel>, config: &ExtractionConfig) -> Self {
        Self {
            model,
            num_keypoints: config.num_keypoints,
            min_detection_confidence: config.min_detection_confidence,
            min_tracking_confidence: config.min_tracking_confidence,
            tracking: false,
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    fn threshold(&self) -> f32 {
        if self.tracking {
            self.min_tracking_confidence
        } else {
            self.min_detection_confidence
        }
    }
}

impl LandmarkProvider for DetectorBackend {
    fn process(&mut self, frame: &RawFrame, _frame_rate: f64) -> Vec<Keypoint> {
        if !frame.is_complete() {
            warn!(frame = frame.frame_index, "frame buffer size mismatch, skipping detection");
            self.tracking = false;
            return vec![];
        }

        let threshold = self.threshold();
        let rgb = frame.to_rgb();

        match self.model.infer(&rgb, frame.width, frame.height, threshold) {
            Ok(Some(points)) => {
                self.tracking = true;
                normalize_landmarks(&points, self.num_keypoints)
            }
            Ok(None) => {
                debug!(frame = frame.frame_index, "no pose detected");
                self.tracking = false;
                vec![]
            }
            Err(e) => {
                warn!(frame = frame.frame_index, error = %e, "landmark inference failed, keeping empty frame");
                self.tracking = false;
                vec![]
            }
        }
    }

    fn name(&self) -> String {
        format!("detector: {}", self.model.model_info())
    }
}

/// Map raw model output onto the fixed keypoint schema.
///
/// Ids follow model order and stop at `num_keypoints`. `x`, `y` and
/// `visibility` are clamped to [0, 1]; a missing `z` becomes 0.0 and a missing
/// `visibility` 1.0. Landmarks with non-finite positions are dropped.
pub fn normalize_landmarks(points: &[ModelLandmark], num_keypoints: usize) -> Vec<Keypoint> {
    points
        .iter()
        .take(num_keypoints)
        .enumerate()
        .filter(|(_, p)| p.x.is_finite() && p.y.is_finite())
        .map(|(id, p)| {
            let z = p.z.filter(|z| z.is_finite()).unwrap_or(0.0);
            let visibility = match p.visibility {
                Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
                Some(_) => 0.0,
                None => 1.0,
            };
            Keypoint::new(
                id as u32,
                (p.x as f64).clamp(0.0, 1.0),
                (p.y as f64).clamp(0.0, 1.0),
                z as f64,
                visibility as f64,
            )
        })
        .collect()
}
