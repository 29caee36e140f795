// Landmark providers: turn one decoded frame into pose keypoints

use crate::core::config::{BackendKind, ExtractionConfig};
use crate::core::pose_detector::DetectorBackend;
use crate::core::synthetic::SyntheticBackend;
use crate::models::frame::RawFrame;
use crate::models::pose::{Keypoint, PoseResult};
use tracing::{info, warn};

/// Per-frame landmark capability.
///
/// One instance serves one extraction run and sees its frames strictly in
/// order, so implementations may keep tracking state between calls. A frame
/// where nothing is detected yields an empty list; it is never an error.
pub trait LandmarkProvider: Send {
    fn process(&mut self, frame: &RawFrame, frame_rate: f64) -> Vec<Keypoint>;

    /// Backend name for logs and summaries
    fn name(&self) -> String;
}

/// Build the provider selected by `config.backend`.
///
/// `Detector` surfaces `DetectorUnavailable` when the model can't be loaded;
/// `Auto` logs the failure and falls back to the synthetic backend.
pub fn build_provider(config: &ExtractionConfig) -> PoseResult<Box<dyn LandmarkProvider>> {
    let provider: Box<dyn LandmarkProvider> = match config.backend {
        BackendKind::Synthetic => Box::new(SyntheticBackend::new(config.num_keypoints)),
        BackendKind::Detector => Box::new(DetectorBackend::new(config)?),
        BackendKind::Auto => match DetectorBackend::new(config) {
            Ok(detector) => Box::new(detector),
            Err(e) => {
                warn!(error = %e, "pose detector unavailable, using synthetic landmarks");
                Box::new(SyntheticBackend::new(config.num_keypoints))
            }
        },
    };

    info!(backend = %provider.name(), "landmark provider ready");
    Ok(provider)
}
