// MediaPipe integration bridge
// Provides an abstraction over the MediaPipe Pose landmark model
// Can be implemented using PyO3 (Python) or ONNX Runtime (Rust native)

use crate::core::config::ExtractionConfig;
use crate::models::pose::PoseResult;
#[cfg(not(any(feature = "ml-pyo3", feature = "ml-onnx")))]
use crate::models::pose::PoseError;

/// One landmark as reported by the model, before normalization.
/// `z` and `visibility` are `None` when the model does not supply them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelLandmark {
    pub x: f32,
    pub y: f32,
    pub z: Option<f32>,
    pub visibility: Option<f32>,
}

/// MediaPipe bridge trait
/// Implement this for PyO3 or ONNX backends
pub trait PoseModel: Send {
    /// Load the model. Fails with `DetectorUnavailable` when it can't be initialized.
    fn load(config: &ExtractionConfig) -> PoseResult<Self>
    where
        Self: Sized;

    /// Run inference on one packed RGB24 frame.
    /// `Ok(None)` means no pose scored above `min_confidence`.
    fn infer(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
        min_confidence: f32,
    ) -> Result<Option<Vec<ModelLandmark>>, String>;

    /// Get model info
    fn model_info(&self) -> String;
}

// ==============================================================================
// PyO3 Implementation (Python MediaPipe)
// ==============================================================================

#[cfg(feature = "ml-pyo3")]
pub mod pyo3_backend {
    use super::*;
    use crate::models::pose::PoseError;
    use pyo3::prelude::*;
    use pyo3::types::{PyBytes, PyModule};
    use tracing::info;

    const TRACKER_SOURCE: &str = r#"
import mediapipe as mp
import numpy as np

if not (hasattr(mp, "solutions") and hasattr(mp.solutions, "pose")):
    raise ImportError("installed mediapipe lacks the solutions.pose API")


class Tracker:
    def __init__(self, model_complexity, min_detection_confidence, min_tracking_confidence):
        self._pose = mp.solutions.pose.Pose(
            static_image_mode=False,
            model_complexity=model_complexity,
            min_detection_confidence=min_detection_confidence,
            min_tracking_confidence=min_tracking_confidence,
        )

    def process(self, rgb, width, height):
        image = np.frombuffer(rgb, dtype=np.uint8).reshape((height, width, 3))
        results = self._pose.process(image)
        if not results.pose_landmarks:
            return None
        return [
            (float(lm.x), float(lm.y), getattr(lm, "z", None), getattr(lm, "visibility", None))
            for lm in results.pose_landmarks.landmark
        ]

    def close(self):
        self._pose.close()
"#;

    pub struct PyO3MediaPipe {
        tracker: Py<PyAny>,
        model_complexity: u8,
    }

    impl PoseModel for PyO3MediaPipe {
        fn load(config: &ExtractionConfig) -> PoseResult<Self> {
            let model_complexity = config.model_complexity as u8;

            Python::with_gil(|py| {
                let module = PyModule::from_code_bound(
                    py,
                    TRACKER_SOURCE,
                    "dance_pose_tracker.py",
                    "dance_pose_tracker",
                )
                .map_err(|e| {
                    PoseError::DetectorUnavailable(format!(
                        "Failed to import MediaPipe: {}. Install it with `pip install mediapipe numpy`",
                        e
                    ))
                })?;

                let tracker = module
                    .getattr("Tracker")
                    .and_then(|cls| {
                        cls.call1((
                            model_complexity,
                            config.min_detection_confidence,
                            config.min_tracking_confidence,
                        ))
                    })
                    .map_err(|e| {
                        PoseError::DetectorUnavailable(format!(
                            "Failed to create MediaPipe Pose: {}",
                            e
                        ))
                    })?;

                info!(model_complexity, "PyO3 MediaPipe initialized");

                Ok(Self {
                    tracker: tracker.unbind(),
                    model_complexity,
                })
            })
        }

        fn infer(
            &mut self,
            rgb: &[u8],
            width: u32,
            height: u32,
            _min_confidence: f32,
        ) -> Result<Option<Vec<ModelLandmark>>, String> {
            // MediaPipe applies its own detection/tracking thresholds
            Python::with_gil(|py| {
                let result = self
                    .tracker
                    .bind(py)
                    .call_method1("process", (PyBytes::new_bound(py, rgb), width, height))
                    .map_err(|e| format!("MediaPipe inference failed: {}", e))?;

                if result.is_none() {
                    return Ok(None);
                }

                let points: Vec<(f32, f32, Option<f32>, Option<f32>)> = result
                    .extract()
                    .map_err(|e| format!("Unexpected MediaPipe result: {}", e))?;

                Ok(Some(
                    points
                        .into_iter()
                        .map(|(x, y, z, visibility)| ModelLandmark {
                            x,
                            y,
                            z,
                            visibility,
                        })
                        .collect(),
                ))
            })
        }

        fn model_info(&self) -> String {
            format!(
                "PyO3 MediaPipe Pose (complexity {})",
                self.model_complexity
            )
        }
    }

    impl Drop for PyO3MediaPipe {
        fn drop(&mut self) {
            Python::with_gil(|py| {
                let _ = self.tracker.bind(py).call_method0("close");
            });
        }
    }
}

// ==============================================================================
// ONNX Runtime Implementation (Pure Rust)
// ==============================================================================

#[cfg(feature = "ml-onnx")]
pub mod onnx_backend {
    use super::*;
    use crate::models::pose::{PoseError, NUM_KEYPOINTS};
    use image::imageops::FilterType;
    use ort::session::Session;
    use ort::value::Tensor;
    use std::path::PathBuf;
    use tracing::info;

    /// Square input edge of the MediaPipe pose landmark model
    const INPUT_SIZE: u32 = 256;
    /// x, y, z, visibility logit, presence logit
    const VALUES_PER_LANDMARK: usize = 5;

    pub struct OnnxMediaPipe {
        session: Session,
        model_path: PathBuf,
    }

    fn sigmoid(v: f32) -> f32 {
        1.0 / (1.0 + (-v).exp())
    }

    impl PoseModel for OnnxMediaPipe {
        fn load(config: &ExtractionConfig) -> PoseResult<Self> {
            let model_path = config.model_path.clone().ok_or_else(|| {
                PoseError::DetectorUnavailable(
                    "model_path is not set; point it at a pose_landmark ONNX file".to_string(),
                )
            })?;

            if !model_path.exists() {
                return Err(PoseError::DetectorUnavailable(format!(
                    "ONNX model not found at {}",
                    model_path.display()
                )));
            }

            let session = Session::builder()
                .and_then(|builder| builder.commit_from_file(&model_path))
                .map_err(|e| {
                    PoseError::DetectorUnavailable(format!(
                        "Failed to load {}: {}",
                        model_path.display(),
                        e
                    ))
                })?;

            info!(model = %model_path.display(), "ONNX pose landmark model loaded");
            Ok(Self {
                session,
                model_path,
            })
        }

        fn infer(
            &mut self,
            rgb: &[u8],
            width: u32,
            height: u32,
            min_confidence: f32,
        ) -> Result<Option<Vec<ModelLandmark>>, String> {
            // 1. Preprocess frame (resize to 256x256, scale to [0, 1], NHWC)
            let frame = image::RgbImage::from_raw(width, height, rgb.to_vec())
                .ok_or_else(|| "frame buffer does not match its dimensions".to_string())?;
            let resized = image::imageops::resize(&frame, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
            let input: Vec<f32> = resized
                .into_raw()
                .into_iter()
                .map(|v| v as f32 / 255.0)
                .collect();
            let side = INPUT_SIZE as usize;
            let tensor = Tensor::from_array(([1usize, side, side, 3], input))
                .map_err(|e| e.to_string())?;

            // 2. Run the session
            let outputs = self
                .session
                .run(ort::inputs![tensor])
                .map_err(|e| format!("ONNX inference failed: {}", e))?;

            // 3. Presence gate
            let (_, presence) = outputs[1]
                .try_extract_tensor::<f32>()
                .map_err(|e| e.to_string())?;
            let score = presence.first().copied().unwrap_or(0.0);
            if score < min_confidence {
                return Ok(None);
            }

            // 4. Landmarks in input-pixel space to normalized coordinates
            let (_, raw) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| e.to_string())?;
            let scale = INPUT_SIZE as f32;
            let landmarks = raw
                .chunks_exact(VALUES_PER_LANDMARK)
                .take(NUM_KEYPOINTS)
                .map(|v| ModelLandmark {
                    x: v[0] / scale,
                    y: v[1] / scale,
                    z: Some(v[2] / scale),
                    visibility: Some(sigmoid(v[3])),
                })
                .collect();

            Ok(Some(landmarks))
        }

        fn model_info(&self) -> String {
            format!("ONNX Runtime MediaPipe Pose ({})", self.model_path.display())
        }
    }
}

// ==============================================================================
// Unavailable Implementation (for compilation without features)
// ==============================================================================

#[cfg(not(any(feature = "ml-pyo3", feature = "ml-onnx")))]
pub struct UnavailableMediaPipe;

#[cfg(not(any(feature = "ml-pyo3", feature = "ml-onnx")))]
impl PoseModel for UnavailableMediaPipe {
    fn load(_config: &ExtractionConfig) -> PoseResult<Self> {
        Err(PoseError::DetectorUnavailable(
            "built without a pose model backend (enable the 'ml-pyo3' or 'ml-onnx' feature)"
                .to_string(),
        ))
    }

    fn infer(
        &mut self,
        _rgb: &[u8],
        _width: u32,
        _height: u32,
        _min_confidence: f32,
    ) -> Result<Option<Vec<ModelLandmark>>, String> {
        Ok(None)
    }

    fn model_info(&self) -> String {
        "no pose model (enable 'ml-pyo3' or 'ml-onnx')".to_string()
    }
}

// ==============================================================================
// Default Backend Selection
// ==============================================================================

#[cfg(feature = "ml-pyo3")]
pub type DefaultMediaPipe = pyo3_backend::PyO3MediaPipe;

#[cfg(all(feature = "ml-onnx", not(feature = "ml-pyo3")))]
pub type DefaultMediaPipe = onnx_backend::OnnxMediaPipe;

#[cfg(not(any(feature = "ml-pyo3", feature = "ml-onnx")))]
pub type DefaultMediaPipe = UnavailableMediaPipe;
