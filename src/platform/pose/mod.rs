// Pose estimation platform integration
// Provides the MediaPipe model bridge used by the detector backend

pub mod mediapipe_bridge;

pub use mediapipe_bridge::{DefaultMediaPipe, ModelLandmark, PoseModel};
