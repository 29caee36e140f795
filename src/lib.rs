pub mod core;
pub mod models;
pub mod platform;

pub use crate::core::batch::{extract_batch, extract_batch_with_cancel, ExtractionJob};
pub use crate::core::config::{BackendKind, ExtractionConfig, ModelComplexity};
pub use crate::core::frame_source::{open_source, FrameSource};
pub use crate::core::landmark_provider::{build_provider, LandmarkProvider};
pub use crate::core::pipeline::{ExtractionPipeline, PipelineState};
pub use crate::core::sequence_builder::PoseSequenceBuilder;
pub use crate::core::sequence_codec::{decode, decode_with, encode, encode_compact};
pub use crate::models::pose::{
    BodyLandmark, ExtractionSummary, Keypoint, PoseError, PoseFrame, PoseResult, PoseSequence,
    DEFAULT_FRAME_RATE, NUM_KEYPOINTS,
};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global `tracing` subscriber.
///
/// Filtering follows `RUST_LOG` and defaults to `info`. Calling it again
/// (or after another subscriber was installed) is a no-op.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
