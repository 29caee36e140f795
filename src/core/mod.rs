pub mod config;

// Frame decoding
pub mod frame_source;
pub mod image_sequence;
pub mod y4m;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg_wrapper;

// Landmark providers
pub mod landmark_provider;
pub mod pose_detector;
pub mod synthetic;

// Sequence assembly, storage and orchestration
pub mod batch;
pub mod pipeline;
pub mod sequence_builder;
pub mod sequence_codec;
