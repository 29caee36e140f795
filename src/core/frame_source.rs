//! Frame sources: open a video container and hand out decoded frames in order.
//!
//! Every source owns its decoder resources. `close` releases them and is
//! idempotent; each implementation also calls it from `Drop`, so a source
//! dropped on an error path or after an early stop never leaks.

use crate::core::config::ExtractionConfig;
use crate::core::image_sequence::ImageSequenceSource;
use crate::core::y4m::Y4mSource;
use crate::models::frame::RawFrame;
use crate::models::pose::{PoseError, PoseResult, DEFAULT_FRAME_RATE};
use std::path::Path;
use tracing::debug;

/// A decoded, forward-only stream of video frames
pub trait FrameSource: Send {
    /// Frames per second, fixed at open time
    fn frame_rate(&self) -> f64;

    /// Decode the next frame. `Ok(None)` marks the end of the stream.
    fn next_frame(&mut self) -> PoseResult<Option<RawFrame>>;

    /// Release decoder resources. Safe to call more than once.
    fn close(&mut self);

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Iterator over the remaining frames of a source.
///
/// Stops after the first error; the stream cannot be restarted.
pub struct Frames<'a> {
    source: &'a mut dyn FrameSource,
    done: bool,
}

impl Iterator for Frames<'_> {
    type Item = PoseResult<RawFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.source.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

pub fn frames(source: &mut dyn FrameSource) -> Frames<'_> {
    Frames {
        source,
        done: false,
    }
}

/// Replace a missing, zero, negative or non-finite rate with `fallback`
pub fn sanitize_frame_rate(reported: f64, fallback: f64) -> f64 {
    if reported.is_finite() && reported > 0.0 {
        reported
    } else if fallback.is_finite() && fallback > 0.0 {
        fallback
    } else {
        DEFAULT_FRAME_RATE
    }
}

/// Open `path` with the decoder matching its container.
///
/// Directories are image sequences, `.y4m` files use the built-in demuxer and
/// everything else goes to FFmpeg when the `ffmpeg` feature is enabled.
pub fn open_source(path: &Path, config: &ExtractionConfig) -> PoseResult<Box<dyn FrameSource>> {
    if !path.exists() {
        return Err(PoseError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let source: Box<dyn FrameSource> = if path.is_dir() {
        Box::new(ImageSequenceSource::open(path, config.image_sequence_fps)?)
    } else if extension.as_deref() == Some("y4m") {
        Box::new(Y4mSource::open(path, config.default_frame_rate)?)
    } else {
        open_with_ffmpeg(path, config)?
    };

    debug!(source = %source.describe(), fps = source.frame_rate(), "opened frame source");
    Ok(source)
}

#[cfg(feature = "ffmpeg")]
fn open_with_ffmpeg(path: &Path, config: &ExtractionConfig) -> PoseResult<Box<dyn FrameSource>> {
    let source = crate::core::ffmpeg_wrapper::FFmpegSource::open(path, config.default_frame_rate)?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "ffmpeg"))]
fn open_with_ffmpeg(path: &Path, _config: &ExtractionConfig) -> PoseResult<Box<dyn FrameSource>> {
    Err(PoseError::UnreadableContainer {
        path: path.to_path_buf(),
        reason: "no decoder for this container (build with the 'ffmpeg' feature, or use .y4m or an image directory)"
            .to_string(),
    })
}
