// Image-sequence source: a directory of still frames played back at a fixed rate

use crate::core::frame_source::{sanitize_frame_rate, FrameSource};
use crate::models::frame::{PixelFormat, RawFrame};
use crate::models::pose::{PoseError, PoseResult, DEFAULT_FRAME_RATE};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Frames are the directory's image files in file-name order
pub struct ImageSequenceSource {
    dir: PathBuf,
    pending: VecDeque<PathBuf>,
    frame_rate: f64,
    next_index: u64,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path, fps: f64) -> PoseResult<Self> {
        let entries = std::fs::read_dir(dir).map_err(|e| PoseError::UnreadableContainer {
            path: dir.to_path_buf(),
            reason: format!("cannot list directory: {}", e),
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(PoseError::UnreadableContainer {
                path: dir.to_path_buf(),
                reason: "directory contains no image frames".to_string(),
            });
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            pending: files.into(),
            frame_rate: sanitize_frame_rate(fps, DEFAULT_FRAME_RATE),
            next_index: 0,
        })
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn next_frame(&mut self) -> PoseResult<Option<RawFrame>> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };

        let image = image::open(&path).map_err(|e| PoseError::UnreadableContainer {
            path: path.clone(),
            reason: format!("frame {}: {}", self.next_index, e),
        })?;
        let (width, height) = (image.width(), image.height());

        // Alpha is kept as-is and dropped later by `RawFrame::to_rgb`
        let (data, format) = if image.color().has_alpha() {
            (image.to_rgba8().into_raw(), PixelFormat::RGBA8)
        } else {
            (image.to_rgb8().into_raw(), PixelFormat::RGB24)
        };

        let frame = RawFrame {
            frame_index: self.next_index,
            width,
            height,
            data,
            format,
        };
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        self.pending.clear();
    }

    fn describe(&self) -> String {
        format!("image sequence {}", self.dir.display())
    }
}

impl Drop for ImageSequenceSource {
    fn drop(&mut self) {
        self.close();
    }
}
