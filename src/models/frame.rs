// Data structures for decoded video frames

use std::borrow::Cow;

/// A decoded frame handed from a frame source to a landmark provider
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub frame_index: u64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub format: PixelFormat,
}

/// Pixel layout of `RawFrame::data`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    RGB24,
    RGBA8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::RGB24 => 3,
            PixelFormat::RGBA8 => 4,
        }
    }
}

impl RawFrame {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether `data` holds exactly one full image in `format`
    pub fn is_complete(&self) -> bool {
        self.data.len() == self.pixel_count() * self.format.bytes_per_pixel()
    }

    /// Packed RGB24 view of the frame, converting only when needed
    pub fn to_rgb(&self) -> Cow<'_, [u8]> {
        match self.format {
            PixelFormat::RGB24 => Cow::Borrowed(&self.data),
            PixelFormat::RGBA8 => Cow::Owned(
                self.data
                    .chunks_exact(4)
                    .flat_map(|px| [px[0], px[1], px[2]])
                    .collect(),
            ),
        }
    }
}
