// YUV4MPEG2 (.y4m) frame source: the `y4m` crate demuxes, frames are converted to RGB24 here

use crate::core::frame_source::{sanitize_frame_rate, FrameSource};
use crate::models::frame::{PixelFormat, RawFrame};
use crate::models::pose::{PoseError, PoseResult};
use std::fs::File;
use std::io::{BufRead, BufReader, Chain, Cursor, ErrorKind, Read};
use std::path::{Path, PathBuf};
use y4m::Colorspace;

/// Largest accepted frame edge, in pixels
pub const MAX_DIMENSION: usize = 16384;

/// Upper bound for one planar frame (4:4:4 at the largest accepted size)
const MAX_FRAME_BYTES: usize = MAX_DIMENSION * MAX_DIMENSION * 3;

const MAX_HEADER_BYTES: u64 = 4096;

type HeaderedReader = Chain<Cursor<Vec<u8>>, BufReader<File>>;

/// Chroma subsampling of the 8-bit colorspaces we convert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chroma {
    C420,
    C422,
    C444,
    Mono,
}

impl Chroma {
    fn from_colorspace(colorspace: Colorspace) -> Option<Self> {
        match colorspace {
            Colorspace::C420 | Colorspace::C420jpeg | Colorspace::C420paldv | Colorspace::C420mpeg2 => {
                Some(Chroma::C420)
            }
            Colorspace::C422 => Some(Chroma::C422),
            Colorspace::C444 => Some(Chroma::C444),
            Colorspace::Cmono => Some(Chroma::Mono),
            _ => None,
        }
    }

    /// Index into the chroma planes for the luma sample at (row, col)
    fn chroma_index(self, width: usize, row: usize, col: usize) -> Option<usize> {
        match self {
            Chroma::C420 => Some((row / 2) * width.div_ceil(2) + col / 2),
            Chroma::C422 => Some(row * width.div_ceil(2) + col / 2),
            Chroma::C444 => Some(row * width + col),
            Chroma::Mono => None,
        }
    }
}

/// Frame source reading a `.y4m` file and converting each frame to RGB24
pub struct Y4mSource {
    path: PathBuf,
    decoder: Option<y4m::Decoder<HeaderedReader>>,
    width: usize,
    height: usize,
    chroma: Chroma,
    frame_rate: f64,
    next_index: u64,
}

impl Y4mSource {
    pub fn open(path: &Path, fallback_fps: f64) -> PoseResult<Self> {
        let file = File::open(path).map_err(|e| open_error(path, e))?;
        let mut reader = BufReader::new(file);

        let mut header = Vec::new();
        (&mut reader)
            .take(MAX_HEADER_BYTES)
            .read_until(b'\n', &mut header)
            .map_err(|e| unreadable(path, format!("cannot read header: {}", e)))?;
        if header.last() != Some(&b'\n') {
            return Err(unreadable(path, "missing or unterminated stream header".to_string()));
        }
        check_dimensions(&header).map_err(|reason| unreadable(path, reason))?;

        let decoder = y4m::Decoder::new_with_limits(
            Cursor::new(header).chain(reader),
            y4m::Limits {
                bytes: MAX_FRAME_BYTES,
            },
        )
        .map_err(|e| unreadable(path, format!("invalid y4m stream: {:?}", e)))?;

        let colorspace = decoder.get_colorspace();
        let chroma = Chroma::from_colorspace(colorspace)
            .ok_or_else(|| unreadable(path, format!("unsupported colorspace {:?}", colorspace)))?;

        let rate = decoder.get_framerate();
        let reported = if rate.den > 0 {
            rate.num as f64 / rate.den as f64
        } else {
            0.0
        };

        Ok(Self {
            path: path.to_path_buf(),
            width: decoder.get_width(),
            height: decoder.get_height(),
            decoder: Some(decoder),
            chroma,
            frame_rate: sanitize_frame_rate(reported, fallback_fps),
            next_index: 0,
        })
    }
}

/// Reject frame sizes outside `1..=MAX_DIMENSION` before the decoder sizes its buffers
fn check_dimensions(header: &[u8]) -> Result<(), String> {
    for token in header.split(|b| b.is_ascii_whitespace()) {
        let (name, value) = match token.split_first() {
            Some((&b'W', value)) => ("width", value),
            Some((&b'H', value)) => ("height", value),
            _ => continue,
        };
        let parsed = std::str::from_utf8(value)
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| (1..=MAX_DIMENSION).contains(v));
        if parsed.is_none() {
            return Err(format!(
                "frame {} '{}' outside 1..={}",
                name,
                String::from_utf8_lossy(value),
                MAX_DIMENSION
            ));
        }
    }
    Ok(())
}

/// Planar YUV to packed RGB24, BT.601 full range
fn yuv_to_rgb(y_plane: &[u8], u_plane: &[u8], v_plane: &[u8], width: usize, height: usize, chroma: Chroma) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(width * height * 3);
    for row in 0..height {
        for col in 0..width {
            let y_val = y_plane[row * width + col] as f32;
            let (u_val, v_val) = match chroma.chroma_index(width, row, col) {
                Some(i) => (u_plane[i] as f32 - 128.0, v_plane[i] as f32 - 128.0),
                None => (0.0, 0.0),
            };

            rgb.push((y_val + 1.402 * v_val).clamp(0.0, 255.0) as u8);
            rgb.push((y_val - 0.344136 * u_val - 0.714136 * v_val).clamp(0.0, 255.0) as u8);
            rgb.push((y_val + 1.772 * u_val).clamp(0.0, 255.0) as u8);
        }
    }
    rgb
}

impl FrameSource for Y4mSource {
    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn next_frame(&mut self) -> PoseResult<Option<RawFrame>> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(None);
        };

        let (width, height, chroma) = (self.width, self.height, self.chroma);
        let decoded = match decoder.read_frame() {
            Ok(frame) => Ok(Some(yuv_to_rgb(
                frame.get_y_plane(),
                frame.get_u_plane(),
                frame.get_v_plane(),
                width,
                height,
                chroma,
            ))),
            Err(y4m::Error::EOF) => Ok(None),
            Err(e) => Err(format!("frame {}: {:?}", self.next_index, e)),
        };

        let data = match decoded {
            Ok(Some(data)) => data,
            Ok(None) => {
                self.close();
                return Ok(None);
            }
            Err(reason) => return Err(unreadable(&self.path, reason)),
        };

        let frame = RawFrame {
            frame_index: self.next_index,
            width: width as u32,
            height: height as u32,
            data,
            format: PixelFormat::RGB24,
        };
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        self.decoder = None;
    }

    fn describe(&self) -> String {
        format!("y4m {} ({}x{})", self.path.display(), self.width, self.height)
    }
}

impl Drop for Y4mSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_error(path: &Path, e: std::io::Error) -> PoseError {
    if e.kind() == ErrorKind::NotFound {
        PoseError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        unreadable(path, e.to_string())
    }
}

fn unreadable(path: &Path, reason: String) -> PoseError {
    PoseError::UnreadableContainer {
        path: path.to_path_buf(),
        reason,
    }
}
