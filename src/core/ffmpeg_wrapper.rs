//! FFmpeg wrapper providing a safe frame source around unsafe FFmpeg C bindings
//!
//! This module encapsulates all unsafe FFmpeg operations: demuxing with
//! libavformat, decoding with libavcodec and RGB24 conversion with libswscale.

use crate::core::frame_source::{sanitize_frame_rate, FrameSource};
use crate::models::frame::{PixelFormat, RawFrame};
use crate::models::pose::{PoseError, PoseResult};
use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::ptr;

// Import FFmpeg C bindings
use ffmpeg_sys_next::*;

const SWS_BILINEAR_FLAG: i32 = 2;

/// Safe wrapper around an FFmpeg demuxer + video decoder
pub struct FFmpegSource {
    path: PathBuf,
    format_context: *mut AVFormatContext,
    codec_context: *mut AVCodecContext,
    frame: *mut AVFrame,
    packet: *mut AVPacket,
    sws_context: *mut SwsContext,
    stream_index: i32,
    frame_rate: f64,
    next_index: u64,
    draining: bool,
    finished: bool,
}

// The raw pointers are owned exclusively by this struct and never shared.
unsafe impl Send for FFmpegSource {}

impl FFmpegSource {
    /// Open `path` and prepare a decoder for its best video stream
    pub fn open(path: &Path, fallback_fps: f64) -> PoseResult<Self> {
        let path_c = CString::new(path.to_string_lossy().as_bytes())
            .map_err(|_| unreadable(path, "path contains a NUL byte".to_string()))?;

        let mut source = Self {
            path: path.to_path_buf(),
            format_context: ptr::null_mut(),
            codec_context: ptr::null_mut(),
            frame: ptr::null_mut(),
            packet: ptr::null_mut(),
            sws_context: ptr::null_mut(),
            stream_index: -1,
            frame_rate: 0.0,
            next_index: 0,
            draining: false,
            finished: false,
        };

        // On any early return `source` is dropped and frees what was allocated so far.
        unsafe {
            let ret = avformat_open_input(
                &mut source.format_context,
                path_c.as_ptr(),
                ptr::null(),
                ptr::null_mut(),
            );
            if ret < 0 {
                return Err(unreadable(path, format!("avformat_open_input failed: {}", ret)));
            }

            let ret = avformat_find_stream_info(source.format_context, ptr::null_mut());
            if ret < 0 {
                return Err(unreadable(path, format!("no stream info: {}", ret)));
            }

            let stream_index = av_find_best_stream(
                source.format_context,
                AVMediaType::AVMEDIA_TYPE_VIDEO,
                -1,
                -1,
                ptr::null_mut(),
                0,
            );
            if stream_index < 0 {
                return Err(unreadable(path, "no video stream".to_string()));
            }
            source.stream_index = stream_index;

            let stream = *(*source.format_context).streams.offset(stream_index as isize);
            let codecpar = (*stream).codecpar;

            let codec = avcodec_find_decoder((*codecpar).codec_id);
            if codec.is_null() {
                return Err(unreadable(path, "no decoder for video codec".to_string()));
            }

            source.codec_context = avcodec_alloc_context3(codec);
            if source.codec_context.is_null() {
                return Err(unreadable(path, "failed to allocate codec context".to_string()));
            }

            if avcodec_parameters_to_context(source.codec_context, codecpar) < 0 {
                return Err(unreadable(path, "failed to copy codec parameters".to_string()));
            }

            let ret = avcodec_open2(source.codec_context, codec, ptr::null_mut());
            if ret < 0 {
                return Err(unreadable(path, format!("failed to open codec: {}", ret)));
            }

            source.frame = av_frame_alloc();
            source.packet = av_packet_alloc();
            if source.frame.is_null() || source.packet.is_null() {
                return Err(unreadable(path, "failed to allocate frame/packet".to_string()));
            }

            let rate = if (*stream).avg_frame_rate.den > 0 {
                (*stream).avg_frame_rate
            } else {
                (*stream).r_frame_rate
            };
            let reported = if rate.den > 0 {
                rate.num as f64 / rate.den as f64
            } else {
                0.0
            };
            source.frame_rate = sanitize_frame_rate(reported, fallback_fps);
        }

        Ok(source)
    }

    /// Convert the decoded frame in `self.frame` to packed RGB24.
    ///
    /// Size and pixel format are taken from the frame itself on every call,
    /// so a mid-stream resolution change rebuilds the scaler instead of
    /// writing past the output buffer.
    unsafe fn convert_current(&mut self) -> PoseResult<RawFrame> {
        let width = (*self.frame).width;
        let height = (*self.frame).height;
        let format = (*self.frame).format;

        let (buffer_len, linesize) = rgb24_layout(width, height).ok_or_else(|| {
            unreadable(
                &self.path,
                format!("invalid frame size {}x{} at frame {}", width, height, self.next_index),
            )
        })?;
        if format < 0 || format >= AVPixelFormat::AV_PIX_FMT_NB as i32 {
            return Err(unreadable(
                &self.path,
                format!("unknown pixel format {} at frame {}", format, self.next_index),
            ));
        }
        let src_format: AVPixelFormat = std::mem::transmute(format);

        self.sws_context = sws_getCachedContext(
            self.sws_context,
            width,
            height,
            src_format,
            width,
            height,
            AVPixelFormat::AV_PIX_FMT_RGB24,
            SWS_BILINEAR_FLAG,
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null(),
        );
        if self.sws_context.is_null() {
            return Err(unreadable(&self.path, "failed to initialize swscale".to_string()));
        }

        let mut data = vec![0u8; buffer_len];
        let dst_data: [*mut u8; 4] = [data.as_mut_ptr(), ptr::null_mut(), ptr::null_mut(), ptr::null_mut()];
        let dst_linesize: [i32; 4] = [linesize, 0, 0, 0];

        let ret = sws_scale(
            self.sws_context,
            (*self.frame).data.as_ptr() as *const *const u8,
            (*self.frame).linesize.as_ptr(),
            0,
            height,
            dst_data.as_ptr(),
            dst_linesize.as_ptr(),
        );
        if ret < 0 {
            return Err(unreadable(
                &self.path,
                format!("color conversion failed at frame {}", self.next_index),
            ));
        }

        let frame = RawFrame {
            frame_index: self.next_index,
            width: width as u32,
            height: height as u32,
            data,
            format: PixelFormat::RGB24,
        };
        self.next_index += 1;
        Ok(frame)
    }
}

/// Buffer length and row stride of a packed RGB24 image, both from the same dimensions
fn rgb24_layout(width: i32, height: i32) -> Option<(usize, i32)> {
    if width <= 0 || height <= 0 {
        return None;
    }
    let linesize = width.checked_mul(3)?;
    let len = (linesize as usize).checked_mul(height as usize)?;
    Some((len, linesize))
}

impl FrameSource for FFmpegSource {
    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn next_frame(&mut self) -> PoseResult<Option<RawFrame>> {
        if self.finished || self.format_context.is_null() {
            return Ok(None);
        }

        unsafe {
            loop {
                let ret = avcodec_receive_frame(self.codec_context, self.frame);
                if ret == 0 {
                    let frame = self.convert_current();
                    av_frame_unref(self.frame);
                    return frame.map(Some);
                }
                if ret == AVERROR_EOF {
                    self.finished = true;
                    return Ok(None);
                }
                if ret != AVERROR(EAGAIN) {
                    return Err(unreadable(
                        &self.path,
                        format!("decode failed at frame {}: {}", self.next_index, ret),
                    ));
                }
                if self.draining {
                    self.finished = true;
                    return Ok(None);
                }

                // Decoder needs more input
                if av_read_frame(self.format_context, self.packet) < 0 {
                    avcodec_send_packet(self.codec_context, ptr::null());
                    self.draining = true;
                    continue;
                }

                if (*self.packet).stream_index == self.stream_index {
                    let ret = avcodec_send_packet(self.codec_context, self.packet);
                    av_packet_unref(self.packet);
                    if ret < 0 && ret != AVERROR(EAGAIN) {
                        return Err(unreadable(
                            &self.path,
                            format!("send packet failed near frame {}: {}", self.next_index, ret),
                        ));
                    }
                } else {
                    av_packet_unref(self.packet);
                }
            }
        }
    }

    fn close(&mut self) {
        unsafe {
            // Clean up resources in reverse order; the free functions null the pointers
            if !self.sws_context.is_null() {
                sws_freeContext(self.sws_context);
                self.sws_context = ptr::null_mut();
            }

            if !self.packet.is_null() {
                av_packet_free(&mut self.packet);
            }

            if !self.frame.is_null() {
                av_frame_free(&mut self.frame);
            }

            if !self.codec_context.is_null() {
                avcodec_free_context(&mut self.codec_context);
            }

            if !self.format_context.is_null() {
                avformat_close_input(&mut self.format_context);
            }
        }
        self.finished = true;
    }

    fn describe(&self) -> String {
        format!("ffmpeg {}", self.path.display())
    }
}

impl Drop for FFmpegSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn unreadable(path: &Path, reason: String) -> PoseError {
    PoseError::UnreadableContainer {
        path: path.to_path_buf(),
        reason,
    }
}
