//! FFmpeg video encoder (rsmpeg).
//!
//! Accepts packed RGB frames and encodes them as YUV 4:2:0.

use super::{check_frame_size, FrameSink, SinkError};
use crate::config::VisualConfig;
use rsmpeg::{
    avcodec::{AVCodec, AVCodecContext},
    avformat::AVFormatContextOutput,
    avutil::{AVFrame, AVRational},
    error::RsmpegError,
    ffi,
};
use serde::{Deserialize, Serialize};
use std::ffi::CString;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    /// H.264 in MP4.
    #[default]
    H264,
    /// VP9, usually in WebM.
    Vp9,
}

impl VideoCodec {
    fn encoder_name(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "libx264",
            VideoCodec::Vp9 => "libvpx-vp9",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoConfig {
    /// Bits per second.
    pub bitrate: u64,
    /// Constant rate factor; `None` encodes at `bitrate`.
    pub crf: Option<u32>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: VideoCodec,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            bitrate: 8_000_000,
            crf: None,
            width: 1920,
            height: 1088,
            fps: 60,
            codec: VideoCodec::H264,
        }
    }
}

impl From<&VisualConfig> for VideoConfig {
    fn from(config: &VisualConfig) -> Self {
        Self {
            bitrate: config.bitrate,
            crf: None,
            width: config.width,
            height: config.height,
            fps: config.fps,
            codec: config.codec,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] RsmpegError),
    #[error("Codec not found: {0}")]
    CodecNotFound(String),
    #[error("Invalid output path: {0}")]
    InvalidPath(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to set encoder option {key}={value}")]
    Option { key: String, value: String },
}

fn c_string(s: &str) -> Result<CString, VideoError> {
    CString::new(s).map_err(|_| VideoError::InvalidConfig(format!("interior NUL in {s:?}")))
}

fn set_private_option(ctx: &mut AVCodecContext, key: &str, value: &str) -> Result<(), VideoError> {
    let c_key = c_string(key)?;
    let c_value = c_string(value)?;
    let ret = unsafe {
        ffi::av_opt_set(
            ctx.as_mut_ptr() as *mut _,
            c_key.as_ptr(),
            c_value.as_ptr(),
            ffi::AV_OPT_SEARCH_CHILDREN as i32,
        )
    };
    if ret < 0 {
        return Err(VideoError::Option {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

pub struct VideoEncoder {
    format_ctx: AVFormatContextOutput,
    codec_ctx: AVCodecContext,
    frame: AVFrame,
    config: VideoConfig,
    pts: i64,
    stream_index: i32,
    stream_time_base: AVRational,
    finished: bool,
}

impl VideoEncoder {
    /// Open `path` for writing and prepare the encoder.
    pub fn new<P: AsRef<Path>>(path: P, config: VideoConfig) -> Result<Self, VideoError> {
        if config.width % 2 != 0 || config.height % 2 != 0 {
            return Err(VideoError::InvalidConfig(format!(
                "4:2:0 output needs even dimensions, got {}x{}",
                config.width, config.height
            )));
        }
        if config.fps == 0 {
            return Err(VideoError::InvalidConfig("fps must be positive".into()));
        }

        let path_str = path.as_ref().to_string_lossy();
        let path_cstring =
            CString::new(path_str.as_bytes()).map_err(|_| VideoError::InvalidPath(path_str.to_string()))?;

        let encoder_name = config.codec.encoder_name();
        let codec = AVCodec::find_encoder_by_name(&c_string(encoder_name)?)
            .ok_or_else(|| VideoError::CodecNotFound(encoder_name.to_string()))?;

        let mut format_ctx = AVFormatContextOutput::create(&path_cstring)?;

        let mut codec_ctx = AVCodecContext::new(&codec);
        codec_ctx.set_width(config.width as i32);
        codec_ctx.set_height(config.height as i32);
        codec_ctx.set_pix_fmt(ffi::AV_PIX_FMT_YUV420P);
        codec_ctx.set_time_base(AVRational {
            num: 1,
            den: config.fps as i32,
        });
        codec_ctx.set_framerate(AVRational {
            num: config.fps as i32,
            den: 1,
        });
        codec_ctx.set_bit_rate(config.bitrate as i64);

        if let Some(crf) = config.crf {
            set_private_option(&mut codec_ctx, "crf", &crf.to_string())?;
        }
        if config.codec == VideoCodec::H264 {
            set_private_option(&mut codec_ctx, "preset", "medium")?;
        }

        codec_ctx.open(None)?;

        let stream_index = {
            let mut stream = format_ctx.new_stream();
            stream.set_codecpar(codec_ctx.extract_codecpar());
            stream.set_time_base(codec_ctx.time_base);
            stream.index
        };

        format_ctx.write_header(&mut None)?;

        // The muxer may pick its own time base while writing the header.
        let stream_time_base = format_ctx
            .streams()
            .get(stream_index as usize)
            .map(|s| s.time_base)
            .ok_or_else(|| VideoError::InvalidConfig("output stream missing".into()))?;

        let mut frame = AVFrame::new();
        frame.set_format(ffi::AV_PIX_FMT_YUV420P);
        frame.set_width(config.width as i32);
        frame.set_height(config.height as i32);
        frame.alloc_buffer()?;

        log::info!(
            "Encoding {}x{} @ {} fps with {} to {}",
            config.width,
            config.height,
            config.fps,
            encoder_name,
            path_str
        );

        Ok(Self {
            format_ctx,
            codec_ctx,
            frame,
            config,
            pts: 0,
            stream_index,
            stream_time_base,
            finished: false,
        })
    }

    pub fn config(&self) -> &VideoConfig {
        &self.config
    }

    /// Frames submitted so far.
    pub fn frames_written(&self) -> i64 {
        self.pts
    }

    /// Caller checks the frame size.
    fn encode_rgb(&mut self, rgb: &[u8]) -> Result<(), VideoError> {
        if self.finished {
            return Err(VideoError::InvalidConfig("encoder already finished".into()));
        }
        self.fill_yuv420p(rgb);
        self.frame.set_pts(self.pts);
        self.pts += 1;

        self.codec_ctx.send_frame(Some(&self.frame))?;
        self.drain_packets()
    }

    /// Flush the encoder and write the trailer. Later calls do nothing.
    pub fn finish(&mut self) -> Result<(), VideoError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.codec_ctx.send_frame(None)?;
        self.drain_packets()?;
        self.format_ctx.write_trailer()?;
        log::info!("Encoder finished after {} frames", self.pts);
        Ok(())
    }

    fn drain_packets(&mut self) -> Result<(), VideoError> {
        loop {
            let mut packet = match self.codec_ctx.receive_packet() {
                Ok(p) => p,
                Err(RsmpegError::EncoderDrainError) | Err(RsmpegError::EncoderFlushedError) => {
                    return Ok(())
                }
                Err(e) => return Err(e.into()),
            };
            packet.set_stream_index(self.stream_index);
            packet.rescale_ts(self.codec_ctx.time_base, self.stream_time_base);
            self.format_ctx.interleaved_write_frame(&mut packet)?;
        }
    }

    /// BT.601 full-range conversion with 2x2 chroma averaging.
    fn fill_yuv420p(&mut self, rgb: &[u8]) {
        let width = self.config.width as usize;
        let height = self.config.height as usize;
        let y_plane = self.frame.data[0];
        let u_plane = self.frame.data[1];
        let v_plane = self.frame.data[2];
        let y_stride = self.frame.linesize[0] as usize;
        let u_stride = self.frame.linesize[1] as usize;
        let v_stride = self.frame.linesize[2] as usize;

        let pixel = |x: usize, y: usize| {
            let i = (y * width + x) * 3;
            (rgb[i] as f32, rgb[i + 1] as f32, rgb[i + 2] as f32)
        };

        for y in 0..height {
            for x in 0..width {
                let (r, g, b) = pixel(x, y);
                let luma = (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8;
                unsafe {
                    *y_plane.add(y * y_stride + x) = luma;
                }
            }
        }

        for cy in 0..height / 2 {
            for cx in 0..width / 2 {
                let (mut r, mut g, mut b) = (0.0, 0.0, 0.0);
                for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                    let (pr, pg, pb) = pixel(cx * 2 + dx, cy * 2 + dy);
                    r += pr;
                    g += pg;
                    b += pb;
                }
                let (r, g, b) = (r / 4.0, g / 4.0, b / 4.0);
                let u = (128.0 - 0.168736 * r - 0.331264 * g + 0.5 * b).round().clamp(0.0, 255.0) as u8;
                let v = (128.0 + 0.5 * r - 0.418688 * g - 0.081312 * b).round().clamp(0.0, 255.0) as u8;
                unsafe {
                    *u_plane.add(cy * u_stride + cx) = u;
                    *v_plane.add(cy * v_stride + cx) = v;
                }
            }
        }
    }
}

impl FrameSink for VideoEncoder {
    fn write_frame(&mut self, rgb: &[u8]) -> Result<(), SinkError> {
        if self.finished {
            return Err(SinkError::Closed);
        }
        check_frame_size(rgb, self.config.width, self.config.height)?;
        Ok(self.encode_rgb(rgb)?)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        Ok(self.finish()?)
    }
}
