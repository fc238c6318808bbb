use std::path::Path;
use std::time::Duration;

use crate::capture::domain::video_device::{DeviceFormat, VideoDevice};
use crate::orientation::domain::device_orientation::CameraPosition;
use crate::shared::frame::Frame;
use crate::shared::sample_buffer::{CameraIntrinsics, SampleBuffer};

type SampleResult = Result<SampleBuffer, Box<dyn std::error::Error>>;

/// Live camera (or any ffmpeg-readable source) via libavdevice.
///
/// `format_name` selects a capture backend such as `v4l2`, `avfoundation`
/// or `dshow`; `None` lets libavformat probe `url` as a file or stream.
/// Decoded frames are converted to RGB24.
pub struct FfmpegCameraDevice {
    url: String,
    format_name: Option<String>,
    video_size: Option<(u32, u32)>,
    frame_rate: Option<f64>,
    position: CameraPosition,
    intrinsics: Option<CameraIntrinsics>,
    input_ctx: Option<ffmpeg_next::format::context::Input>,
    video_stream_index: usize,
}

// Safety: the device is owned by exactly one capture thread at a time.
// The raw pointers inside ffmpeg types are never shared.
unsafe impl Send for FfmpegCameraDevice {}

impl FfmpegCameraDevice {
    pub fn new(url: impl Into<String>, format_name: Option<&str>) -> Self {
        Self {
            url: url.into(),
            format_name: format_name.map(str::to_string),
            video_size: None,
            frame_rate: None,
            position: CameraPosition::Back,
            intrinsics: None,
            input_ctx: None,
            video_stream_index: 0,
        }
    }

    /// The first camera of the platform's capture backend, if the platform
    /// has a conventional default.
    pub fn platform_default() -> Option<Self> {
        if cfg!(target_os = "linux") {
            let path = "/dev/video0";
            Path::new(path)
                .exists()
                .then(|| Self::new(path, Some("v4l2")))
        } else if cfg!(target_os = "macos") {
            Some(Self::new("0", Some("avfoundation")))
        } else {
            // dshow needs a device name; nothing sensible to guess.
            None
        }
    }

    pub fn with_video_size(mut self, width: u32, height: u32) -> Self {
        self.video_size = Some((width, height));
        self
    }

    pub fn with_frame_rate(mut self, fps: f64) -> Self {
        self.frame_rate = Some(fps);
        self
    }

    pub fn with_position(mut self, position: CameraPosition) -> Self {
        self.position = position;
        self
    }

    /// Intrinsics attached to every sample this device produces.
    pub fn with_camera_intrinsics(mut self, intrinsics: Option<CameraIntrinsics>) -> Self {
        self.intrinsics = intrinsics;
        self
    }

    fn open_options(&self) -> ffmpeg_next::Dictionary<'static> {
        let mut options = ffmpeg_next::Dictionary::new();
        if let Some((w, h)) = self.video_size {
            options.set("video_size", &format!("{w}x{h}"));
        }
        if let Some(fps) = self.frame_rate {
            options.set("framerate", &format!("{fps}"));
        }
        options
    }

    fn start_decoding(&mut self) -> Result<SampleIter<'_>, Box<dyn std::error::Error>> {
        let intrinsics = self.intrinsics;
        let fallback_fps = self.frame_rate.unwrap_or(30.0);
        let video_stream_index = self.video_stream_index;
        let ictx = self
            .input_ctx
            .as_mut()
            .ok_or("FfmpegCameraDevice: not opened")?;

        let stream = ictx
            .stream(video_stream_index)
            .ok_or("video stream disappeared")?;
        let time_base = stream.time_base();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        Ok(SampleIter {
            ictx,
            decoder,
            scaler,
            width,
            height,
            video_stream_index,
            time_base,
            fallback_fps,
            intrinsics,
            frame_index: 0,
            flushing: false,
            done: false,
        })
    }
}

impl VideoDevice for FfmpegCameraDevice {
    fn open(&mut self) -> Result<DeviceFormat, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        ffmpeg_next::device::register_all();

        let options = self.open_options();
        let ictx = match self.format_name.as_deref() {
            Some(name) => {
                let input_format = find_input_format(name)
                    .ok_or_else(|| format!("capture backend '{name}' is not available"))?;
                ffmpeg_next::format::open_with(
                    &self.url,
                    &ffmpeg_next::format::format::Format::Input(input_format),
                    options,
                )?
                .input()
            }
            None => ffmpeg_next::format::input_with_dictionary(&self.url, options)?,
        };

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            self.frame_rate.unwrap_or(0.0)
        };

        let format = DeviceFormat {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            name: match &self.format_name {
                Some(backend) => format!("{backend}:{}", self.url),
                None => self.url.clone(),
            },
        };

        self.video_stream_index = video_stream_index;
        self.input_ctx = Some(ictx);
        Ok(format)
    }

    fn samples(&mut self) -> Box<dyn Iterator<Item = SampleResult> + '_> {
        match self.start_decoding() {
            Ok(iter) => Box::new(iter),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    fn close(&mut self) {
        self.input_ctx = None;
    }

    fn position(&self) -> CameraPosition {
        self.position
    }
}

/// Matches either the short or long backend name, e.g. `v4l2` or
/// `video4linux2`.
fn find_input_format(name: &str) -> Option<ffmpeg_next::format::format::Input> {
    ffmpeg_next::device::input::video().find(|f| f.name().split(',').any(|n| n == name))
}

/// Decodes one sample at a time straight from the device.
struct SampleIter<'a> {
    ictx: &'a mut ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    video_stream_index: usize,
    time_base: ffmpeg_next::Rational,
    fallback_fps: f64,
    intrinsics: Option<CameraIntrinsics>,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

impl SampleIter<'_> {
    fn try_receive(&mut self) -> Option<SampleResult> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        self.decoder.receive_frame(&mut decoded).ok()?;

        let timestamp = self.presentation_time(decoded.timestamp());
        let index = self.frame_index;
        self.frame_index += 1;

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        let sample = match self.scaler.run(&decoded, &mut rgb_frame) {
            Ok(()) => {
                let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
                SampleBuffer::new(
                    Frame::new(pixels, self.width, self.height, 3, index),
                    timestamp,
                )
            }
            Err(e) => {
                log::debug!("Frame {index} could not be converted to RGB: {e}");
                SampleBuffer::without_image(timestamp)
            }
        };
        Some(Ok(sample.with_camera_intrinsics(self.intrinsics)))
    }

    fn presentation_time(&self, pts: Option<i64>) -> Duration {
        let tb = self.time_base;
        match pts {
            Some(pts) if tb.denominator() != 0 => {
                let secs = pts as f64 * tb.numerator() as f64 / tb.denominator() as f64;
                Duration::from_secs_f64(secs.max(0.0))
            }
            _ if self.fallback_fps > 0.0 => {
                Duration::from_secs_f64(self.frame_index as f64 / self.fallback_fps)
            }
            _ => Duration::ZERO,
        }
    }
}

impl Iterator for SampleIter<'_> {
    type Item = SampleResult;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(result) = self.try_receive() {
            return Some(result);
        }
        if self.flushing {
            self.done = true;
            return None;
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                if let Some(result) = self.try_receive() {
                    return Some(result);
                }
                self.done = true;
                return None;
            };
            if stream.index() != self.video_stream_index {
                continue;
            }
            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }
            if let Some(result) = self.try_receive() {
                return Some(result);
            }
        }
    }
}

/// Copies the RGB plane into a tightly packed buffer, dropping row padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_len = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    pixels
}
