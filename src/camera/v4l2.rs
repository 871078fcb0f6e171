#![cfg(feature = "camera-v4l2")]

//! V4L2 capture device.
//!
//! Negotiates an RGB3 format at the configured size, sets the frame rate,
//! and reads through a memory-mapped stream with the configured buffer
//! depth (1 by default, favoring frame freshness over completeness).

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use ouroboros::self_referencing;

use super::device::{CameraInfo, CaptureDevice};
use crate::config::CaptureSettings;

pub struct V4l2Device {
    state: V4l2State,
    width: u32,
    height: u32,
    fps: u32,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Device {
    pub fn open(path: &str, settings: &CaptureSettings) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device =
            v4l::Device::with_path(path).with_context(|| format!("open v4l2 device {path}"))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = settings.width;
        format.height = settings.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("failed to set format on {path}: {err}");
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        if settings.fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(settings.fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("failed to set fps on {path}: {err}");
            }
        }

        let width = format.width;
        let height = format.height;
        let buffer_depth = settings.buffer_depth.max(1);

        let state = V4l2StateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, buffer_depth)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        log::info!("v4l2 device {path} open ({width}x{height})");
        Ok(Self {
            state,
            width,
            height,
            fps: settings.fps,
        })
    }
}

impl CaptureDevice for V4l2Device {
    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        use v4l::io::traits::CaptureStream;

        let data = self
            .state
            .with_mut(|fields| fields.stream.next().map(|(buf, _meta)| buf.to_vec()))
            .context("capture v4l2 frame")?;

        match RgbImage::from_raw(self.width, self.height, data) {
            Some(frame) => Ok(Some(frame)),
            None => Err(anyhow!(
                "frame buffer does not match {}x{} RGB",
                self.width,
                self.height
            )),
        }
    }

    fn info(&self) -> CameraInfo {
        CameraInfo::active(self.width, self.height, self.fps)
    }
}
