//! Capture device boundary.
//!
//! The session owns one `CaptureDevice` at a time; providers open them by
//! index. `stub://` device patterns resolve to the synthetic device so the
//! camera path runs without hardware.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use image::RgbImage;
use serde::Serialize;

use crate::config::CaptureSettings;

/// Negotiated capture parameters, reported by `camera_info`.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct CameraInfo {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,
}

impl CameraInfo {
    pub fn unavailable() -> Self {
        Self {
            available: false,
            width: None,
            height: None,
            fps: None,
        }
    }

    pub fn active(width: u32, height: u32, fps: u32) -> Self {
        Self {
            available: true,
            width: Some(width),
            height: Some(height),
            fps: Some(fps),
        }
    }
}

/// An open capture handle.
pub trait CaptureDevice {
    /// Read one frame.
    ///
    /// `Ok(None)` signals a transient read failure (disconnect, empty
    /// buffer); the session surfaces it as an absent frame without a state
    /// transition.
    fn read_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Negotiated capture parameters.
    fn info(&self) -> CameraInfo;
}

/// Opens capture devices by index.
pub trait DeviceProvider {
    fn open(&self, index: u32, settings: &CaptureSettings) -> Result<Box<dyn CaptureDevice>>;
}

/// Maps `stub://` device patterns to the synthetic device and device paths
/// to V4L2 (feature `camera-v4l2`).
pub struct DefaultDeviceProvider;

impl DeviceProvider for DefaultDeviceProvider {
    fn open(&self, index: u32, settings: &CaptureSettings) -> Result<Box<dyn CaptureDevice>> {
        let path = settings.device_path(index);
        if path.starts_with("stub://") {
            return Ok(Box::new(SyntheticDevice::new(settings)));
        }
        #[cfg(feature = "camera-v4l2")]
        {
            Ok(Box::new(crate::camera::v4l2::V4l2Device::open(
                &path, settings,
            )?))
        }
        #[cfg(not(feature = "camera-v4l2"))]
        {
            Err(anyhow::anyhow!(
                "device {path} requires the camera-v4l2 feature"
            ))
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic device (stub:// patterns)
// ----------------------------------------------------------------------------

/// Synthetic device producing deterministic pattern frames.
pub struct SyntheticDevice {
    width: u32,
    height: u32,
    fps: u32,
    frame_count: u64,
}

impl SyntheticDevice {
    pub fn new(settings: &CaptureSettings) -> Self {
        Self {
            width: settings.width,
            height: settings.height,
            fps: settings.fps,
            frame_count: 0,
        }
    }
}

impl CaptureDevice for SyntheticDevice {
    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        self.frame_count += 1;
        let offset = self.frame_count as u32;
        let frame = RgbImage::from_fn(self.width, self.height, |x, y| {
            let shade = ((x + y + offset) % 256) as u8;
            image::Rgb([shade, shade / 2, 255 - shade])
        });
        Ok(Some(frame))
    }

    fn info(&self) -> CameraInfo {
        CameraInfo::active(self.width, self.height, self.fps)
    }
}

// ----------------------------------------------------------------------------
// Scripted device (state machine tests)
// ----------------------------------------------------------------------------

/// Scripted device yielding a programmed frame sequence; `None` entries
/// simulate transient read failures. An exhausted script also reads as a
/// failure.
pub struct ScriptedDevice {
    frames: VecDeque<Option<RgbImage>>,
    info: CameraInfo,
    released: Option<Arc<AtomicUsize>>,
}

impl ScriptedDevice {
    pub fn new(frames: Vec<Option<RgbImage>>) -> Self {
        Self {
            frames: frames.into(),
            info: CameraInfo::active(640, 480, 30),
            released: None,
        }
    }

    /// Count handle releases, for leak assertions.
    pub fn with_release_counter(mut self, counter: Arc<AtomicUsize>) -> Self {
        self.released = Some(counter);
        self
    }

    pub fn with_info(mut self, info: CameraInfo) -> Self {
        self.info = info;
        self
    }
}

impl CaptureDevice for ScriptedDevice {
    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        Ok(self.frames.pop_front().flatten())
    }

    fn info(&self) -> CameraInfo {
        self.info
    }
}

impl Drop for ScriptedDevice {
    fn drop(&mut self) {
        if let Some(counter) = &self.released {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Provider that pops one scripted device (or open failure) per `open`.
pub struct ScriptedDeviceProvider {
    devices: std::cell::RefCell<VecDeque<Result<ScriptedDevice>>>,
}

impl ScriptedDeviceProvider {
    pub fn new(devices: Vec<Result<ScriptedDevice>>) -> Self {
        Self {
            devices: std::cell::RefCell::new(devices.into()),
        }
    }
}

impl DeviceProvider for ScriptedDeviceProvider {
    fn open(&self, _index: u32, _settings: &CaptureSettings) -> Result<Box<dyn CaptureDevice>> {
        match self.devices.borrow_mut().pop_front() {
            Some(Ok(device)) => Ok(Box::new(device)),
            Some(Err(err)) => Err(err),
            None => Err(anyhow::anyhow!("no scripted device left")),
        }
    }
}
