//! Camera session state machine.
//!
//! `CameraSession` is the exclusive owner of the capture handle. States are
//! `Stopped` (handle absent, initial) and `Running` (handle present); at
//! most one handle is open per session, and the handle is released on
//! `stop()`, on session replacement, and on drop.

mod device;
#[cfg(feature = "camera-v4l2")]
mod v4l2;

pub use device::{
    CameraInfo, CaptureDevice, DefaultDeviceProvider, DeviceProvider, ScriptedDevice,
    ScriptedDeviceProvider, SyntheticDevice,
};
#[cfg(feature = "camera-v4l2")]
pub use v4l2::V4l2Device;

use image::RgbImage;

use crate::config::CaptureSettings;
use crate::error::ServiceError;

pub struct CameraSession {
    provider: Box<dyn DeviceProvider>,
    settings: CaptureSettings,
    device: Option<Box<dyn CaptureDevice>>,
}

impl CameraSession {
    /// Create a stopped session. Construction never touches hardware.
    pub fn new(provider: Box<dyn DeviceProvider>, settings: CaptureSettings) -> Self {
        Self {
            provider,
            settings,
            device: None,
        }
    }

    /// Acquire the capture device for `index`.
    ///
    /// A session that is already running releases its previous handle before
    /// opening the new one (restart semantics). On failure the session stays
    /// stopped.
    pub fn start(&mut self, index: u32) -> Result<(), ServiceError> {
        if self.device.is_some() {
            log::info!("camera restart: releasing previous handle");
            self.stop();
        }
        match self.provider.open(index, &self.settings) {
            Ok(device) => {
                log::info!("camera {index} started");
                self.device = Some(device);
                Ok(())
            }
            Err(err) => {
                log::warn!("camera {index} open failed: {err:#}");
                Err(ServiceError::CameraOpen { index })
            }
        }
    }

    /// Release the capture device. No-op when already stopped.
    pub fn stop(&mut self) {
        if self.device.take().is_some() {
            log::info!("camera stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.device.is_some()
    }

    /// Pull one frame.
    ///
    /// `None` when the session is stopped or the read transiently fails; a
    /// failed read does not change session state, so the caller may retry or
    /// explicitly `stop()`.
    pub fn pull_frame(&mut self) -> Option<RgbImage> {
        let device = self.device.as_mut()?;
        match device.read_frame() {
            Ok(Some(frame)) => Some(frame),
            Ok(None) => {
                log::warn!("frame read returned no data");
                None
            }
            Err(err) => {
                log::warn!("frame read failed: {err:#}");
                None
            }
        }
    }

    /// Negotiated capture parameters; `available: false` when stopped.
    pub fn info(&self) -> CameraInfo {
        self.device
            .as_ref()
            .map(|device| device.info())
            .unwrap_or_else(CameraInfo::unavailable)
    }
}
