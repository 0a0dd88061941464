//! Camera enumeration.
//!
//! Reading stereo-position vendor tags is a platform-specific concern (the
//! reference binding reads them from NDK camera characteristics, which has
//! no GStreamer equivalent on desktop Linux); `GstCameraCatalog` enumerates
//! real devices via `gst::DeviceMonitor` but reports `position = -1` for all
//! of them, matching the "tag absent" case. `StaticCameraCatalog` is a test
//! double for exercising position-based lookup without real hardware.

use gstreamer as gst;
use gstreamer::prelude::*;
use tracing::warn;

use crate::error::AivError;
use crate::types::{CameraListing, CameraParams};

pub trait CameraCatalog: Send + Sync {
    fn enumerate(&self) -> Result<Vec<CameraListing>, AivError>;

    fn find_by_position(&self, position: i32) -> Result<Option<String>, AivError> {
        Ok(self
            .enumerate()?
            .into_iter()
            .find(|c| c.position == position)
            .map(|c| c.id))
    }

    /// Reads lens intrinsics/extrinsics for `cam_id` from device metadata.
    /// `Err(AivError::CameraParam)` if any required field is missing,
    /// matching `AIV_GetCameraParams`'s `ERR_CAMERA_PARAM` contract.
    fn params(&self, cam_id: &str) -> Result<CameraParams, AivError>;
}

pub struct GstCameraCatalog;

impl GstCameraCatalog {
    pub fn new() -> Result<Self, AivError> {
        gst::init().map_err(|e| AivError::CameraOpen(e.to_string()))?;
        Ok(Self)
    }
}

impl CameraCatalog for GstCameraCatalog {
    fn enumerate(&self) -> Result<Vec<CameraListing>, AivError> {
        let monitor = gst::DeviceMonitor::new();
        let caps = gst::Caps::new_any();
        monitor.add_filter(Some("Video/Source"), Some(&caps));

        monitor
            .start()
            .map_err(|e| AivError::CameraOpen(e.to_string()))?;
        let devices = monitor.devices();
        monitor.stop();

        let listings = devices
            .into_iter()
            .enumerate()
            .map(|(i, device)| CameraListing {
                id: device
                    .properties()
                    .and_then(|p| p.get::<String>("device.path").ok())
                    .unwrap_or_else(|| format!("camera{}", i)),
                position: -1,
            })
            .collect::<Vec<_>>();

        if listings.is_empty() {
            warn!("no video source devices enumerated");
        }

        Ok(listings)
    }

    /// GStreamer's `gst::Device` caps carry no lens-calibration metadata;
    /// the NDK original reads intrinsics/extrinsics from
    /// `ACameraMetadata` tags that have no desktop-Linux equivalent.
    fn params(&self, cam_id: &str) -> Result<CameraParams, AivError> {
        Err(AivError::CameraParam(format!(
            "no lens calibration metadata available for '{cam_id}' on this platform"
        )))
    }
}

/// Fixed camera list for tests, configured with explicit stereo positions
/// and (optionally) calibration parameters.
pub struct StaticCameraCatalog {
    cameras: Vec<CameraListing>,
    params: std::collections::HashMap<String, CameraParams>,
}

impl StaticCameraCatalog {
    pub fn new(cameras: Vec<CameraListing>) -> Self {
        Self { cameras, params: std::collections::HashMap::new() }
    }

    pub fn with_params(mut self, cam_id: impl Into<String>, params: CameraParams) -> Self {
        self.params.insert(cam_id.into(), params);
        self
    }
}

impl CameraCatalog for StaticCameraCatalog {
    fn enumerate(&self) -> Result<Vec<CameraListing>, AivError> {
        Ok(self.cameras.clone())
    }

    fn params(&self, cam_id: &str) -> Result<CameraParams, AivError> {
        self.params
            .get(cam_id)
            .cloned()
            .ok_or_else(|| AivError::CameraParam(format!("no calibration recorded for '{cam_id}'")))
    }
}
