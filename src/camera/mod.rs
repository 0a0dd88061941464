//! GStreamer-based dual-camera raw-frame capture.
//!
//! Each `CameraSession` owns one GStreamer pipeline that delivers NV12 frames
//! into an `appsink`; the sink callback de-interleaves the UV plane into
//! separate U and V planes and pushes a `RawFrame` into a bounded
//! drop-oldest queue for the encoder worker to drain.

mod platform;

pub mod catalog;

pub use catalog::{CameraCatalog, GstCameraCatalog, StaticCameraCatalog};
pub use platform::PlatformInfo;

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::AivError;
use crate::queue::SpscQueue;
use crate::types::{chroma_dim, CaptureConfig, RawFrame, Role};

/// One open camera, streaming raw frames into `queue` until stopped.
pub struct CameraSession {
    role: Role,
    device: String,
    config: CaptureConfig,
    queue: Arc<SpscQueue<RawFrame>>,

    pipeline: Option<gst::Pipeline>,
    is_running: Arc<AtomicBool>,
    frame_count: Arc<AtomicU64>,
    drop_count: Arc<AtomicU64>,
}

impl CameraSession {
    pub fn new(
        role: Role,
        device: String,
        config: CaptureConfig,
        queue: Arc<SpscQueue<RawFrame>>,
    ) -> Result<Self, AivError> {
        gst::init().map_err(|e| AivError::CameraOpen(e.to_string()))?;

        Ok(Self {
            role,
            device,
            config: config.resolved(),
            queue,
            pipeline: None,
            is_running: Arc::new(AtomicBool::new(false)),
            frame_count: Arc::new(AtomicU64::new(0)),
            drop_count: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn start(&mut self) -> Result<(), AivError> {
        if self.is_running.load(Ordering::Relaxed) {
            return Err(AivError::AlreadyRunning);
        }

        info!(
            role = self.role.suffix(),
            device = %self.device,
            width = self.config.width,
            height = self.config.height,
            fps = self.config.fps,
            "opening camera"
        );

        let pipeline_desc = self.build_pipeline_string();
        debug!(pipeline = %pipeline_desc, "launching gstreamer pipeline");

        let pipeline = gst::parse::launch(&pipeline_desc)
            .map_err(|e| AivError::CameraOpen(e.to_string()))?
            .dynamic_cast::<gst::Pipeline>()
            .map_err(|_| AivError::CameraOpen("launched element is not a pipeline".into()))?;

        let app_sink = pipeline
            .by_name("sink")
            .ok_or_else(|| AivError::CameraOpen("no appsink named 'sink'".into()))?
            .dynamic_cast::<gst_app::AppSink>()
            .map_err(|_| AivError::CameraOpen("'sink' is not an appsink".into()))?;

        app_sink.set_property("max-buffers", 2u32);
        app_sink.set_property("drop", true);
        app_sink.set_property("emit-signals", false);

        let queue = Arc::clone(&self.queue);
        let is_running = Arc::clone(&self.is_running);
        let frame_count = Arc::clone(&self.frame_count);
        let drop_count = Arc::clone(&self.drop_count);
        let role = self.role;
        let width = self.config.width;
        let height = self.config.height;

        app_sink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample(move |sink| {
                    if !is_running.load(Ordering::Relaxed) {
                        return Ok(gst::FlowSuccess::Ok);
                    }

                    let sample = sink.pull_sample().map_err(|_| gst::FlowError::Error)?;
                    let buffer = sample.buffer().ok_or(gst::FlowError::Error)?;
                    let map = buffer.map_readable().map_err(|_| gst::FlowError::Error)?;

                    match nv12_to_i420(map.as_slice(), width, height) {
                        Some((y, u, v)) => {
                            let index = frame_count.fetch_add(1, Ordering::Relaxed);
                            let timestamp_ns = buffer
                                .pts()
                                .map(|t| t.nseconds())
                                .unwrap_or(0);
                            queue.push(RawFrame {
                                role,
                                width,
                                height,
                                frame_index: index,
                                timestamp_ns,
                                y,
                                u,
                                v,
                            });
                        }
                        None => {
                            drop_count.fetch_add(1, Ordering::Relaxed);
                        }
                    }

                    Ok(gst::FlowSuccess::Ok)
                })
                .build(),
        );

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| AivError::CameraOpen(format!("state change failed: {:?}", e)))?;

        self.pipeline = Some(pipeline);
        self.is_running.store(true, Ordering::Relaxed);

        info!(role = self.role.suffix(), "camera streaming");
        Ok(())
    }

    pub fn stop(&mut self) {
        if !self.is_running.swap(false, Ordering::Relaxed) {
            return;
        }
        if let Some(pipeline) = self.pipeline.take() {
            let _ = pipeline.set_state(gst::State::Null);
        }
        info!(
            role = self.role.suffix(),
            captured = self.frame_count.load(Ordering::Relaxed),
            dropped = self.drop_count.load(Ordering::Relaxed),
            "camera stopped"
        );
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    fn build_pipeline_string(&self) -> String {
        let platform = platform::detect_platform();
        let source = match platform {
            PlatformInfo::MacOS => format!(
                "avfvideosrc device-index={} ! video/x-raw,format=NV12,width={},height={},framerate={}/1",
                self.device, self.config.width, self.config.height, self.config.fps
            ),
            PlatformInfo::RaspberryPi => format!(
                "libcamerasrc camera-name=\"{}\" ! video/x-raw,format=NV12,width={},height={},framerate={}/1",
                self.device, self.config.width, self.config.height, self.config.fps
            ),
            PlatformInfo::Linux => format!(
                "v4l2src device={} ! video/x-raw,format=NV12,width={},height={},framerate={}/1",
                self.device, self.config.width, self.config.height, self.config.fps
            ),
        };

        format!(
            "{} ! queue max-size-buffers=2 leaky=downstream ! videoconvert ! video/x-raw,format=NV12 ! appsink name=sink",
            source
        )
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Splits an NV12 buffer (`Y` plane followed by interleaved `UV`) into
/// separate 4:2:0 `U` and `V` planes. Returns `None` if the buffer is
/// shorter than the dimensions imply.
fn nv12_to_i420(data: &[u8], width: u32, height: u32) -> Option<(Vec<u8>, Vec<u8>, Vec<u8>)> {
    let w = width as usize;
    let h = height as usize;
    let cw = chroma_dim(width) as usize;
    let ch = chroma_dim(height) as usize;

    let y_len = w * h;
    let uv_len = 2 * cw * ch;
    if data.len() < y_len + uv_len {
        warn!(
            expected = y_len + uv_len,
            actual = data.len(),
            "short NV12 buffer, dropping frame"
        );
        return None;
    }

    let y = data[..y_len].to_vec();
    let uv = &data[y_len..y_len + uv_len];

    let mut u = Vec::with_capacity(cw * ch);
    let mut v = Vec::with_capacity(cw * ch);
    for chunk in uv.chunks_exact(2) {
        u.push(chunk[0]);
        v.push(chunk[1]);
    }

    Some((y, u, v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nv12_to_i420_deinterleaves_uv() {
        // 2x2 luma, 1x1 chroma pair.
        let y = vec![10, 20, 30, 40];
        let uv = vec![100, 200];
        let mut data = y.clone();
        data.extend_from_slice(&uv);

        let (out_y, out_u, out_v) = nv12_to_i420(&data, 2, 2).unwrap();
        assert_eq!(out_y, y);
        assert_eq!(out_u, vec![100]);
        assert_eq!(out_v, vec![200]);
    }

    #[test]
    fn nv12_to_i420_rejects_short_buffer() {
        let data = vec![0u8; 3];
        assert!(nv12_to_i420(&data, 4, 4).is_none());
    }
}
