//! State shared between the session controller and its worker threads.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use crate::error::AivStatus;
use crate::types::{DetectionResult, Role};

/// Host callbacks. Optional individually; a worker silently drops a
/// notification if the corresponding callback is unset.
#[derive(Default)]
pub struct Callbacks {
    pub on_result: RwLock<Option<Box<dyn Fn(DetectionResult) + Send + Sync>>>,
    pub on_error: RwLock<Option<Box<dyn Fn(AivStatus, String) + Send + Sync>>>,
    pub on_frame_sent: RwLock<Option<Box<dyn Fn(String, u64, f64) + Send + Sync>>>,
}

impl Callbacks {
    pub fn result(&self, result: DetectionResult) {
        if let Some(cb) = self.on_result.read().as_ref() {
            cb(result);
        }
    }

    pub fn error(&self, status: AivStatus, message: impl Into<String>) {
        if let Some(cb) = self.on_error.read().as_ref() {
            cb(status, message.into());
        }
    }

    pub fn frame_sent(&self, image_id: String, frame_index: u64, timestamp_sec: f64) {
        if let Some(cb) = self.on_frame_sent.read().as_ref() {
            cb(image_id, frame_index, timestamp_sec);
        }
    }
}

/// Settings the encoder/send/receive workers read on every iteration.
/// Lives behind an `Arc` so `Session`'s setters can be called from any
/// thread while streaming is active.
pub struct SharedConfig {
    pub jpeg_quality: AtomicU8,
    /// Bit pattern of an `f32`; see `score_threshold`/`set_score_threshold`.
    score_threshold_bits: AtomicU32,
    pub image_prefix: RwLock<String>,
    pub stream_base: RwLock<String>,
    camera_id_left: RwLock<String>,
    camera_id_right: RwLock<String>,
}

impl SharedConfig {
    pub fn new() -> Self {
        Self {
            jpeg_quality: AtomicU8::new(crate::types::JpegConfig::DEFAULT_QUALITY),
            score_threshold_bits: AtomicU32::new(0.0f32.to_bits()),
            image_prefix: RwLock::new("img".to_string()),
            stream_base: RwLock::new("default".to_string()),
            camera_id_left: RwLock::new(String::new()),
            camera_id_right: RwLock::new(String::new()),
        }
    }

    pub fn score_threshold(&self) -> f32 {
        f32::from_bits(self.score_threshold_bits.load(Ordering::Relaxed))
    }

    pub fn set_score_threshold(&self, value: f32) {
        self.score_threshold_bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn camera_id(&self, role: Role) -> String {
        match role {
            Role::Left => self.camera_id_left.read().clone(),
            Role::Right => self.camera_id_right.read().clone(),
        }
    }

    pub fn set_camera_id(&self, role: Role, id: String) {
        match role {
            Role::Left => *self.camera_id_left.write() = id,
            Role::Right => *self.camera_id_right.write() = id,
        }
    }

    pub fn stream_id(&self, role: Role) -> String {
        format!("{}_{}", self.stream_base.read(), role.suffix())
    }

    pub fn image_id(&self, frame_index: u64) -> String {
        format!("{}_{}", self.image_prefix.read(), frame_index)
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self::new()
    }
}
