//! Encoder worker: drains one role's raw-frame queue, compresses to JPEG.

use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, warn};

use crate::error::AivStatus;
use crate::pipeline::shared::{Callbacks, SharedConfig};
use crate::queue::SpscQueue;
use crate::types::{EncodedPacket, RawFrame, Role};

const POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct EncoderWorker {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EncoderWorker {
    pub fn spawn(
        role: Role,
        raw_queue: Arc<SpscQueue<RawFrame>>,
        encoded_queue: Arc<SpscQueue<EncodedPacket>>,
        shared: Arc<SharedConfig>,
        callbacks: Arc<Callbacks>,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_thread = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name(format!("encoder-{}", role.suffix()))
            .spawn(move || run(role, raw_queue, encoded_queue, shared, callbacks, running_thread))
            .expect("failed to spawn encoder thread");

        Self { running, handle: Some(handle) }
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for EncoderWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    role: Role,
    raw_queue: Arc<SpscQueue<RawFrame>>,
    encoded_queue: Arc<SpscQueue<EncodedPacket>>,
    shared: Arc<SharedConfig>,
    callbacks: Arc<Callbacks>,
    running: Arc<AtomicBool>,
) {
    let mut compressor = match turbojpeg::Compressor::new() {
        Ok(c) => c,
        Err(e) => {
            error!(role = role.suffix(), error = %e, "failed to create turbojpeg compressor");
            callbacks.error(AivStatus::Internal, format!("failed to create jpeg compressor: {e}"));
            return;
        }
    };

    let mut last_quality: Option<u8> = None;
    let mut planar = Vec::new();

    while running.load(Ordering::Acquire) {
        let frame = match raw_queue.try_pop() {
            Some(frame) => frame,
            None => {
                thread::sleep(POLL_INTERVAL);
                continue;
            }
        };

        let quality = shared.jpeg_quality.load(Ordering::Relaxed);
        if last_quality != Some(quality) {
            if let Err(e) = compressor.set_quality(quality as i32) {
                warn!(role = role.suffix(), error = %e, "failed to set jpeg quality");
            }
            last_quality = Some(quality);
        }

        planar.clear();
        planar.extend_from_slice(&frame.y);
        planar.extend_from_slice(&frame.u);
        planar.extend_from_slice(&frame.v);

        let yuv_image = turbojpeg::YuvImage {
            pixels: planar.as_slice(),
            width: frame.width as usize,
            height: frame.height as usize,
            align: 1,
            subsamp: turbojpeg::Subsamp::Sub2x2,
        };

        match compressor.compress_yuv_to_vec(yuv_image) {
            Ok(jpeg) => {
                encoded_queue.push(EncodedPacket {
                    role,
                    width: frame.width,
                    height: frame.height,
                    frame_index: frame.frame_index,
                    timestamp_ns: frame.timestamp_ns,
                    jpeg: Bytes::from(jpeg),
                    camera_id: shared.camera_id(role),
                    stream_id: shared.stream_id(role),
                });
            }
            Err(e) => {
                warn!(role = role.suffix(), error = %e, "jpeg encode failed, dropping frame");
                callbacks.error(AivStatus::Internal, format!("jpeg compression failed: {e}"));
            }
        }
    }
}
