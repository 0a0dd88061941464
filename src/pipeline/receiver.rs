//! Receive worker: opens the bidirectional stream and reads detection
//! results back, filtering by score threshold.
//!
//! Owns a dedicated single-threaded tokio runtime so the blocking read loop
//! (`tonic::Streaming::message`) can run on a plain OS thread instead of
//! occupying a shared async executor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::Receiver as TokioReceiver;
use tokio::sync::Notify;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::error::AivStatus;
use crate::pipeline::shared::{Callbacks, SharedConfig};
use crate::rpc::{VisionClient, WireFrame, WireResult};
use crate::types::{Detection, DetectionResult};

pub struct ReceiveWorker {
    shutdown: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl ReceiveWorker {
    pub fn spawn(
        mut client: VisionClient<tonic::transport::Channel>,
        outbound_rx: TokioReceiver<WireFrame>,
        shared: Arc<SharedConfig>,
        callbacks: Arc<Callbacks>,
        running: Arc<AtomicBool>,
        connected: Arc<AtomicBool>,
    ) -> Self {
        let shutdown = Arc::new(Notify::new());
        let shutdown_thread = Arc::clone(&shutdown);

        let handle = thread::Builder::new()
            .name("vision-receive".to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        callbacks.error(AivStatus::Internal, format!("failed to start receive runtime: {e}"));
                        running.store(false, Ordering::Release);
                        return;
                    }
                };

                rt.block_on(async move {
                    let outbound = ReceiverStream::new(outbound_rx);
                    let response = match client.stream_detect(outbound).await {
                        Ok(response) => response,
                        Err(status) => {
                            callbacks.error(AivStatus::Grpc, status.message().to_string());
                            running.store(false, Ordering::Release);
                            connected.store(false, Ordering::Release);
                            return;
                        }
                    };

                    connected.store(true, Ordering::Release);
                    let mut inbound = response.into_inner();
                    info!("stereo detect stream established");

                    loop {
                        if !running.load(Ordering::Acquire) {
                            break;
                        }
                        // `inbound.message()` only returns on its own once the
                        // peer sends something or closes; a server that stays
                        // silent after we stop streaming would otherwise wedge
                        // this read forever. Racing it against `shutdown`
                        // guarantees the loop re-observes `running` promptly
                        // no matter what the peer does.
                        tokio::select! {
                            msg = inbound.message() => {
                                match msg {
                                    Ok(Some(result)) => {
                                        dispatch(&result, &shared, &callbacks);
                                    }
                                    Ok(None) => {
                                        info!("server closed detect stream");
                                        running.store(false, Ordering::Release);
                                        connected.store(false, Ordering::Release);
                                        break;
                                    }
                                    Err(status) => {
                                        warn!(error = %status, "detect stream read failed");
                                        callbacks.error(AivStatus::Grpc, status.message().to_string());
                                        running.store(false, Ordering::Release);
                                        connected.store(false, Ordering::Release);
                                        break;
                                    }
                                }
                            }
                            _ = shutdown_thread.notified() => {
                                info!("receive worker stopping on shutdown signal");
                                connected.store(false, Ordering::Release);
                                break;
                            }
                        }
                    }
                });
            })
            .expect("failed to spawn receive thread");

        Self { shutdown, handle: Some(handle) }
    }

    pub fn join(&mut self) {
        self.shutdown.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ReceiveWorker {
    fn drop(&mut self) {
        self.join();
    }
}

fn dispatch(result: &WireResult, shared: &SharedConfig, callbacks: &Callbacks) {
    let threshold = shared.score_threshold();
    let detections: Vec<Detection> = result
        .detections
        .iter()
        .filter(|d| d.score >= threshold)
        .filter_map(|d| {
            d.r#box.as_ref().map(|b| Detection {
                x: b.x,
                y: b.y,
                w: b.w,
                h: b.h,
                class_id: d.class_id,
                score: d.score,
            })
        })
        .collect();

    callbacks.result(DetectionResult {
        image_id: shared.image_id(result.frame_index),
        frame_index: result.frame_index,
        timestamp_sec: result.timestamp_ns as f64 / 1_000_000_000.0,
        detections,
    });
}
