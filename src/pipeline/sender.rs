//! Send worker: fairly interleaves both cameras' encoded-frame queues onto
//! the outbound half of the bidirectional stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender as TokioSender;

use crate::pipeline::shared::{Callbacks, SharedConfig};
use crate::queue::SpscQueue;
use crate::rpc::{ImageFormat, WireFrame};
use crate::types::EncodedPacket;

const POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct SendWorker {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SendWorker {
    pub fn spawn(
        left_queue: Arc<SpscQueue<EncodedPacket>>,
        right_queue: Arc<SpscQueue<EncodedPacket>>,
        outbound_tx: TokioSender<WireFrame>,
        shared: Arc<SharedConfig>,
        callbacks: Arc<Callbacks>,
        running: Arc<AtomicBool>,
    ) -> Self {
        let running_thread = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("vision-send".to_string())
            .spawn(move || run(left_queue, right_queue, outbound_tx, shared, callbacks, running_thread))
            .expect("failed to spawn send thread");

        Self { running, handle: Some(handle) }
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SendWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    left_queue: Arc<SpscQueue<EncodedPacket>>,
    right_queue: Arc<SpscQueue<EncodedPacket>>,
    outbound_tx: TokioSender<WireFrame>,
    shared: Arc<SharedConfig>,
    callbacks: Arc<Callbacks>,
    running: Arc<AtomicBool>,
) {
    // Alternates the role polled first each iteration so neither camera's
    // queue can starve the other under sustained backpressure.
    let mut prefer_left = true;

    while running.load(Ordering::Acquire) {
        let packet = if prefer_left {
            left_queue.try_pop().or_else(|| right_queue.try_pop())
        } else {
            right_queue.try_pop().or_else(|| left_queue.try_pop())
        };
        prefer_left = !prefer_left;

        let packet = match packet {
            Some(p) => p,
            None => {
                thread::sleep(POLL_INTERVAL);
                continue;
            }
        };

        let frame_index = packet.frame_index;
        let timestamp_sec = packet.timestamp_ns as f64 / 1_000_000_000.0;
        let image_id = shared.image_id(frame_index);
        let mut frame = to_wire_frame(packet);

        // `try_send` hands the frame back on `Full`, so a wait for channel
        // capacity (network backpressure) can be interrupted by `running`
        // going false instead of blocking this thread forever on a stream
        // the receive worker has already torn down.
        loop {
            match outbound_tx.try_send(frame) {
                Ok(()) => {
                    callbacks.frame_sent(image_id, frame_index, timestamp_sec);
                    break;
                }
                Err(TrySendError::Closed(_)) => {
                    running.store(false, Ordering::Release);
                    return;
                }
                Err(TrySendError::Full(returned)) => {
                    if !running.load(Ordering::Acquire) {
                        return;
                    }
                    frame = returned;
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }
    }
}

fn to_wire_frame(packet: EncodedPacket) -> WireFrame {
    WireFrame {
        stream_id: packet.stream_id,
        camera_id: packet.camera_id,
        frame_index: packet.frame_index,
        timestamp_ns: packet.timestamp_ns,
        width: packet.width,
        height: packet.height,
        format: ImageFormat::Jpeg as i32,
        data: packet.jpeg.to_vec(),
    }
}
