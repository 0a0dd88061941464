//! In-process mock `Vision` gRPC server used by the pipeline integration
//! tests in place of a real detection backend.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tokio_stream::Stream;
use tonic::{Request, Response, Status, Streaming};

use stereo_vision_core::pipeline::{Callbacks, EncoderWorker, ReceiveWorker, SendWorker, SharedConfig};
use stereo_vision_core::queue::SpscQueue;
use stereo_vision_core::rpc::proto::vision_server::{Vision, VisionServer};
use stereo_vision_core::rpc::{RpcChannel, WireBox, WireDetection, WireFrame, WireResult};
use stereo_vision_core::types::{chroma_dim, RawFrame};
use stereo_vision_core::Role;

/// Server behavior: echoes a detection result for any frame index present
/// in `echo`; after `max_frames` frames have been read (if set), either
/// closes the outbound half cleanly (`closing_after`, simulating a server
/// that finished its work) or ends the call with an error status
/// (`failing_after`, simulating a crashed/killed server).
#[derive(Clone, Default)]
pub struct ScriptedVision {
    echo: Arc<HashMap<u64, Vec<f32>>>,
    max_frames: Option<usize>,
    fail_after_max: bool,
    captured: Option<Arc<std::sync::Mutex<Vec<WireFrame>>>>,
}

impl ScriptedVision {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn echoing(mut self, frame_index: u64, scores: Vec<f32>) -> Self {
        Arc::make_mut(&mut self.echo).insert(frame_index, scores);
        self
    }

    pub fn closing_after(mut self, max_frames: usize) -> Self {
        self.max_frames = Some(max_frames);
        self.fail_after_max = false;
        self
    }

    pub fn failing_after(mut self, max_frames: usize) -> Self {
        self.max_frames = Some(max_frames);
        self.fail_after_max = true;
        self
    }

    /// Records every received `Frame` in arrival order, readable via
    /// `captured_frames` once the caller has something worth inspecting.
    pub fn capturing(mut self) -> Self {
        self.captured = Some(Arc::new(std::sync::Mutex::new(Vec::new())));
        self
    }

    pub fn captured_frames(&self) -> Vec<WireFrame> {
        self.captured
            .as_ref()
            .map(|c| c.lock().unwrap().clone())
            .unwrap_or_default()
    }
}

#[tonic::async_trait]
impl Vision for ScriptedVision {
    type StreamDetectStream = Pin<Box<dyn Stream<Item = Result<WireResult, Status>> + Send + 'static>>;

    async fn stream_detect(
        &self,
        request: Request<Streaming<WireFrame>>,
    ) -> Result<Response<Self::StreamDetectStream>, Status> {
        let mut inbound = request.into_inner();
        let (tx, rx) = mpsc::channel(16);
        let echo = Arc::clone(&self.echo);
        let max_frames = self.max_frames;
        let fail_after_max = self.fail_after_max;
        let captured = self.captured.clone();

        tokio::spawn(async move {
            let mut seen = 0usize;
            loop {
                match inbound.message().await {
                    Ok(Some(frame)) => {
                        seen += 1;
                        if let Some(c) = &captured {
                            c.lock().unwrap().push(frame.clone());
                        }
                        if let Some(scores) = echo.get(&frame.frame_index) {
                            let detections = scores
                                .iter()
                                .map(|&score| WireDetection {
                                    r#box: Some(WireBox { x: 0.0, y: 0.0, w: 1.0, h: 1.0 }),
                                    class_id: 0,
                                    score,
                                })
                                .collect();
                            let result = WireResult {
                                frame_index: frame.frame_index,
                                timestamp_ns: frame.timestamp_ns,
                                detections,
                            };
                            if tx.send(Ok(result)).await.is_err() {
                                break;
                            }
                        }
                        if let Some(max) = max_frames {
                            if seen >= max {
                                if fail_after_max {
                                    let _ = tx
                                        .send(Err(Status::unavailable("mock server killed")))
                                        .await;
                                }
                                break;
                            }
                        }
                    }
                    Ok(None) | Err(_) => break,
                }
            }
            // Dropping `tx` here closes the outbound stream: a clean
            // `Ok(None)` close if no error was sent, or ends the stream
            // right after the error status otherwise.
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx)) as Self::StreamDetectStream))
    }
}

/// Binds a mock server to an ephemeral localhost port and returns its
/// address and a handle that aborts the server when dropped behavior is
/// not needed; tests let the handle run for their own duration.
pub async fn spawn_mock_server(service: ScriptedVision) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
    let addr = listener.local_addr().expect("local addr");

    let handle = tokio::spawn(async move {
        let incoming = TcpListenerStream::new(listener);
        let _ = tonic::transport::Server::builder()
            .add_service(VisionServer::new(service))
            .serve_with_incoming(incoming)
            .await;
    });

    (addr, handle)
}

/// Exercises the real encode/send/receive worker pipeline against a mock
/// server without touching `CameraSession`/GStreamer: a synthetic
/// `RawFrame` pushed into `raw_left`/`raw_right` stands in for the
/// hardware image-available callback that would otherwise feed the
/// encoder queues.
pub struct TestPipeline {
    pub raw_left: Arc<SpscQueue<RawFrame>>,
    pub raw_right: Arc<SpscQueue<RawFrame>>,
    pub shared: Arc<SharedConfig>,
    pub running: Arc<AtomicBool>,
    pub connected: Arc<AtomicBool>,
    encoder_left: EncoderWorker,
    encoder_right: EncoderWorker,
    sender: SendWorker,
    receiver: ReceiveWorker,
}

impl TestPipeline {
    pub fn spawn(addr: SocketAddr, shared: Arc<SharedConfig>, callbacks: Arc<Callbacks>) -> Self {
        let raw_left = Arc::new(SpscQueue::new(4));
        let raw_right = Arc::new(SpscQueue::new(4));
        let encoded_left = Arc::new(SpscQueue::new(3));
        let encoded_right = Arc::new(SpscQueue::new(3));

        let running = Arc::new(AtomicBool::new(true));
        let connected = Arc::new(AtomicBool::new(false));

        let encoder_left = EncoderWorker::spawn(
            Role::Left,
            Arc::clone(&raw_left),
            Arc::clone(&encoded_left),
            Arc::clone(&shared),
            Arc::clone(&callbacks),
        );
        let encoder_right = EncoderWorker::spawn(
            Role::Right,
            Arc::clone(&raw_right),
            Arc::clone(&encoded_right),
            Arc::clone(&shared),
            Arc::clone(&callbacks),
        );

        let channel = RpcChannel::connect(&addr.to_string()).expect("connect to mock server");
        let client = channel.client();
        let (outbound_tx, outbound_rx) = tokio::sync::mpsc::channel(8);

        let sender = SendWorker::spawn(
            encoded_left,
            encoded_right,
            outbound_tx,
            Arc::clone(&shared),
            Arc::clone(&callbacks),
            Arc::clone(&running),
        );
        let receiver = ReceiveWorker::spawn(
            client,
            outbound_rx,
            shared.clone(),
            callbacks,
            Arc::clone(&running),
            Arc::clone(&connected),
        );

        Self {
            raw_left,
            raw_right,
            shared,
            running,
            connected,
            encoder_left,
            encoder_right,
            sender,
            receiver,
        }
    }

    pub fn stop(mut self) {
        self.encoder_left.stop();
        self.encoder_right.stop();
        self.sender.stop();
        self.receiver.join();
    }
}

/// A small, fast-to-encode synthetic frame standing in for a captured image.
pub fn synthetic_frame(role: Role, frame_index: u64) -> RawFrame {
    let (w, h) = (16u32, 16u32);
    let cw = chroma_dim(w) as usize;
    let ch = chroma_dim(h) as usize;
    RawFrame {
        role,
        width: w,
        height: h,
        frame_index,
        timestamp_ns: frame_index * 33_000_000,
        y: vec![16; (w as usize) * (h as usize)],
        u: vec![128; cw * ch],
        v: vec![128; cw * ch],
    }
}

/// Polls `condition` until it's true or `timeout` elapses, without busy
/// spinning the executor.
pub async fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within {:?}", timeout);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
