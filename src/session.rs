//! Session controller: the public surface of the streaming core.
//!
//! `Session` owns everything process-scoped (the gRPC channel, the camera
//! catalog, configuration, callbacks) as well as the per-run resources
//! (queues, worker threads, camera sessions, the bidirectional stream)
//! that are created by `start_streaming_stereo` and torn down by
//! `stop_streaming`. One `Session` value is meant to live for the
//! lifetime of the host process and be started/stopped many times.
//!
//! Every public method returns an `AivStatus` (or `Result<T, AivStatus>`
//! for the query operations that produce data); internal plumbing uses
//! `Result<T, AivError>` and `?` throughout, converging to a status only
//! at this boundary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::camera::{CameraCatalog, CameraSession, GstCameraCatalog};
use crate::error::{AivError, AivStatus};
use crate::pipeline::{Callbacks, EncoderWorker, ReceiveWorker, SendWorker, SharedConfig};
use crate::queue::SpscQueue;
use crate::rpc::RpcChannel;
use crate::types::{CameraParams, CaptureConfig, DetectionResult, EncodedPacket, JpegConfig, RawFrame, Role};

const RAW_QUEUE_CAPACITY: usize = 4;
const ENCODED_QUEUE_CAPACITY: usize = 3;
const OUTBOUND_CHANNEL_CAPACITY: usize = 8;

/// The process-scoped RPC channel and camera catalog, created by `init`
/// and reused across every start/stop cycle until `shutdown`.
struct ClientHandle {
    channel: RpcChannel,
    catalog: Arc<dyn CameraCatalog>,
}

#[derive(Clone)]
struct Assignment {
    camera_id: String,
    capture: CaptureConfig,
}

/// Per-run resources, live only between `start_streaming_stereo` and
/// `stop_streaming`.
struct StreamingHandles {
    cameras: HashMap<Role, CameraSession>,
    encoders: Vec<EncoderWorker>,
    sender: SendWorker,
    receiver: ReceiveWorker,
}

#[derive(Serialize)]
struct CameraListingJson {
    id: String,
    position: i32,
}

pub struct Session {
    client: RwLock<Option<ClientHandle>>,
    callbacks: Arc<Callbacks>,
    shared: Arc<SharedConfig>,
    jpeg_config: Mutex<JpegConfig>,
    assignments: RwLock<HashMap<Role, Assignment>>,
    running: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
    streaming: Mutex<Option<StreamingHandles>>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            client: RwLock::new(None),
            callbacks: Arc::new(Callbacks::default()),
            shared: Arc::new(SharedConfig::new()),
            jpeg_config: Mutex::new(JpegConfig::default()),
            assignments: RwLock::new(HashMap::new()),
            running: Arc::new(AtomicBool::new(false)),
            connected: Arc::new(AtomicBool::new(false)),
            streaming: Mutex::new(None),
        }
    }

    /// Opens the process-scoped gRPC channel and camera manager. Does not
    /// start streaming.
    pub fn init(&self, target: &str) -> AivStatus {
        self.init_with_catalog_result(target, None).status_of()
    }

    /// Test/embedding hook: inject a `CameraCatalog` implementation (e.g.
    /// `StaticCameraCatalog`) instead of probing real hardware via
    /// `GstCameraCatalog`.
    pub fn init_with_catalog(&self, target: &str, catalog: Arc<dyn CameraCatalog>) -> AivStatus {
        self.init_with_catalog_result(target, Some(catalog)).status_of()
    }

    fn init_with_catalog_result(
        &self,
        target: &str,
        catalog: Option<Arc<dyn CameraCatalog>>,
    ) -> Result<(), AivError> {
        if target.is_empty() {
            return Err(AivError::InvalidArg("grpc target must not be empty".into()));
        }
        if self.running.load(Ordering::Acquire) {
            return Err(AivError::AlreadyRunning);
        }

        let channel = RpcChannel::connect(target)?;
        let catalog = match catalog {
            Some(c) => c,
            None => Arc::new(GstCameraCatalog::new()?) as Arc<dyn CameraCatalog>,
        };

        *self.client.write() = Some(ClientHandle { channel, catalog });
        info!(target = %target, "vision session initialized");
        Ok(())
    }

    /// Stops streaming (if running) and releases the channel, stub, and
    /// camera manager.
    pub fn shutdown(&self) -> AivStatus {
        self.stop_streaming();
        *self.client.write() = None;
        AivStatus::Ok
    }

    #[allow(clippy::type_complexity)]
    pub fn set_callbacks(
        &self,
        on_result: Option<Box<dyn Fn(DetectionResult) + Send + Sync>>,
        on_error: Option<Box<dyn Fn(AivStatus, String) + Send + Sync>>,
        on_frame_sent: Option<Box<dyn Fn(String, u64, f64) + Send + Sync>>,
    ) -> AivStatus {
        *self.callbacks.on_result.write() = on_result;
        *self.callbacks.on_error.write() = on_error;
        *self.callbacks.on_frame_sent.write() = on_frame_sent;
        AivStatus::Ok
    }

    /// Clamps `quality` into `[1, 100]` (`0`/negative maps to the default
    /// 70); `width`/`height` are reserved and are recorded but never
    /// consulted to resample a frame.
    pub fn set_jpeg_config(&self, width: u32, height: u32, quality: i32) -> AivStatus {
        let quality = JpegConfig::clamp_quality(quality);
        *self.jpeg_config.lock() = JpegConfig { width, height, quality };
        self.shared.jpeg_quality.store(quality, Ordering::Relaxed);
        AivStatus::Ok
    }

    pub fn jpeg_config(&self) -> JpegConfig {
        *self.jpeg_config.lock()
    }

    /// No validation: a negative threshold is a legal "no filtering" value.
    pub fn set_score_threshold(&self, threshold: f32) -> AivStatus {
        self.shared.set_score_threshold(threshold);
        AivStatus::Ok
    }

    pub fn set_image_id_prefix(&self, prefix: &str) -> AivStatus {
        if prefix.is_empty() {
            return AivStatus::InvalidArg;
        }
        *self.shared.image_prefix.write() = prefix.to_string();
        AivStatus::Ok
    }

    pub fn set_stereo_stream_base_id(&self, base: &str) -> AivStatus {
        if base.is_empty() {
            return AivStatus::InvalidArg;
        }
        *self.shared.stream_base.write() = base.to_string();
        AivStatus::Ok
    }

    /// Overwrites any prior assignment for the same role.
    pub fn set_camera_for_role(&self, role: Role, camera_id: &str, config: CaptureConfig) -> AivStatus {
        if camera_id.is_empty() {
            return AivStatus::InvalidArg;
        }
        self.assignments.write().insert(
            role,
            Assignment { camera_id: camera_id.to_string(), capture: config.resolved() },
        );
        self.shared.set_camera_id(role, camera_id.to_string());
        AivStatus::Ok
    }

    /// JSON array of `{"id": "...", "position": N}`, `position == -1` when
    /// the vendor stereo-position tag is absent.
    pub fn enumerate_cameras(&self) -> Result<String, AivStatus> {
        let client = self.client.read();
        let client = client.as_ref().ok_or(AivStatus::NotInitialized)?;
        let listings = client.catalog.enumerate().map_err(|e| e.status())?;
        let json: Vec<CameraListingJson> = listings
            .into_iter()
            .map(|c| CameraListingJson { id: c.id, position: c.position })
            .collect();
        serde_json::to_string(&json).map_err(|_| AivStatus::Internal)
    }

    pub fn get_camera_id_by_position(&self, position: i32) -> Result<String, AivStatus> {
        let client = self.client.read();
        let client = client.as_ref().ok_or(AivStatus::NotInitialized)?;
        client
            .catalog
            .find_by_position(position)
            .map_err(|e| e.status())?
            .ok_or(AivStatus::CameraOpen)
    }

    pub fn get_camera_params(&self, camera_id: &str) -> Result<CameraParams, AivStatus> {
        let client = self.client.read();
        let client = client.as_ref().ok_or(AivStatus::NotInitialized)?;
        client.catalog.params(camera_id).map_err(|e| e.status())
    }

    pub fn is_streaming(&self) -> bool {
        self.running.load(Ordering::Acquire) && self.connected.load(Ordering::Acquire)
    }

    /// Opens the cameras assigned via `set_camera_for_role`, the
    /// bidirectional stream, and the four worker threads. Any failure
    /// unwinds everything already acquired and leaves `running` cleared.
    pub fn start_streaming_stereo(&self) -> AivStatus {
        if self.running.load(Ordering::Acquire) {
            return AivStatus::AlreadyRunning;
        }

        let assignments = self.assignments.read().clone();
        if assignments.is_empty() {
            return AivStatus::InvalidArg;
        }

        let grpc_client = {
            let client = self.client.read();
            match client.as_ref() {
                Some(c) => c.channel.client(),
                None => return AivStatus::NotInitialized,
            }
        };

        self.running.store(true, Ordering::Release);
        self.connected.store(true, Ordering::Release);

        match self.start_inner(assignments, grpc_client) {
            Ok(handles) => {
                *self.streaming.lock() = Some(handles);
                AivStatus::Ok
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                self.connected.store(false, Ordering::Release);
                error!(error = %e, "failed to start stereo streaming, unwinding");
                e.status()
            }
        }
    }

    fn start_inner(
        &self,
        assignments: HashMap<Role, Assignment>,
        grpc_client: crate::rpc::VisionClient<tonic::transport::Channel>,
    ) -> Result<StreamingHandles, AivError> {
        let mut raw_queues: HashMap<Role, Arc<SpscQueue<RawFrame>>> = HashMap::new();
        let mut encoded_queues: HashMap<Role, Arc<SpscQueue<EncodedPacket>>> = HashMap::new();
        for role in assignments.keys() {
            raw_queues.insert(*role, Arc::new(SpscQueue::new(RAW_QUEUE_CAPACITY)));
            encoded_queues.insert(*role, Arc::new(SpscQueue::new(ENCODED_QUEUE_CAPACITY)));
        }

        let mut cameras: HashMap<Role, CameraSession> = HashMap::new();
        for (role, assignment) in &assignments {
            let queue = Arc::clone(&raw_queues[role]);
            let mut camera = CameraSession::new(
                *role,
                assignment.camera_id.clone(),
                assignment.capture,
                queue,
            )?;
            if let Err(e) = camera.start() {
                // Unwind cameras opened earlier this call; `cameras` drops
                // here too, which stops each one in turn via its `Drop` impl.
                return Err(e);
            }
            cameras.insert(*role, camera);
        }

        let (outbound_tx, outbound_rx) = tokio::sync::mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);

        let mut encoders = Vec::with_capacity(assignments.len());
        for role in assignments.keys() {
            encoders.push(EncoderWorker::spawn(
                *role,
                Arc::clone(&raw_queues[role]),
                Arc::clone(&encoded_queues[role]),
                Arc::clone(&self.shared),
                Arc::clone(&self.callbacks),
            ));
        }

        let empty_queue = || Arc::new(SpscQueue::new(ENCODED_QUEUE_CAPACITY));
        let left_queue = encoded_queues.get(&Role::Left).cloned().unwrap_or_else(empty_queue);
        let right_queue = encoded_queues.get(&Role::Right).cloned().unwrap_or_else(empty_queue);

        let sender = SendWorker::spawn(
            left_queue,
            right_queue,
            outbound_tx,
            Arc::clone(&self.shared),
            Arc::clone(&self.callbacks),
            Arc::clone(&self.running),
        );

        let receiver = ReceiveWorker::spawn(
            grpc_client,
            outbound_rx,
            Arc::clone(&self.shared),
            Arc::clone(&self.callbacks),
            Arc::clone(&self.running),
            Arc::clone(&self.connected),
        );

        Ok(StreamingHandles { cameras, encoders, sender, receiver })
    }

    /// Idempotent: a second call while already stopped returns
    /// `ERR_NOT_RUNNING` rather than re-running teardown.
    pub fn stop_streaming(&self) -> AivStatus {
        if !self.running.swap(false, Ordering::Release) {
            return AivStatus::NotRunning;
        }
        self.connected.store(false, Ordering::Release);

        if let Some(mut handles) = self.streaming.lock().take() {
            for camera in handles.cameras.values_mut() {
                camera.stop();
            }
            // Cameras stop first, then send, then receive, then encoders.
            // The encoders are the producers furthest from the network and
            // are safe to drain last.
            handles.sender.stop();
            handles.receiver.join();
            for mut encoder in handles.encoders.drain(..) {
                encoder.stop();
            }
        } else {
            warn!("stop_streaming: running was set but no streaming handles were present");
        }

        AivStatus::Ok
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop_streaming();
    }
}

trait AivResultExt {
    fn status_of(&self) -> AivStatus;
}

impl AivResultExt for Result<(), AivError> {
    fn status_of(&self) -> AivStatus {
        match self {
            Ok(()) => AivStatus::Ok,
            Err(e) => e.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::StaticCameraCatalog;
    use crate::types::CameraListing;

    fn catalog() -> Arc<dyn CameraCatalog> {
        Arc::new(StaticCameraCatalog::new(vec![
            CameraListing { id: "cam0".into(), position: 0 },
            CameraListing { id: "cam1".into(), position: 1 },
        ]))
    }

    #[test]
    fn start_without_cameras_is_invalid_arg() {
        let session = Session::new();
        assert_eq!(session.init_with_catalog("127.0.0.1:1", catalog()), AivStatus::Ok);
        assert_eq!(session.start_streaming_stereo(), AivStatus::InvalidArg);
        assert!(!session.is_streaming());
    }

    #[test]
    fn stop_streaming_twice_is_idempotent() {
        let session = Session::new();
        assert_eq!(session.stop_streaming(), AivStatus::NotRunning);
        assert_eq!(session.stop_streaming(), AivStatus::NotRunning);
    }

    #[test]
    fn jpeg_quality_clamps_through_set_jpeg_config() {
        let session = Session::new();
        session.set_jpeg_config(0, 0, 0);
        assert_eq!(session.jpeg_config().quality, 70);
        session.set_jpeg_config(0, 0, 250);
        assert_eq!(session.jpeg_config().quality, 100);
        session.set_jpeg_config(0, 0, -4);
        assert_eq!(session.jpeg_config().quality, 70);
        session.set_jpeg_config(0, 0, 55);
        assert_eq!(session.jpeg_config().quality, 55);
    }

    #[test]
    fn enumerate_cameras_without_init_is_not_initialized() {
        let session = Session::new();
        assert_eq!(session.enumerate_cameras().unwrap_err(), AivStatus::NotInitialized);
    }

    #[test]
    fn enumerate_cameras_returns_json_array() {
        let session = Session::new();
        session.init_with_catalog("127.0.0.1:1", catalog());
        let json = session.enumerate_cameras().unwrap();
        assert!(json.contains("\"id\":\"cam0\""));
        assert!(json.contains("\"position\":1"));
    }

    #[test]
    fn get_camera_id_by_position_resolves_and_misses() {
        let session = Session::new();
        session.init_with_catalog("127.0.0.1:1", catalog());
        assert_eq!(session.get_camera_id_by_position(1).unwrap(), "cam1");
        assert_eq!(session.get_camera_id_by_position(9).unwrap_err(), AivStatus::CameraOpen);
    }

    #[test]
    fn set_camera_for_role_rejects_empty_id() {
        let session = Session::new();
        assert_eq!(
            session.set_camera_for_role(Role::Left, "", CaptureConfig::default()),
            AivStatus::InvalidArg
        );
    }

    #[test]
    fn start_twice_is_already_running() {
        // Exercised against a target that never resolves; init succeeds
        // (connect_lazy defers dialing) but streaming is never actually
        // attempted here - only the lifecycle guard is under test.
        let session = Session::new();
        session.init_with_catalog("127.0.0.1:1", catalog());
        session
            .running
            .store(true, Ordering::Release);
        assert_eq!(session.start_streaming_stereo(), AivStatus::AlreadyRunning);
        session.running.store(false, Ordering::Release);
    }
}
