//! Native streaming core for a stereo vision edge client.
//!
//! Two cameras are captured, converted to canonical 4:2:0 planar frames,
//! compressed to baseline JPEG, and multiplexed onto a single bidirectional
//! gRPC stream; detection results read back off the same stream are
//! dispatched to a host-provided callback.
//!
//! ```no_run
//! use stereo_vision_core::{Session, Role, CaptureConfig};
//!
//! let session = Session::new();
//! session.init("127.0.0.1:50051");
//! session.set_camera_for_role(Role::Left, "/dev/video0", CaptureConfig::default());
//! session.start_streaming_stereo();
//! ```

pub mod camera;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod queue;
pub mod rpc;
pub mod session;
pub mod types;

pub use error::{AivError, AivResult, AivStatus};
pub use queue::SpscQueue;
pub use session::Session;
pub use types::{
    CameraListing, CameraParams, CaptureConfig, DetectionResult, EncodedPacket, Extrinsics,
    Intrinsics, JpegConfig, RawFrame, Rect, Role,
};
