//! Crate-wide status codes and error type.
//!
//! Mirrors the `AIV_Status` enum of the host binding surface: synchronous
//! API failures return a status code, asynchronous failures are reported to
//! `on_error` and never returned from these APIs.

use thiserror::Error;

/// Status codes surfaced across the public API, matching the host binding's
/// `AIV_Status` values exactly so a future C-ABI shim can map 1:1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum AivStatus {
    Ok = 0,
    InvalidArg = -1,
    NotInitialized = -2,
    AlreadyRunning = -3,
    NotRunning = -4,
    CameraOpen = -5,
    CameraParam = -6,
    Grpc = -7,
    Internal = -9,
}

#[derive(Debug, Error)]
pub enum AivError {
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    #[error("not initialized")]
    NotInitialized,

    #[error("already running")]
    AlreadyRunning,

    #[error("not running")]
    NotRunning,

    #[error("camera open failed: {0}")]
    CameraOpen(String),

    #[error("camera parameter missing: {0}")]
    CameraParam(String),

    #[error("{0}")]
    Grpc(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AivError {
    pub fn status(&self) -> AivStatus {
        match self {
            AivError::InvalidArg(_) => AivStatus::InvalidArg,
            AivError::NotInitialized => AivStatus::NotInitialized,
            AivError::AlreadyRunning => AivStatus::AlreadyRunning,
            AivError::NotRunning => AivStatus::NotRunning,
            AivError::CameraOpen(_) => AivStatus::CameraOpen,
            AivError::CameraParam(_) => AivStatus::CameraParam,
            AivError::Grpc(_) => AivStatus::Grpc,
            AivError::Internal(_) => AivStatus::Internal,
        }
    }
}

impl From<&AivError> for AivStatus {
    fn from(e: &AivError) -> Self {
        e.status()
    }
}

impl From<gstreamer::glib::Error> for AivError {
    fn from(e: gstreamer::glib::Error) -> Self {
        AivError::CameraOpen(e.to_string())
    }
}

impl From<gstreamer::glib::BoolError> for AivError {
    fn from(e: gstreamer::glib::BoolError) -> Self {
        AivError::CameraOpen(e.to_string())
    }
}

impl From<tonic::transport::Error> for AivError {
    fn from(e: tonic::transport::Error) -> Self {
        AivError::Grpc(e.to_string())
    }
}

impl From<tonic::Status> for AivError {
    fn from(s: tonic::Status) -> Self {
        AivError::Grpc(s.message().to_string())
    }
}

pub type AivResult<T> = Result<T, AivError>;
