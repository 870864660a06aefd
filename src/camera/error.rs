use std::time::Duration;

use thiserror::Error;

use crate::error::ErrorKind;

/// Camera subsystem errors.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no camera found")]
    NoDevice,

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("constraints not satisfiable: {0}")]
    Overconstrained(String),

    #[error("no frames received within {0:?}")]
    AcquisitionTimeout(Duration),

    #[error("stream acquisition failed: {0}")]
    Stream(String),

    #[error("frame encoding failed: {0}")]
    Encode(String),
}

impl CameraError {
    /// Every acquisition failure collapses into one condition for the host.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::CameraUnavailable
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, CameraError>;
