use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Front camera, facing the user.
    User,
    /// Rear camera, facing the scene.
    Environment,
}

/// Frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either side is zero, i.e. the device is not delivering
    /// real frames yet.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Video-only stream request.
///
/// `None` fields leave the choice to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConstraints {
    pub facing_mode: Option<FacingMode>,
    pub resolution: Option<Resolution>,
}

impl StreamConstraints {
    /// Rear camera at the given resolution.
    pub fn preferred(resolution: Resolution) -> Self {
        Self {
            facing_mode: Some(FacingMode::Environment),
            resolution: Some(resolution),
        }
    }

    /// Any camera at its default resolution.
    pub fn minimal() -> Self {
        Self {
            facing_mode: None,
            resolution: None,
        }
    }

    pub fn is_minimal(&self) -> bool {
        self.facing_mode.is_none() && self.resolution.is_none()
    }
}

/// Lifecycle of a camera session.
///
/// `Uninitialized → Requesting → Streaming → Captured`, with `Failed`
/// reachable from `Requesting`. `Captured` and `Failed` only leave through
/// `reset()` or a fresh `initialize()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapturePhase {
    Uninitialized,
    Requesting,
    Streaming,
    Captured,
    Failed,
}

impl CapturePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Captured | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Requesting => "requesting",
            Self::Streaming => "streaming",
            Self::Captured => "captured",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CapturePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the host renders: the phase plus the message of a failed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraStatus {
    pub phase: CapturePhase,
    pub error: Option<String>,
}

impl CameraStatus {
    pub fn new(phase: CapturePhase) -> Self {
        Self { phase, error: None }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            phase: CapturePhase::Failed,
            error: Some(message.into()),
        }
    }
}

/// An encoded still image taken from the live feed.
///
/// The bytes are shared, so clones are cheap and the host can keep
/// displaying the photo while it is being analysed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StillImage {
    bytes: Arc<[u8]>,
    resolution: Resolution,
}

impl StillImage {
    pub fn new(bytes: impl Into<Arc<[u8]>>, resolution: Resolution) -> Self {
        Self {
            bytes: bytes.into(),
            resolution,
        }
    }

    /// Encoded JPEG bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the encoded bytes.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }
}
