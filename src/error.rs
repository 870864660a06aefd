use serde::Serialize;
use std::fmt;

/// Shown when the camera cannot be opened, whatever the cause.
pub const CAMERA_UNAVAILABLE_MESSAGE: &str = "无法访问摄像头，请确保已授予相机权限后重试。";

/// Shown when the analysis service answers with something unusable.
pub const MALFORMED_RESPONSE_MESSAGE: &str = "识别食材失败，请确保图片清晰并重试。";

/// Shown when the analysis service cannot be reached.
pub const NETWORK_ERROR_MESSAGE: &str = "网络请求失败，请检查网络连接后重试。";

/// Shown when the analysis deadline expires first.
pub const TIMEOUT_MESSAGE: &str = "分析时间过长，请检查网络后重试。";

/// Error taxonomy shared by the capture and analysis halves of the pipeline.
///
/// `CameraUnavailable` is surfaced through the camera status, the three
/// analysis kinds through a failed `AnalysisOutcome`. `CaptureUnready` is
/// never surfaced: a capture without a usable frame is a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CameraUnavailable,
    CaptureUnready,
    NetworkError,
    Timeout,
    MalformedResponse,
}

impl ErrorKind {
    /// Human-readable message for the host to display.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::CameraUnavailable => CAMERA_UNAVAILABLE_MESSAGE,
            // Never displayed, kept for completeness of the mapping.
            Self::CaptureUnready => "",
            Self::NetworkError => NETWORK_ERROR_MESSAGE,
            Self::Timeout => TIMEOUT_MESSAGE,
            Self::MalformedResponse => MALFORMED_RESPONSE_MESSAGE,
        }
    }

    /// Snake-case identifier, as serialised.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CameraUnavailable => "camera_unavailable",
            Self::CaptureUnready => "capture_unready",
            Self::NetworkError => "network_error",
            Self::Timeout => "timeout",
            Self::MalformedResponse => "malformed_response",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_kinds_have_distinct_messages() {
        let messages = [
            ErrorKind::NetworkError.user_message(),
            ErrorKind::Timeout.user_message(),
            ErrorKind::MalformedResponse.user_message(),
        ];
        assert!(messages.iter().all(|m| !m.is_empty()));
        assert_ne!(messages[0], messages[1]);
        assert_ne!(messages[1], messages[2]);
        assert_ne!(messages[0], messages[2]);
    }

    #[test]
    fn capture_unready_has_no_message() {
        assert!(ErrorKind::CaptureUnready.user_message().is_empty());
    }

    #[test]
    fn serialises_as_snake_case() {
        let json = serde_json::to_value(ErrorKind::MalformedResponse).unwrap();
        assert_eq!(json, "malformed_response");
        assert_eq!(ErrorKind::MalformedResponse.to_string(), "malformed_response");
    }
}
