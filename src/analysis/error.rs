use thiserror::Error;

use crate::error::ErrorKind;

/// Failures of the remote analysis service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("{0} environment variable not set")]
    Credential(&'static str),
}

impl ServiceError {
    /// Where this failure lands in the outcome taxonomy.
    ///
    /// A missing credential means the service cannot be reached at all, so
    /// it is reported like a transport failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) | Self::Credential(_) => ErrorKind::NetworkError,
            Self::Malformed(_) => ErrorKind::MalformedResponse,
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_onto_outcome_kinds() {
        assert_eq!(
            ServiceError::Transport("reset".into()).kind(),
            ErrorKind::NetworkError
        );
        assert_eq!(
            ServiceError::Credential("GEMINI_API_KEY").kind(),
            ErrorKind::NetworkError
        );
        assert_eq!(
            ServiceError::Malformed("eof".into()).kind(),
            ErrorKind::MalformedResponse
        );
    }

    #[test]
    fn json_errors_are_malformed() {
        let err: ServiceError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ServiceError::Malformed(_)));
    }

    #[test]
    fn credential_error_names_the_variable() {
        let err = ServiceError::Credential("GEMINI_API_KEY");
        assert_eq!(err.to_string(), "GEMINI_API_KEY environment variable not set");
    }
}
