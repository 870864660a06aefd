use async_trait::async_trait;

use crate::analysis::error::{Result, ServiceError};
use crate::analysis::types::AnalysisResult;

/// Remote multimodal analysis: one photo in, ingredients and recipes out.
///
/// Implementations validate the document themselves and report any schema
/// violation as `ServiceError::Malformed`.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Short service label for logs.
    fn name(&self) -> &str;

    async fn analyze(&self, image: &[u8]) -> Result<AnalysisResult>;
}

/// Parse the JSON document produced by a service.
///
/// Blank text counts as malformed rather than as an empty result.
pub fn parse_document(text: &str) -> Result<AnalysisResult> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Malformed("empty response".to_string()));
    }
    Ok(serde_json::from_str(trimmed)?)
}
