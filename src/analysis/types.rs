use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::camera::types::StillImage;
use crate::error::ErrorKind;

/// An ingredient recognised in the photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientInfo {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutrition: Option<String>,
    /// Kilocalories per 100 g.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// A recipe suggested for the recognised ingredients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub prep_time: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<String>,
}

/// The document returned by the analysis service.
///
/// Both collections are required; a payload missing either does not
/// deserialise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub ingredients: Vec<IngredientInfo>,
    pub recipes: Vec<Recipe>,
}

/// One photo to analyse, stamped with its creation time for deadline
/// accounting. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    image: Arc<[u8]>,
    created_at: Instant,
}

impl AnalysisRequest {
    pub fn new(image: impl Into<Arc<[u8]>>) -> Self {
        Self {
            image: image.into(),
            created_at: Instant::now(),
        }
    }

    pub fn from_still(still: &StillImage) -> Self {
        Self::new(still.shared_bytes())
    }

    /// Encoded image bytes.
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub(crate) fn shared_image(&self) -> Arc<[u8]> {
        Arc::clone(&self.image)
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }
}

/// Terminal result of one orchestration session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Success {
        ingredients: Vec<IngredientInfo>,
        recipes: Vec<Recipe>,
    },
    Failure {
        reason: ErrorKind,
        message: String,
    },
}

impl AnalysisOutcome {
    pub fn success(result: AnalysisResult) -> Self {
        Self::Success {
            ingredients: result.ingredients,
            recipes: result.recipes,
        }
    }

    /// Failure carrying the standard message for `reason`.
    pub fn failure(reason: ErrorKind) -> Self {
        Self::Failure {
            reason,
            message: reason.user_message().to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { reason, .. } => Some(*reason),
        }
    }

    pub fn recipes(&self) -> &[Recipe] {
        match self {
            Self::Success { recipes, .. } => recipes,
            Self::Failure { .. } => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::types::Resolution;
    use crate::error::TIMEOUT_MESSAGE;

    const DOCUMENT: &str = r#"{
        "ingredients": [
            {"name": "番茄", "description": "新鲜的红番茄", "nutrition": "维生素C", "calories": 18},
            {"name": "鸡蛋", "description": "两枚鸡蛋"}
        ],
        "recipes": [{
            "id": "tomato-egg",
            "name": "番茄炒蛋",
            "description": "家常快手菜",
            "difficulty": "easy",
            "prepTime": "15分钟",
            "ingredients": ["番茄 2个", "鸡蛋 3个"],
            "instructions": ["打散鸡蛋", "炒番茄", "混合翻炒"],
            "calories": "约250千卡"
        }]
    }"#;

    #[test]
    fn document_deserialises_with_optional_fields() {
        let result: AnalysisResult = serde_json::from_str(DOCUMENT).unwrap();
        assert_eq!(result.ingredients.len(), 2);
        assert_eq!(result.ingredients[0].calories, Some(18));
        assert_eq!(result.ingredients[1].nutrition, None);

        let recipe = &result.recipes[0];
        assert_eq!(recipe.difficulty, Difficulty::Easy);
        assert_eq!(recipe.prep_time, "15分钟");
        assert_eq!(recipe.instructions.len(), 3);
    }

    #[test]
    fn document_without_recipes_is_rejected() {
        let json = r#"{"ingredients": []}"#;
        assert!(serde_json::from_str::<AnalysisResult>(json).is_err());
    }

    #[test]
    fn unknown_difficulty_is_rejected() {
        let json = DOCUMENT.replace("\"easy\"", "\"extreme\"");
        assert!(serde_json::from_str::<AnalysisResult>(&json).is_err());
    }

    #[test]
    fn success_outcome_passes_collections_through() {
        let result: AnalysisResult = serde_json::from_str(DOCUMENT).unwrap();
        let outcome = AnalysisOutcome::success(result.clone());
        assert!(outcome.is_success());
        assert_eq!(outcome.failure_kind(), None);
        assert_eq!(outcome.recipes(), result.recipes.as_slice());
        match outcome {
            AnalysisOutcome::Success {
                ingredients,
                recipes,
            } => {
                assert_eq!(ingredients, result.ingredients);
                assert_eq!(recipes, result.recipes);
            }
            AnalysisOutcome::Failure { .. } => panic!("expected success"),
        }
    }

    #[test]
    fn failure_outcome_serialises_with_reason_and_message() {
        let outcome = AnalysisOutcome::failure(ErrorKind::Timeout);
        assert_eq!(outcome.failure_kind(), Some(ErrorKind::Timeout));
        assert!(outcome.recipes().is_empty());

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["reason"], "timeout");
        assert_eq!(json["message"], TIMEOUT_MESSAGE);
    }

    #[test]
    fn request_shares_the_still_bytes() {
        let still = StillImage::new(vec![1, 2, 3], Resolution::new(1, 1));
        let request = AnalysisRequest::from_still(&still);
        assert_eq!(request.image(), &[1, 2, 3]);
        assert!(Arc::ptr_eq(&request.shared_image(), &still.shared_bytes()));
    }
}
