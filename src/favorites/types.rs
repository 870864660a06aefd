use serde::{Deserialize, Serialize};

use crate::analysis::types::Recipe;

/// Persisted favorites, in the order they were added.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FavoritesFile {
    #[serde(default)]
    pub recipes: Vec<Recipe>,
}

impl FavoritesFile {
    pub fn position(&self, recipe_id: &str) -> Option<usize> {
        self.recipes.iter().position(|r| r.id == recipe_id)
    }

    pub fn contains(&self, recipe_id: &str) -> bool {
        self.position(recipe_id).is_some()
    }
}
