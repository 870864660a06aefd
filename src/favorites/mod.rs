// Favorite recipes, persisted through a key-value collaborator.

pub mod error;
pub mod kv;
pub mod store;
pub mod types;
