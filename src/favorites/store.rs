use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::analysis::types::Recipe;
use crate::favorites::error::Result;
use crate::favorites::kv::KeyValueStore;
use crate::favorites::types::FavoritesFile;

/// Key under which favorites live in the key-value store.
pub const FAVORITES_KEY: &str = "favorites";

const SAVE_DEBOUNCE: Duration = Duration::from_millis(500);

/// Favorite recipes with load-on-start and debounced save-on-change.
pub struct FavoritesStore {
    kv: Arc<dyn KeyValueStore>,
    data: Mutex<FavoritesFile>,
    save_notify: Notify,
    is_dirty: AtomicBool,
}

impl FavoritesStore {
    /// Create a store, loading whatever the key-value store already holds.
    ///
    /// Unreadable data is logged and replaced by an empty list.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        let data = Self::load(kv.as_ref()).unwrap_or_else(|e| {
            tracing::warn!("failed to load favorites, starting empty: {e}");
            FavoritesFile::default()
        });
        tracing::debug!("loaded {} favorite(s)", data.recipes.len());
        Self {
            kv,
            data: Mutex::new(data),
            save_notify: Notify::new(),
            is_dirty: AtomicBool::new(false),
        }
    }

    /// Read favorites from the key-value store. A missing key is an empty list.
    pub fn load(kv: &dyn KeyValueStore) -> Result<FavoritesFile> {
        match kv.get(FAVORITES_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(FavoritesFile::default()),
        }
    }

    /// Persist the current favorites immediately.
    pub fn save(&self) -> Result<()> {
        let data = self.data.lock().clone();
        let json = serde_json::to_string(&data)?;
        self.kv.set(FAVORITES_KEY, json)
    }

    /// Save now if a change is still waiting for the debounce task.
    pub fn flush(&self) -> Result<()> {
        if self.is_dirty.swap(false, Ordering::AcqRel) {
            self.save()?;
        }
        Ok(())
    }

    /// Add the recipe if absent, remove it if present.
    ///
    /// Returns whether the recipe is a favorite afterwards.
    pub fn toggle(&self, recipe: &Recipe) -> bool {
        let now_favorite = {
            let mut data = self.data.lock();
            match data.position(&recipe.id) {
                Some(index) => {
                    data.recipes.remove(index);
                    false
                }
                None => {
                    data.recipes.push(recipe.clone());
                    true
                }
            }
        };
        tracing::info!(recipe = %recipe.id, favorite = now_favorite, "favorite toggled");
        self.mark_dirty();
        now_favorite
    }

    /// Remove a favorite by id. Returns false if it was not saved.
    pub fn remove(&self, recipe_id: &str) -> bool {
        let removed = {
            let mut data = self.data.lock();
            match data.position(recipe_id) {
                Some(index) => {
                    data.recipes.remove(index);
                    true
                }
                None => false,
            }
        };
        if removed {
            self.mark_dirty();
        }
        removed
    }

    pub fn is_favorite(&self, recipe_id: &str) -> bool {
        self.data.lock().contains(recipe_id)
    }

    /// Favorites in the order they were added.
    pub fn list(&self) -> Vec<Recipe> {
        self.data.lock().recipes.clone()
    }

    fn mark_dirty(&self) {
        self.is_dirty.store(true, Ordering::Release);
        self.save_notify.notify_one();
    }

    /// Start the debounce task: wait for a change, sleep 500ms, then save.
    ///
    /// The dirty flag covers notifications that arrive while a save is in
    /// progress.
    pub fn start_debounce_task(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                store.save_notify.notified().await;
                tokio::time::sleep(SAVE_DEBOUNCE).await;
                if store.is_dirty.swap(false, Ordering::AcqRel) {
                    if let Err(e) = store.save() {
                        tracing::warn!("failed to save favorites: {e}");
                    }
                }
            }
        })
    }
}
