// Command handlers for the recipe-cam binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};

use recipe_cam_lib::analysis::types::AnalysisOutcome;
use recipe_cam_lib::camera::types::CapturePhase;
use recipe_cam_lib::config::AppConfig;

/// Run one scan and print the outcome.
pub async fn scan(
    config: &AppConfig,
    photo: Option<PathBuf>,
    favorites: &[String],
) -> anyhow::Result<()> {
    let device = recipe_cam_lib::create_media_device(photo);
    let service = recipe_cam_lib::create_analysis_service(config);
    let pipeline = recipe_cam_lib::build_pipeline(
        config,
        device,
        service,
        Arc::new(|outcome: &AnalysisOutcome| match serde_json::to_string_pretty(outcome) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::warn!("failed to render outcome: {e}"),
        }),
    );

    if pipeline.start().await != CapturePhase::Streaming {
        let status = pipeline.controller().status();
        bail!(
            "camera unavailable: {}",
            status.error.unwrap_or_else(|| status.phase.to_string())
        );
    }

    let Some(outcome) = pipeline.shoot().await else {
        pipeline.shutdown();
        bail!("camera is not ready to take a photo");
    };
    pipeline.shutdown();

    if !favorites.is_empty() {
        toggle_favorites(config, &outcome, favorites)?;
    }
    Ok(())
}

fn toggle_favorites(
    config: &AppConfig,
    outcome: &AnalysisOutcome,
    ids: &[String],
) -> anyhow::Result<()> {
    let store = recipe_cam_lib::open_favorites(config);
    for id in ids {
        match outcome.recipes().iter().find(|r| r.id == *id) {
            Some(recipe) => {
                let now = store.toggle(recipe);
                eprintln!(
                    "{} {}",
                    if now { "favorited" } else { "unfavorited" },
                    recipe.name
                );
            }
            None => eprintln!("no recipe with id '{id}' in this result"),
        }
    }
    store
        .flush()
        .with_context(|| format!("saving favorites to {}", config.favorites_path.display()))?;
    Ok(())
}

/// Print saved favorites as JSON.
pub fn list_favorites(config: &AppConfig) -> anyhow::Result<()> {
    let store = recipe_cam_lib::open_favorites(config);
    let json = serde_json::to_string_pretty(&store.list())?;
    println!("{json}");
    Ok(())
}
