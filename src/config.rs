use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::analysis::gemini::DEFAULT_MODEL;
use crate::analysis::orchestrator::DEFAULT_DEADLINE;
use crate::camera::controller::ControllerConfig;
use crate::camera::types::Resolution;

pub const DEFAULT_FAVORITES_PATH: &str = "./recipe-cam-favorites.json";

/// Runtime configuration, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub deadline: Duration,
    pub target_resolution: Resolution,
    pub jpeg_quality: u8,
    pub first_frame_timeout: Duration,
    pub cancel_on_timeout: bool,
    pub gemini_model: String,
    pub favorites_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        let controller = ControllerConfig::default();
        Self {
            deadline: DEFAULT_DEADLINE,
            target_resolution: controller.target_resolution,
            jpeg_quality: controller.jpeg_quality,
            first_frame_timeout: controller.first_frame_timeout,
            cancel_on_timeout: false,
            gemini_model: DEFAULT_MODEL.to_owned(),
            favorites_path: PathBuf::from(DEFAULT_FAVORITES_PATH),
        }
    }
}

impl AppConfig {
    /// Load configuration from `RECIPE_CAM_*` environment variables.
    ///
    /// Missing or unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let deadline = parse_or(&lookup, "RECIPE_CAM_DEADLINE_MS")
            .map_or(defaults.deadline, Duration::from_millis);
        let width = parse_or(&lookup, "RECIPE_CAM_TARGET_WIDTH")
            .unwrap_or(defaults.target_resolution.width);
        let height = parse_or(&lookup, "RECIPE_CAM_TARGET_HEIGHT")
            .unwrap_or(defaults.target_resolution.height);
        let jpeg_quality = parse_or::<u32>(&lookup, "RECIPE_CAM_JPEG_QUALITY")
            .map_or(defaults.jpeg_quality, |q| q.clamp(1, 100) as u8);
        let first_frame_timeout = parse_or(&lookup, "RECIPE_CAM_FIRST_FRAME_TIMEOUT_MS")
            .map_or(defaults.first_frame_timeout, Duration::from_millis);
        let cancel_on_timeout = lookup("RECIPE_CAM_CANCEL_ON_TIMEOUT")
            .and_then(|v| parse_flag(&v))
            .unwrap_or(defaults.cancel_on_timeout);
        let gemini_model = non_blank(&lookup, "RECIPE_CAM_GEMINI_MODEL")
            .unwrap_or(defaults.gemini_model);
        let favorites_path = non_blank(&lookup, "RECIPE_CAM_FAVORITES_PATH")
            .map_or(defaults.favorites_path, PathBuf::from);

        Self {
            deadline,
            target_resolution: Resolution::new(width, height),
            jpeg_quality,
            first_frame_timeout,
            cancel_on_timeout,
            gemini_model,
            favorites_path,
        }
    }

    /// Camera controller tuning derived from this configuration.
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            target_resolution: self.target_resolution,
            jpeg_quality: self.jpeg_quality,
            first_frame_timeout: self.first_frame_timeout,
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("ignoring unparseable {key}={raw:?}");
            None
        }
    }
}

fn non_blank(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
