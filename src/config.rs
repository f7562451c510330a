//! Feature configuration: engine construction knobs per screen.
//!
//! Defaults match the constants the demo app ships with. User overrides
//! live in `~/.config/edge-lens/config.json` (macOS:
//! `~/Library/Application Support/edge-lens/config.json`), and a handful
//! of environment variables take precedence over the file.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";

/// How the engine consumes its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunningMode {
    /// One still image per call.
    Image,
    /// Continuous camera frames, one call per analyzed frame.
    LiveStream,
}

/// When the engine handle is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPolicy {
    /// As soon as the session is attached.
    Eager,
    /// On the first submitted request.
    Lazy,
}

/// Geometry applied to a captured frame before it reaches a classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Preprocess {
    /// Stretch to exactly `width` x `height`, then rotate.
    Exact { width: u32, height: u32 },
    /// Scale uniformly so the longest side equals `longest_side`, then rotate.
    FitLongestSide { longest_side: u32 },
}

/// Image classifier / gesture recognizer construction options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierConfig {
    pub model_asset_path: String,
    pub running_mode: RunningMode,
    /// Candidates scoring below this are discarded before selection.
    pub score_threshold: f32,
    pub max_results: usize,
    pub load_policy: LoadPolicy,
    pub preprocess: Preprocess,
}

impl ClassifierConfig {
    /// "Take photo" screen: EfficientNet-Lite2, any result better than none.
    pub fn take_photo() -> Self {
        Self {
            model_asset_path: "efficientnet_lite2.tflite".to_string(),
            running_mode: RunningMode::Image,
            score_threshold: 0.1,
            max_results: 10,
            load_policy: LoadPolicy::Lazy,
            preprocess: Preprocess::Exact {
                width: 260,
                height: 260,
            },
        }
    }

    /// "Reaction gesture" screen: live-stream hand gesture recognizer.
    pub fn reaction_gesture() -> Self {
        Self {
            model_asset_path: "gesture_recognizer.task".to_string(),
            running_mode: RunningMode::LiveStream,
            score_threshold: 0.5,
            max_results: 1,
            load_policy: LoadPolicy::Lazy,
            preprocess: Preprocess::FitLongestSide { longest_side: 500 },
        }
    }
}

/// Local language model construction options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
    pub model_path: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Fixed seed for reproducible output; a fresh random seed when unset.
    #[serde(default)]
    pub random_seed: Option<u64>,
    pub load_policy: LoadPolicy,
}

impl GeneratorConfig {
    /// "Terrible poem" screen: Gemma 2 2B instruction-tuned, int8 CPU build.
    pub fn terrible_poem() -> Self {
        Self {
            model_path: "/data/local/tmp/gemma2-2b-it-cpu-int8.task".to_string(),
            max_tokens: 500,
            temperature: 1.0,
            random_seed: None,
            load_policy: LoadPolicy::Eager,
        }
    }

    /// The configured seed, or a new random one.
    pub fn resolve_seed(&self) -> u64 {
        self.random_seed.unwrap_or_else(rand::random)
    }
}

/// All feature sections plus session-wide switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LensConfig {
    pub take_photo: ClassifierConfig,
    pub reaction_gesture: ClassifierConfig,
    pub terrible_poem: GeneratorConfig,
    /// Drop results belonging to a superseded request.
    pub fence_stale_results: bool,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            take_photo: ClassifierConfig::take_photo(),
            reaction_gesture: ClassifierConfig::reaction_gesture(),
            terrible_poem: GeneratorConfig::terrible_poem(),
            fence_stale_results: true,
        }
    }
}

/// Path to the user config file, if the platform has a config directory.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("edge-lens").join(CONFIG_FILE))
}

/// Load the user config with environment overrides applied.
///
/// Missing file → defaults. Invalid file → warning + defaults.
pub fn load_config() -> LensConfig {
    let mut config = match config_path() {
        Some(path) => load_config_from(&path),
        None => LensConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

/// Load a config file without environment overrides.
///
/// Keys the file leaves out keep their defaults, inside feature sections
/// too: `{"takePhoto": {"scoreThreshold": 0.3}}` changes only that threshold.
pub fn load_config_from(path: &Path) -> LensConfig {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return LensConfig::default(),
    };
    match parse_config(&raw) {
        Ok(config) => {
            log::info!("[CONFIG] Loaded {}", path.display());
            config
        }
        Err(e) => {
            log::warn!(
                "[CONFIG] Ignoring invalid config {}: {}",
                path.display(),
                e
            );
            LensConfig::default()
        }
    }
}

fn parse_config(raw: &str) -> Result<LensConfig, serde_json::Error> {
    let mut merged = serde_json::to_value(LensConfig::default())?;
    overlay(&mut merged, serde_json::from_str(raw)?);
    serde_json::from_value(merged)
}

/// Merge `patch` into `base`, recursing into objects present in both.
fn overlay(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(&key) {
                    Some(slot) => overlay(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, patch) => *base = patch,
    }
}

/// Persist a config to the user config file.
pub fn save_config(config: &LensConfig) -> Result<PathBuf, ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_config_to(config, &path)?;
    Ok(path)
}

/// Persist a config to an explicit path, creating parent directories.
pub fn save_config_to(config: &LensConfig, path: &Path) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json).map_err(io_err)?;
    log::info!("[CONFIG] Saved {}", path.display());
    Ok(())
}

/// Apply `EDGE_LENS_*` overrides read through `lookup`.
///
/// Unparseable values are logged and ignored.
pub fn apply_env_overrides<F>(config: &mut LensConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(path) = non_empty("EDGE_LENS_POEM_MODEL") {
        config.terrible_poem.model_path = path;
    }
    if let Some(path) = non_empty("EDGE_LENS_PHOTO_MODEL") {
        config.take_photo.model_asset_path = path;
    }
    if let Some(path) = non_empty("EDGE_LENS_GESTURE_MODEL") {
        config.reaction_gesture.model_asset_path = path;
    }
    if let Some(t) = non_empty("EDGE_LENS_PHOTO_THRESHOLD").and_then(|v| parse_threshold(&v)) {
        config.take_photo.score_threshold = t;
    }
    if let Some(t) = non_empty("EDGE_LENS_GESTURE_THRESHOLD").and_then(|v| parse_threshold(&v)) {
        config.reaction_gesture.score_threshold = t;
    }
    if let Some(v) = non_empty("EDGE_LENS_FENCE") {
        match v.to_lowercase().as_str() {
            "1" | "true" | "on" => config.fence_stale_results = true,
            "0" | "false" | "off" => config.fence_stale_results = false,
            other => log::warn!("[CONFIG] Ignoring EDGE_LENS_FENCE={}", other),
        }
    }
}

fn parse_threshold(raw: &str) -> Option<f32> {
    match raw.trim().parse::<f32>() {
        Ok(t) if (0.0..=1.0).contains(&t) => Some(t),
        _ => {
            log::warn!("[CONFIG] Ignoring threshold {:?} (expected 0.0..=1.0)", raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn temp_config(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("edge-lens-config-test-{}", name))
            .join(CONFIG_FILE)
    }

    #[test]
    fn defaults_match_demo_constants() {
        let config = LensConfig::default();
        assert_eq!(config.take_photo.model_asset_path, "efficientnet_lite2.tflite");
        assert_eq!(config.take_photo.score_threshold, 0.1);
        assert_eq!(config.take_photo.max_results, 10);
        assert_eq!(config.reaction_gesture.running_mode, RunningMode::LiveStream);
        assert_eq!(config.terrible_poem.max_tokens, 500);
        assert_eq!(config.terrible_poem.load_policy, LoadPolicy::Eager);
        assert!(config.fence_stale_results);
    }

    #[test]
    fn load_missing_config_returns_defaults() {
        let config = load_config_from(&temp_config("missing-does-not-exist"));
        assert_eq!(config, LensConfig::default());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let path = temp_config("roundtrip");
        let mut config = LensConfig::default();
        config.terrible_poem.random_seed = Some(42);
        config.take_photo.score_threshold = 0.3;

        save_config_to(&config, &path).unwrap();
        assert_eq!(load_config_from(&path), config);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn invalid_json_falls_back_to_defaults() {
        let path = temp_config("invalid");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        assert_eq!(load_config_from(&path), LensConfig::default());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let path = temp_config("partial");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"fenceStaleResults": false}"#).unwrap();

        let config = load_config_from(&path);
        assert!(!config.fence_stale_results);
        assert_eq!(config.take_photo, ClassifierConfig::take_photo());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn partial_section_keeps_feature_defaults() {
        let path = temp_config("partial-section");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{
                "takePhoto": {"scoreThreshold": 0.3},
                "reactionGesture": {"preprocess": {"kind": "fit_longest_side", "longest_side": 320}},
                "terriblePoem": {"randomSeed": 9},
                "fenceStaleResults": false
            }"#,
        )
        .unwrap();

        let config = load_config_from(&path);
        assert_eq!(config.take_photo.score_threshold, 0.3);
        assert_eq!(config.take_photo.model_asset_path, "efficientnet_lite2.tflite");
        assert_eq!(config.take_photo.max_results, 10);
        assert_eq!(
            config.reaction_gesture.preprocess,
            Preprocess::FitLongestSide { longest_side: 320 }
        );
        assert_eq!(config.reaction_gesture.score_threshold, 0.5);
        assert_eq!(config.terrible_poem.random_seed, Some(9));
        assert_eq!(config.terrible_poem.max_tokens, 500);
        assert!(!config.fence_stale_results);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn env_overrides_apply_and_ignore_garbage() {
        let env: HashMap<&str, &str> = [
            ("EDGE_LENS_POEM_MODEL", "/tmp/tiny.task"),
            ("EDGE_LENS_PHOTO_THRESHOLD", "0.5"),
            ("EDGE_LENS_GESTURE_THRESHOLD", "7"),
            ("EDGE_LENS_FENCE", "off"),
        ]
        .into_iter()
        .collect();

        let mut config = LensConfig::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.terrible_poem.model_path, "/tmp/tiny.task");
        assert_eq!(config.take_photo.score_threshold, 0.5);
        assert_eq!(config.reaction_gesture.score_threshold, 0.5);
        assert!(!config.fence_stale_results);
    }

    #[test]
    fn fixed_seed_is_used() {
        let mut config = GeneratorConfig::terrible_poem();
        config.random_seed = Some(7);
        assert_eq!(config.resolve_seed(), 7);
    }
}
