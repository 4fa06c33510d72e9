use crate::catalog::{self, LevelDef};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==================== Constants ====================
pub mod defaults {
    pub const BATCH_SIZE: usize = 4;
    pub const PACING_MS: u32 = 400;
    pub const MAX_LAYERS: u32 = 10;
    pub const MAX_SPEED: f64 = 0.5;
    pub const VERTICAL_DAMPING: f64 = 0.1;
    pub const LAYER_BASE_PATH: &str = "assets/backgrounds";
    pub const LAYER_EXTENSION: &str = "png";
    pub const BACKGROUND_TRACK: &str = "assets/audio/theme.mp3";
}

/// Everything the host page can tune. Every section falls back to its
/// defaults, so `{}` and `undefined` are both valid configs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameConfig {
    pub loading: LoadingConfig,
    pub parallax: ParallaxConfig,
    pub assets: AssetManifest,
    pub audio: AudioConfig,
    pub levels: Vec<LevelDef>,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            loading: LoadingConfig::default(),
            parallax: ParallaxConfig::default(),
            assets: AssetManifest::default(),
            audio: AudioConfig::default(),
            levels: catalog::builtin_levels(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoadingConfig {
    pub batch_size: usize,
    pub pacing_ms: u32,
    /// `None` waits on the host forever.
    pub handshake_timeout_ms: Option<u32>,
    pub flavor_messages: Vec<String>,
}

impl Default for LoadingConfig {
    fn default() -> Self {
        LoadingConfig {
            batch_size: defaults::BATCH_SIZE,
            pacing_ms: defaults::PACING_MS,
            handshake_timeout_ms: None,
            flavor_messages: [
                "Polishing the platforms...",
                "Waking up the enemies...",
                "Hiding the secret exits...",
                "Counting the coins...",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParallaxConfig {
    pub max_layers: u32,
    pub max_speed: f64,
    pub vertical_damping: f64,
    pub base_path: String,
    pub extension: String,
}

impl Default for ParallaxConfig {
    fn default() -> Self {
        ParallaxConfig {
            max_layers: defaults::MAX_LAYERS,
            max_speed: defaults::MAX_SPEED,
            vertical_damping: defaults::VERTICAL_DAMPING,
            base_path: defaults::LAYER_BASE_PATH.to_string(),
            extension: defaults::LAYER_EXTENSION.to_string(),
        }
    }
}

impl ParallaxConfig {
    /// `{base}/{theme}/{index}.{ext}`
    pub fn layer_path(&self, theme: &str, index: u32) -> String {
        format!(
            "{}/{}/{}.{}",
            self.base_path.trim_end_matches('/'),
            theme,
            index,
            self.extension
        )
    }
}

/// Assets warm-cached by the bulk loading steps.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssetManifest {
    pub sprites: Vec<String>,
    pub backgrounds: Vec<String>,
    pub audio: Vec<String>,
}

impl Default for AssetManifest {
    fn default() -> Self {
        let owned =
            |paths: &[&str]| -> Vec<String> { paths.iter().map(|p| p.to_string()).collect() };
        AssetManifest {
            sprites: owned(&[
                "assets/sprites/player.png",
                "assets/sprites/enemies.png",
                "assets/sprites/items.png",
                "assets/sprites/tiles.png",
            ]),
            backgrounds: owned(&[
                "assets/backgrounds/forest/1.png",
                "assets/backgrounds/forest/2.png",
                "assets/backgrounds/forest/3.png",
            ]),
            audio: owned(&[
                defaults::BACKGROUND_TRACK,
                "assets/audio/jump.mp3",
                "assets/audio/coin.mp3",
                "assets/audio/victory.mp3",
                "assets/audio/defeat.mp3",
            ]),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AudioConfig {
    pub background_track: String,
    /// event id -> path
    pub one_shots: HashMap<String, String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        let one_shots = [
            ("jump", "assets/audio/jump.mp3"),
            ("coin", "assets/audio/coin.mp3"),
            ("victory", "assets/audio/victory.mp3"),
            ("defeat", "assets/audio/defeat.mp3"),
        ]
        .iter()
        .map(|(event, path)| (event.to_string(), path.to_string()))
        .collect();
        AudioConfig {
            background_track: defaults::BACKGROUND_TRACK.to_string(),
            one_shots,
        }
    }
}
