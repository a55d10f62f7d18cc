use std::path::Path;

use macroquad::prelude::*;
use serde::Deserialize;
use tracing::info;

use crate::error::ConfigError;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub physics: PhysicsConfig,
    pub tiles: TileConfig,
    pub player: PlayerConfig,
    pub clouds: CloudConfig,
    pub level_path: String,
}

/// Per-step constants. Units are pixels per step.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: f32,
    pub terminal_velocity: f32,
    pub horizontal_friction: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 0.1,
            terminal_velocity: 5.0,
            horizontal_friction: 0.1,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TileConfig {
    pub tile_size: u32,
    pub solid: Vec<String>,
    pub autotile: Vec<String>,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            tile_size: 16,
            solid: vec!["grass".to_string(), "stone".to_string()],
            autotile: vec!["grass".to_string(), "stone".to_string()],
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub size: [f32; 2],
    pub spawn: [f32; 2],
    pub speed: f32,
    pub jump_velocity: f32,
    pub max_jumps: u32,
    pub air_time_threshold: u32,
    pub dash_duration: i32,
    pub dash_speed: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            size: [8.0, 15.0],
            spawn: [50.0, 50.0],
            speed: 1.0,
            jump_velocity: -3.0,
            max_jumps: 1,
            air_time_threshold: 4,
            dash_duration: 60,
            dash_speed: 8.0,
        }
    }
}

impl PlayerConfig {
    pub fn size(&self) -> Vec2 {
        vec2(self.size[0], self.size[1])
    }

    pub fn spawn(&self) -> Vec2 {
        vec2(self.spawn[0], self.spawn[1])
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub count: usize,
    pub min_speed: f32,
    pub max_speed: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            count: 16,
            min_speed: 0.05,
            max_speed: 0.1,
            min_depth: 0.2,
            max_depth: 0.8,
        }
    }
}

impl GameConfig {
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let mut config: GameConfig = serde_yaml::from_str(raw)?;
        if config.level_path.is_empty() {
            config.level_path = default_level_path();
        }
        Ok(config)
    }

    /// A missing file yields the defaults; a file that exists but fails to
    /// parse is an error.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::with_defaults());
        }
        let config = Self::from_yaml(&std::fs::read_to_string(path)?)?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn with_defaults() -> Self {
        Self {
            level_path: default_level_path(),
            ..Default::default()
        }
    }
}

fn default_level_path() -> String {
    "map.json".to_string()
}
