pub mod animation;
pub mod assets;
pub mod autotile;
pub mod clouds;
pub mod config;
pub mod entity;
pub mod error;
pub mod particle;
pub mod physics;
pub mod tilemap;

pub use config::GameConfig;
pub use error::{ConfigError, LevelError};
pub use tilemap::{GridIndex, GridTile, Tile, TileRules, Tilemap};
