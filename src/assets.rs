use std::collections::HashMap;
use std::path::Path;

use macroquad::prelude::*;
use tracing::{debug, warn};

use crate::error::LevelError;

/// Pixel dimensions of the image behind each `(kind, variant)`. The tile
/// store only ever asks for sizes, never pixel content.
pub trait TileAssets {
    fn tile_dimensions(&self, kind: &str, variant: usize) -> Option<Vec2>;

    fn require_dimensions(&self, kind: &str, variant: usize) -> Result<Vec2, LevelError> {
        self.tile_dimensions(kind, variant)
            .ok_or_else(|| LevelError::AssetNotFound {
                kind: kind.to_string(),
                variant,
            })
    }
}

/// Size table without textures.
#[derive(Clone, Debug, Default)]
pub struct TileSizes {
    kinds: HashMap<String, Vec<Vec2>>,
}

impl TileSizes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: &str, sizes: Vec<Vec2>) {
        self.kinds.insert(kind.to_string(), sizes);
    }

    pub fn with_kind(mut self, kind: &str, sizes: Vec<Vec2>) -> Self {
        self.insert(kind, sizes);
        self
    }
}

impl TileAssets for TileSizes {
    fn tile_dimensions(&self, kind: &str, variant: usize) -> Option<Vec2> {
        self.kinds.get(kind)?.get(variant).copied()
    }
}

/// Tile textures grouped by kind, one texture per variant.
#[derive(Default)]
pub struct TextureLibrary {
    kinds: HashMap<String, Vec<Texture2D>>,
}

impl TextureLibrary {
    /// Loads `<root>/<kind>/*.png` for each kind, variants in file-name
    /// order. A missing directory leaves that kind empty.
    pub async fn load_from(root: impl AsRef<Path>, kinds: &[&str]) -> Self {
        let root = root.as_ref();
        let mut library = Self::default();
        for &kind in kinds {
            let textures = load_texture_dir(&root.join(kind)).await;
            if textures.is_empty() {
                warn!(kind, "no textures found for tile kind");
            } else {
                debug!(kind, count = textures.len(), "loaded tile textures");
            }
            library.kinds.insert(kind.to_string(), textures);
        }
        library
    }

    pub fn get(&self, kind: &str, variant: usize) -> Option<&Texture2D> {
        self.kinds.get(kind)?.get(variant)
    }
}

impl TileAssets for TextureLibrary {
    fn tile_dimensions(&self, kind: &str, variant: usize) -> Option<Vec2> {
        self.get(kind, variant).map(Texture2D::size)
    }
}

/// Loads every png in `dir` sorted by file name. Used for tile variants and
/// animation frames alike.
pub async fn load_texture_dir(dir: &Path) -> Vec<Texture2D> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        })
        .collect();
    paths.sort();

    let mut textures = Vec::with_capacity(paths.len());
    for path in paths {
        match load_texture(&path.to_string_lossy()).await {
            Ok(texture) => {
                texture.set_filter(FilterMode::Nearest);
                textures.push(texture);
            }
            Err(err) => warn!(path = %path.display(), "texture load failed: {err}"),
        }
    }
    textures
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_asset_is_reported() {
        let sizes = TileSizes::new().with_kind("decor", vec![vec2(16.0, 16.0)]);
        assert_eq!(sizes.require_dimensions("decor", 0).unwrap(), vec2(16.0, 16.0));
        let err = sizes.require_dimensions("decor", 3).unwrap_err();
        assert!(matches!(err, LevelError::AssetNotFound { variant: 3, .. }));
        assert!(sizes.tile_dimensions("stone", 0).is_none());
    }
}
