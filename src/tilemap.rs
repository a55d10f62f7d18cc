use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use macroquad::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::assets::TileAssets;
use crate::autotile::{self, CARDINAL_OFFSETS, NeighborSet};
use crate::config::TileConfig;
use crate::error::LevelError;

/// The 3x3 neighborhood around a cell, the cell itself included.
pub const BORDERING_TILE_OFFSETS: [(i32, i32); 9] = [
    (-1, -1),
    (-1, 0),
    (0, -1),
    (-1, 1),
    (1, -1),
    (0, 0),
    (0, 1),
    (1, 0),
    (1, 1),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridIndex {
    pub x: i32,
    pub y: i32,
}

impl GridIndex {
    pub const fn from_xy(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Cell containing a pixel position.
    pub fn new(position: Vec2, tile_size: f32) -> Self {
        Self {
            x: (position.x / tile_size).floor() as i32,
            y: (position.y / tile_size).floor() as i32,
        }
    }

    /// `None` when the neighbor lies outside the `i32` cell range.
    pub fn offset(self, dx: i32, dy: i32) -> Option<Self> {
        Some(Self {
            x: self.x.checked_add(dx)?,
            y: self.y.checked_add(dy)?,
        })
    }

    pub fn to_world(self, tile_size: f32) -> Vec2 {
        vec2(self.x as f32 * tile_size, self.y as f32 * tile_size)
    }
}

impl fmt::Display for GridIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{}", self.x, self.y)
    }
}

impl FromStr for GridIndex {
    type Err = LevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || LevelError::MalformedData(format!("bad cell key '{s}'"));
        let (x, y) = s.split_once(';').ok_or_else(malformed)?;
        let cell = Self {
            x: x.parse().map_err(|_| malformed())?,
            y: y.parse().map_err(|_| malformed())?,
        };
        // Only the canonical form, so two keys can never name one cell.
        if cell.to_string() != s {
            return Err(malformed());
        }
        Ok(cell)
    }
}

/// A tile stored at a cell. `pos` always equals the cell it is keyed by.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridTile {
    pub kind: String,
    pub variant: usize,
    pub pos: GridIndex,
}

/// A free-floating tile, or a copy of any tile in pixel units.
#[derive(Clone, Debug, PartialEq)]
pub struct Tile {
    pub kind: String,
    pub variant: usize,
    pub pos: Vec2,
}

/// Which kinds collide and which kinds take part in autotiling.
#[derive(Clone, Debug)]
pub struct TileRules {
    solid: HashSet<String>,
    autotile: HashSet<String>,
}

impl TileRules {
    pub fn new<S: AsRef<str>>(solid: &[S], autotile: &[S]) -> Self {
        Self {
            solid: solid.iter().map(|s| s.as_ref().to_string()).collect(),
            autotile: autotile.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    pub fn is_solid(&self, kind: &str) -> bool {
        self.solid.contains(kind)
    }

    pub fn is_autotiled(&self, kind: &str) -> bool {
        self.autotile.contains(kind)
    }
}

impl Default for TileRules {
    fn default() -> Self {
        Self::new(&["grass", "stone"], &["grass", "stone"])
    }
}

pub struct Tilemap {
    tile_size: u32,
    tiles: HashMap<GridIndex, GridTile>,
    offgrid: Vec<Tile>,
    rules: TileRules,
}

/// Level content only; the rules are configuration, not data.
impl PartialEq for Tilemap {
    fn eq(&self, other: &Self) -> bool {
        self.tile_size == other.tile_size
            && self.tiles == other.tiles
            && self.offgrid == other.offgrid
    }
}

impl fmt::Debug for Tilemap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tilemap")
            .field("tile_size", &self.tile_size)
            .field("grid_tiles", &self.tiles.len())
            .field("offgrid_tiles", &self.offgrid.len())
            .finish()
    }
}

impl Tilemap {
    /// A zero `tile_size` is clamped to one pixel.
    pub fn new(tile_size: u32, rules: TileRules) -> Self {
        Self {
            tile_size: tile_size.max(1),
            tiles: HashMap::new(),
            offgrid: Vec::new(),
            rules,
        }
    }

    pub fn from_config(config: &TileConfig) -> Self {
        Self::new(
            config.tile_size,
            TileRules::new(&config.solid, &config.autotile),
        )
    }

    /// Starting layout used when there is no level file yet.
    pub fn demo(tile_size: u32, rules: TileRules) -> Self {
        let mut map = Self::new(tile_size, rules);
        for i in 0..10 {
            map.place(GridIndex::from_xy(i + 3, 10), "grass", 1);
            map.place(GridIndex::from_xy(10, i + 5), "stone", 1);
        }
        map
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn tile_at(&self, cell: GridIndex) -> Option<&GridTile> {
        self.tiles.get(&cell)
    }

    /// Grid tiles in cell order.
    pub fn grid_tiles(&self) -> Vec<&GridTile> {
        let mut tiles: Vec<&GridTile> = self.tiles.values().collect();
        tiles.sort_unstable_by_key(|tile| tile.pos);
        tiles
    }

    pub fn grid_len(&self) -> usize {
        self.tiles.len()
    }

    /// Off-grid tiles in paint order.
    pub fn offgrid_tiles(&self) -> &[Tile] {
        &self.offgrid
    }

    pub fn place(&mut self, cell: GridIndex, kind: &str, variant: usize) {
        self.tiles.insert(
            cell,
            GridTile {
                kind: kind.to_string(),
                variant,
                pos: cell,
            },
        );
    }

    pub fn remove(&mut self, cell: GridIndex) -> Option<GridTile> {
        self.tiles.remove(&cell)
    }

    pub fn add_offgrid(&mut self, pos: Vec2, kind: &str, variant: usize) {
        self.offgrid.push(Tile {
            kind: kind.to_string(),
            variant,
            pos,
        });
    }

    /// Removes the first off-grid tile, in paint order, whose image bounds
    /// contain `pos`. At most one tile goes per call even when several
    /// overlap the point.
    pub fn remove_offgrid_at(
        &mut self,
        pos: Vec2,
        assets: &impl TileAssets,
    ) -> Result<Option<Tile>, LevelError> {
        let mut hit = None;
        for (i, tile) in self.offgrid.iter().enumerate() {
            let size = assets.require_dimensions(&tile.kind, tile.variant)?;
            if contains_half_open(&Rect::new(tile.pos.x, tile.pos.y, size.x, size.y), pos) {
                hit = Some(i);
                break;
            }
        }
        Ok(hit.map(|i| self.offgrid.remove(i)))
    }

    /// Copies out every tile whose `(kind, variant)` is listed, grid tiles
    /// converted to pixel units. Off-grid matches come first, then grid
    /// matches in cell order. With `keep == false` the matches are removed.
    pub fn extract(&mut self, pairs: &[(&str, usize)], keep: bool) -> Vec<Tile> {
        let wanted = |kind: &str, variant: usize| pairs.iter().any(|&(k, v)| k == kind && v == variant);
        let tile_size = self.tile_size as f32;
        let mut matches = Vec::new();

        for tile in &self.offgrid {
            if wanted(&tile.kind, tile.variant) {
                matches.push(tile.clone());
            }
        }
        if !keep {
            self.offgrid.retain(|tile| !wanted(&tile.kind, tile.variant));
        }

        let mut cells: Vec<GridIndex> = self
            .tiles
            .values()
            .filter(|tile| wanted(&tile.kind, tile.variant))
            .map(|tile| tile.pos)
            .collect();
        cells.sort_unstable();
        for cell in cells {
            let tile = if keep {
                self.tiles.get(&cell).cloned()
            } else {
                self.tiles.remove(&cell)
            };
            if let Some(tile) = tile {
                matches.push(Tile {
                    kind: tile.kind,
                    variant: tile.variant,
                    pos: tile.pos.to_world(tile_size),
                });
            }
        }

        debug!(count = matches.len(), keep, "extracted tiles");
        matches
    }

    /// Grid tiles in the 3x3 neighborhood of the cell containing `pos`, in
    /// [`BORDERING_TILE_OFFSETS`] order.
    pub fn bordering_tiles(&self, pos: Vec2) -> Vec<GridTile> {
        let cell = GridIndex::new(pos, self.tile_size as f32);
        BORDERING_TILE_OFFSETS
            .iter()
            .filter_map(|&(dx, dy)| self.tiles.get(&cell.offset(dx, dy)?))
            .cloned()
            .collect()
    }

    pub fn solid_rects(&self, pos: Vec2) -> Vec<Rect> {
        let mut rects = Vec::with_capacity(BORDERING_TILE_OFFSETS.len());
        self.fill_solid_rects(pos, &mut rects);
        rects
    }

    /// Same as [`Tilemap::solid_rects`] into a reusable buffer.
    pub fn fill_solid_rects(&self, pos: Vec2, out: &mut Vec<Rect>) {
        out.clear();
        let size = self.tile_size as f32;
        let cell = GridIndex::new(pos, size);
        for &(dx, dy) in BORDERING_TILE_OFFSETS.iter() {
            let Some(tile) = cell.offset(dx, dy).and_then(|cell| self.tiles.get(&cell)) else {
                continue;
            };
            if !self.rules.is_solid(&tile.kind) {
                continue;
            }
            let origin = tile.pos.to_world(size);
            out.push(Rect::new(origin.x, origin.y, size, size));
        }
    }

    /// The solid tile covering a pixel, if any.
    pub fn solid_tile_at(&self, pos: Vec2) -> Option<&GridTile> {
        let cell = GridIndex::new(pos, self.tile_size as f32);
        self.tiles
            .get(&cell)
            .filter(|tile| self.rules.is_solid(&tile.kind))
    }

    /// Reassigns variants of autotile kinds from their same-kind cardinal
    /// neighbors. Tiles whose pattern is not in the table keep their
    /// variant. Returns how many tiles changed.
    pub fn autotile(&mut self) -> usize {
        let mut updates = Vec::new();
        for tile in self.tiles.values() {
            if !self.rules.is_autotiled(&tile.kind) {
                continue;
            }
            let mut neighbors = NeighborSet::EMPTY;
            for &(dx, dy) in CARDINAL_OFFSETS.iter() {
                let same_kind = tile
                    .pos
                    .offset(dx, dy)
                    .and_then(|cell| self.tiles.get(&cell))
                    .is_some_and(|other| other.kind == tile.kind);
                if same_kind {
                    neighbors.insert((dx, dy));
                }
            }
            if let Some(variant) = autotile::variant_for(neighbors) {
                if variant != tile.variant {
                    updates.push((tile.pos, variant));
                }
            }
        }

        for &(cell, variant) in &updates {
            if let Some(tile) = self.tiles.get_mut(&cell) {
                tile.variant = variant;
            }
        }
        debug!(changed = updates.len(), "autotile pass");
        updates.len()
    }

    /// Fails with `MalformedData` if an off-grid tile has a non-finite
    /// position, since that could not be read back.
    pub fn save(&self) -> Result<Vec<u8>, LevelError> {
        if let Some(tile) = self.offgrid.iter().find(|tile| !tile.pos.is_finite()) {
            return Err(LevelError::MalformedData(format!(
                "off-grid '{}' tile has non-finite position {}",
                tile.kind, tile.pos
            )));
        }
        let file = LevelFile {
            tilemap: self
                .tiles
                .values()
                .map(|tile| {
                    (
                        tile.pos.to_string(),
                        GridTileFile {
                            kind: tile.kind.clone(),
                            variant: tile.variant,
                            pos: [tile.pos.x, tile.pos.y],
                        },
                    )
                })
                .collect(),
            tile_size: i64::from(self.tile_size),
            offgrid: self
                .offgrid
                .iter()
                .map(|tile| OffgridTileFile {
                    kind: tile.kind.clone(),
                    variant: tile.variant,
                    pos: [tile.pos.x, tile.pos.y],
                })
                .collect(),
        };
        Ok(serde_json::to_vec(&file)?)
    }

    /// Replaces all level content. On error nothing changes.
    pub fn load(&mut self, bytes: &[u8]) -> Result<(), LevelError> {
        let file: LevelFile = serde_json::from_slice(bytes)?;
        let tile_size = u32::try_from(file.tile_size)
            .ok()
            .filter(|&size| size > 0)
            .ok_or_else(|| {
                LevelError::MalformedData(format!("tile_size must be positive, got {}", file.tile_size))
            })?;

        let mut tiles = HashMap::with_capacity(file.tilemap.len());
        for (key, raw) in file.tilemap {
            let cell: GridIndex = key.parse()?;
            let pos = GridIndex::from_xy(raw.pos[0], raw.pos[1]);
            if pos != cell {
                return Err(LevelError::MalformedData(format!(
                    "tile keyed '{key}' claims position {pos}"
                )));
            }
            tiles.insert(
                cell,
                GridTile {
                    kind: raw.kind,
                    variant: raw.variant,
                    pos,
                },
            );
        }

        let offgrid = file
            .offgrid
            .into_iter()
            .map(|raw| Tile {
                kind: raw.kind,
                variant: raw.variant,
                pos: vec2(raw.pos[0], raw.pos[1]),
            })
            .collect();

        self.tile_size = tile_size;
        self.tiles = tiles;
        self.offgrid = offgrid;
        Ok(())
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), LevelError> {
        let path = path.as_ref();
        std::fs::write(path, self.save()?)?;
        info!(
            path = %path.display(),
            grid = self.tiles.len(),
            offgrid = self.offgrid.len(),
            "saved level"
        );
        Ok(())
    }

    pub fn load_from(&mut self, path: impl AsRef<Path>) -> Result<(), LevelError> {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(LevelError::FileAbsent(path.to_path_buf()));
            }
            Err(err) => return Err(err.into()),
        };
        self.load(&bytes)?;
        info!(
            path = %path.display(),
            grid = self.tiles.len(),
            offgrid = self.offgrid.len(),
            "loaded level"
        );
        Ok(())
    }
}

/// Half-open point test: the right and bottom edges are outside.
fn contains_half_open(rect: &Rect, point: Vec2) -> bool {
    point.x >= rect.x && point.x < rect.x + rect.w && point.y >= rect.y && point.y < rect.y + rect.h
}

#[derive(Serialize, Deserialize)]
struct LevelFile {
    tilemap: BTreeMap<String, GridTileFile>,
    tile_size: i64,
    offgrid: Vec<OffgridTileFile>,
}

#[derive(Serialize, Deserialize)]
struct GridTileFile {
    #[serde(rename = "type")]
    kind: String,
    variant: usize,
    pos: [i32; 2],
}

#[derive(Serialize, Deserialize)]
struct OffgridTileFile {
    #[serde(rename = "type")]
    kind: String,
    variant: usize,
    pos: [f32; 2],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::TileSizes;

    fn map() -> Tilemap {
        Tilemap::new(16, TileRules::default())
    }

    fn cell(x: i32, y: i32) -> GridIndex {
        GridIndex::from_xy(x, y)
    }

    fn assert_keys_match_positions(map: &Tilemap) {
        for (key, tile) in &map.tiles {
            assert_eq!(*key, tile.pos);
        }
    }

    #[test]
    fn grid_index_floors_negative_positions() {
        assert_eq!(GridIndex::new(vec2(-0.5, 15.9), 16.0), cell(-1, 0));
        assert_eq!(GridIndex::new(vec2(32.0, -16.0), 16.0), cell(2, -1));
    }

    #[test]
    fn grid_index_text_form() {
        assert_eq!(cell(-3, 12).to_string(), "-3;12");
        assert_eq!("-3;12".parse::<GridIndex>().unwrap(), cell(-3, 12));
        assert!("3,12".parse::<GridIndex>().is_err());
        assert!("a;1".parse::<GridIndex>().is_err());
        for key in ["+1;1", " 2;2", "2;2 ", "01;1", "-0;0", "1;+1"] {
            assert!(key.parse::<GridIndex>().is_err(), "{key}");
        }
    }

    #[test]
    fn offsets_past_the_cell_range_do_not_exist() {
        assert_eq!(cell(i32::MAX, 0).offset(1, 0), None);
        assert_eq!(cell(0, i32::MIN).offset(0, -1), None);
        assert_eq!(cell(i32::MAX, 0).offset(-1, 0), Some(cell(i32::MAX - 1, 0)));
    }

    #[test]
    fn queries_at_extreme_positions_do_not_panic() {
        let mut map = map();
        assert!(map.solid_rects(vec2(1.0e12, 0.0)).is_empty());
        assert!(map.bordering_tiles(vec2(-1.0e12, -1.0e12)).is_empty());

        map.place(cell(i32::MAX, 0), "stone", 0);
        assert_eq!(map.solid_rects(vec2(1.0e12, 8.0)).len(), 1);
        assert_eq!(map.bordering_tiles(vec2(1.0e12, 8.0)).len(), 1);
    }

    #[test]
    fn autotile_at_the_edge_of_the_cell_range() {
        let mut map = map();
        let raw = format!(
            r#"{{"tilemap": {{"{max};0": {{"type": "stone", "variant": 0, "pos": [{max}, 0]}}, "{prev};0": {{"type": "stone", "variant": 0, "pos": [{prev}, 0]}}}}, "tile_size": 16, "offgrid": []}}"#,
            max = i32::MAX,
            prev = i32::MAX - 1,
        );
        map.load(raw.as_bytes()).unwrap();
        assert_eq!(map.autotile(), 2);
        assert_eq!(map.tile_at(cell(i32::MAX, 0)).unwrap().variant, 4);
        assert_eq!(map.tile_at(cell(i32::MAX - 1, 0)).unwrap().variant, 6);
    }

    #[test]
    fn zero_tile_size_is_clamped_to_one() {
        let map = Tilemap::new(0, TileRules::default());
        assert_eq!(map.tile_size(), 1);
    }

    #[test]
    fn place_overwrites_and_remove_is_idempotent() {
        let mut map = map();
        map.place(cell(1, 1), "stone", 0);
        map.place(cell(1, 1), "grass", 3);
        assert_eq!(map.grid_len(), 1);
        assert_eq!(map.tile_at(cell(1, 1)).unwrap().kind, "grass");
        assert_keys_match_positions(&map);

        assert!(map.remove(cell(1, 1)).is_some());
        assert!(map.remove(cell(1, 1)).is_none());
        assert_eq!(map.grid_len(), 0);
    }

    #[test]
    fn bordering_tiles_cover_the_3x3_neighborhood_only() {
        let mut map = map();
        for x in -2..=2 {
            for y in -2..=2 {
                map.place(cell(x, y), "stone", 0);
            }
        }
        let tiles = map.bordering_tiles(vec2(8.0, 8.0));
        assert_eq!(tiles.len(), 9);
        assert!(tiles.iter().all(|t| t.pos.x.abs() <= 1 && t.pos.y.abs() <= 1));
        assert_eq!(tiles[0].pos, cell(-1, -1));
        assert_eq!(tiles[5].pos, cell(0, 0));
    }

    #[test]
    fn offgrid_tiles_never_border() {
        let mut map = map();
        map.add_offgrid(vec2(4.0, 4.0), "stone", 0);
        assert!(map.bordering_tiles(vec2(4.0, 4.0)).is_empty());
        assert!(map.solid_rects(vec2(4.0, 4.0)).is_empty());
    }

    #[test]
    fn solid_rects_skip_decorative_kinds() {
        let mut map = map();
        map.place(cell(0, 1), "stone", 0);
        map.place(cell(1, 1), "decor", 0);
        map.place(cell(1, 0), "grass", 0);
        let rects = map.solid_rects(vec2(10.0, 10.0));
        assert_eq!(rects.len(), 2);
        assert!(rects.contains(&Rect::new(0.0, 16.0, 16.0, 16.0)));
        assert!(rects.contains(&Rect::new(16.0, 0.0, 16.0, 16.0)));
        assert!(map.solid_tile_at(vec2(20.0, 20.0)).is_none());
        assert!(map.solid_tile_at(vec2(3.0, 20.0)).is_some());
    }

    #[test]
    fn remove_offgrid_takes_only_the_first_hit() {
        let assets = TileSizes::new().with_kind("decor", vec![vec2(16.0, 16.0), vec2(8.0, 8.0)]);
        let mut map = map();
        map.add_offgrid(vec2(0.0, 0.0), "decor", 0);
        map.add_offgrid(vec2(4.0, 4.0), "decor", 1);
        map.add_offgrid(vec2(100.0, 100.0), "decor", 0);

        let removed = map.remove_offgrid_at(vec2(6.0, 6.0), &assets).unwrap().unwrap();
        assert_eq!(removed.pos, vec2(0.0, 0.0));
        assert_eq!(map.offgrid_tiles().len(), 2);

        let removed = map.remove_offgrid_at(vec2(6.0, 6.0), &assets).unwrap().unwrap();
        assert_eq!(removed.variant, 1);
        assert!(map.remove_offgrid_at(vec2(6.0, 6.0), &assets).unwrap().is_none());
        assert_eq!(map.offgrid_tiles().len(), 1);
    }

    #[test]
    fn remove_offgrid_edges_are_half_open() {
        let assets = TileSizes::new().with_kind("decor", vec![vec2(16.0, 16.0)]);
        let mut map = map();
        map.add_offgrid(vec2(0.0, 0.0), "decor", 0);
        assert!(map.remove_offgrid_at(vec2(16.0, 8.0), &assets).unwrap().is_none());
        assert!(map.remove_offgrid_at(vec2(8.0, 16.0), &assets).unwrap().is_none());
        assert!(map.remove_offgrid_at(vec2(0.0, 0.0), &assets).unwrap().is_some());
    }

    #[test]
    fn shared_edge_belongs_to_the_right_hand_tile() {
        let assets = TileSizes::new().with_kind("decor", vec![vec2(16.0, 16.0)]);
        let mut map = map();
        map.add_offgrid(vec2(0.0, 0.0), "decor", 0);
        map.add_offgrid(vec2(16.0, 0.0), "decor", 0);
        let removed = map.remove_offgrid_at(vec2(16.0, 8.0), &assets).unwrap().unwrap();
        assert_eq!(removed.pos, vec2(16.0, 0.0));
        assert_eq!(map.offgrid_tiles()[0].pos, vec2(0.0, 0.0));
    }

    #[test]
    fn remove_offgrid_missing_asset_leaves_store_unchanged() {
        let assets = TileSizes::new();
        let mut map = map();
        map.add_offgrid(vec2(0.0, 0.0), "decor", 0);
        let err = map.remove_offgrid_at(vec2(1.0, 1.0), &assets).unwrap_err();
        assert!(matches!(err, LevelError::AssetNotFound { .. }));
        assert_eq!(map.offgrid_tiles().len(), 1);
    }

    #[test]
    fn extract_converts_grid_positions_to_pixels() {
        let mut map = map();
        map.place(cell(2, 3), "spawners", 0);
        map.place(cell(4, 3), "spawners", 1);
        map.place(cell(5, 5), "stone", 0);
        map.add_offgrid(vec2(7.5, 9.0), "spawners", 0);

        let kept = map.extract(&[("spawners", 0)], true);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].pos, vec2(7.5, 9.0));
        assert_eq!(kept[1].pos, vec2(32.0, 48.0));
        assert_eq!(map.grid_len(), 3);
        assert_eq!(map.offgrid_tiles().len(), 1);

        let taken = map.extract(&[("spawners", 0), ("spawners", 1)], false);
        assert_eq!(taken.len(), 3);
        assert_eq!(map.grid_len(), 1);
        assert!(map.offgrid_tiles().is_empty());
        assert!(map.tile_at(cell(5, 5)).is_some());
    }

    #[test]
    fn autotile_horizontal_pair() {
        let mut map = map();
        map.place(cell(0, 0), "stone", 0);
        map.place(cell(1, 0), "stone", 0);
        assert_eq!(map.autotile(), 2);
        assert_eq!(map.tile_at(cell(0, 0)).unwrap().variant, 6);
        assert_eq!(map.tile_at(cell(1, 0)).unwrap().variant, 4);
        assert_keys_match_positions(&map);
    }

    #[test]
    fn autotile_ignores_other_kinds_and_unknown_patterns() {
        let mut map = map();
        map.place(cell(0, 0), "stone", 5);
        map.place(cell(1, 0), "grass", 5);
        map.place(cell(0, 1), "decor", 2);
        map.place(cell(0, 2), "decor", 2);
        assert_eq!(map.autotile(), 0);
        assert_eq!(map.tile_at(cell(0, 0)).unwrap().variant, 5);
        assert_eq!(map.tile_at(cell(0, 1)).unwrap().variant, 2);
    }

    #[test]
    fn autotile_block_and_idempotence() {
        let mut map = map();
        for x in 0..3 {
            for y in 0..3 {
                map.place(cell(x, y), "grass", 0);
            }
        }
        map.autotile();
        let expected = [
            ((0, 0), 0),
            ((1, 0), 1),
            ((2, 0), 2),
            ((2, 1), 3),
            ((2, 2), 4),
            ((1, 2), 5),
            ((0, 2), 6),
            ((0, 1), 7),
            ((1, 1), 8),
        ];
        for ((x, y), variant) in expected {
            assert_eq!(map.tile_at(cell(x, y)).unwrap().variant, variant, "cell {x};{y}");
        }

        let snapshot: Vec<GridTile> = map.grid_tiles().into_iter().cloned().collect();
        assert_eq!(map.autotile(), 0);
        let again: Vec<GridTile> = map.grid_tiles().into_iter().cloned().collect();
        assert_eq!(snapshot, again);
    }

    #[test]
    fn save_load_round_trip() {
        let mut map = Tilemap::demo(16, TileRules::default());
        map.place(cell(-4, -7), "decor", 2);
        map.add_offgrid(vec2(12.25, -3.5), "large_decor", 2);
        map.add_offgrid(vec2(12.25, -3.5), "large_decor", 2);
        map.add_offgrid(vec2(0.1, 1e6), "decor", 0);

        let bytes = map.save().unwrap();
        let mut loaded = Tilemap::new(32, TileRules::default());
        loaded.load(&bytes).unwrap();
        assert_eq!(loaded, map);
        assert_keys_match_positions(&loaded);
        assert_eq!(loaded.offgrid_tiles()[2].pos, vec2(0.1, 1e6));
    }

    #[test]
    fn save_uses_the_persisted_field_names() {
        let mut map = map();
        map.place(cell(3, -1), "grass", 1);
        map.add_offgrid(vec2(1.5, 2.0), "decor", 0);
        let value: serde_json::Value = serde_json::from_slice(&map.save().unwrap()).unwrap();
        assert_eq!(value["tile_size"], 16);
        assert_eq!(value["tilemap"]["3;-1"]["type"], "grass");
        assert_eq!(value["tilemap"]["3;-1"]["variant"], 1);
        assert_eq!(value["tilemap"]["3;-1"]["pos"], serde_json::json!([3, -1]));
        assert_eq!(value["offgrid"][0]["pos"], serde_json::json!([1.5, 2.0]));
    }

    #[test]
    fn loads_integer_offgrid_positions() {
        let raw = br#"{"tilemap": {"0;0": {"type": "stone", "variant": 1, "pos": [0, 0]}},
            "tile_size": 16,
            "offgrid": [{"type": "decor", "variant": 0, "pos": [3, 4]}]}"#;
        let mut map = map();
        map.load(raw).unwrap();
        assert_eq!(map.offgrid_tiles()[0].pos, vec2(3.0, 4.0));
        assert_eq!(map.tile_at(cell(0, 0)).unwrap().variant, 1);
    }

    #[test]
    fn malformed_loads_leave_store_unchanged() {
        let mut map = Tilemap::demo(16, TileRules::default());
        let before = map.save().unwrap();
        let bad: [&[u8]; 8] = [
            b"not json",
            br#"{"tilemap": {}, "offgrid": []}"#,
            br#"{"tilemap": {}, "tile_size": 0, "offgrid": []}"#,
            br#"{"tilemap": {}, "tile_size": -16, "offgrid": []}"#,
            br#"{"tilemap": {"1;1": {"type": "stone", "variant": 0, "pos": [2, 1]}}, "tile_size": 16, "offgrid": []}"#,
            br#"{"tilemap": {"oops": {"type": "stone", "variant": 0, "pos": [2, 1]}}, "tile_size": 16, "offgrid": []}"#,
            br#"{"tilemap": {"1;1": {"type": "stone", "variant": 0, "pos": [1, 1]}, "+1;1": {"type": "grass", "variant": 0, "pos": [1, 1]}}, "tile_size": 16, "offgrid": []}"#,
            br#"{"tilemap": {" 2;2": {"type": "stone", "variant": 0, "pos": [2, 2]}}, "tile_size": 16, "offgrid": []}"#,
        ];
        for raw in bad {
            let err = map.load(raw).unwrap_err();
            assert!(matches!(err, LevelError::MalformedData(_)), "{err}");
        }
        assert_eq!(map.save().unwrap(), before);
    }

    #[test]
    fn non_finite_offgrid_positions_refuse_to_save() {
        let mut map = map();
        map.add_offgrid(vec2(f32::NAN, 1.0), "decor", 0);
        assert!(matches!(map.save(), Err(LevelError::MalformedData(_))));

        let mut map = Tilemap::new(16, TileRules::default());
        map.add_offgrid(vec2(0.0, f32::INFINITY), "decor", 0);
        assert!(matches!(map.save(), Err(LevelError::MalformedData(_))));
    }

    #[test]
    fn file_round_trip_and_absent_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.json");

        let mut map = map();
        let err = map.load_from(&path).unwrap_err();
        assert!(matches!(err, LevelError::FileAbsent(_)));

        let demo = Tilemap::demo(16, TileRules::default());
        demo.save_to(&path).unwrap();
        map.load_from(&path).unwrap();
        assert_eq!(map, demo);
    }

    #[test]
    fn demo_layout_overlap_cell_is_grass() {
        let map = Tilemap::demo(16, TileRules::default());
        assert_eq!(map.grid_len(), 19);
        assert_eq!(map.tile_at(cell(10, 10)).unwrap().kind, "grass");
    }
}
