//! Tile addressing
//!
//! A tile of height `H` is a `2^H`-wide slice of one level of the tree. Tile
//! level `L` holds the hashes of tree level `L * H`, so a full tile at level
//! `L` is summarised by a single node at tree level `(L + 1) * H`, which in
//! turn lives in a tile at level `L + 1`. Data tiles carry the leaves
//! themselves and are addressed like tile level 0.
//!
//! Only complete nodes (whose whole subtree is inside the tree) belong to a
//! tile, so for a tree of `N` leaves tile level `L` spans `N >> (L * H)`
//! positions. The rightmost tile of a level may be partial; every other tile
//! is full and keeps its coordinate and width forever.

use crate::error::{Error, Result};
use crate::tree::HASH_SIZE;

/// Tile height used by sum.golang.org
pub const DEFAULT_TILE_HEIGHT: u8 = 8;

/// Largest supported tile height
pub const MAX_TILE_HEIGHT: u8 = 30;

/// Which kind of tile is addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileLevel {
    /// Leaf data (`tile/H/data/...`)
    Data,
    /// Hashes of tree level `level * H` (`tile/H/level/...`)
    Hashes(u32),
}

impl std::fmt::Display for TileLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TileLevel::Data => f.write_str("data"),
            TileLevel::Hashes(level) => write!(f, "{}", level),
        }
    }
}

/// A tile coordinate within one level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tile {
    /// Tile index within the level
    pub index: u64,
    /// Number of positions covered (`1..=2^H`)
    pub width: u32,
}

/// Tile layout for a fixed tile height
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGeometry {
    height: u8,
}

impl Default for TileGeometry {
    fn default() -> Self {
        Self {
            height: DEFAULT_TILE_HEIGHT,
        }
    }
}

impl TileGeometry {
    /// Create a geometry for tiles of the given height
    pub fn new(height: u8) -> Result<Self> {
        if height == 0 || height > MAX_TILE_HEIGHT {
            return Err(Error::InvalidTileHeight(height));
        }
        Ok(Self { height })
    }

    /// The tile height `H`
    pub fn height(&self) -> u8 {
        self.height
    }

    /// Width of a full tile (`2^H`)
    pub fn full_width(&self) -> u32 {
        1 << self.height
    }

    /// Whether a tile is full
    pub fn is_full(&self, tile: &Tile) -> bool {
        tile.width == self.full_width()
    }

    /// First position covered by a tile
    pub fn tile_start(&self, tile: &Tile) -> u64 {
        tile.index << self.height
    }

    /// Positions spanned by tile level `level` in a tree of `tree_size` leaves
    pub fn level_width(&self, level: u32, tree_size: u64) -> u64 {
        let shift = level as u64 * self.height as u64;
        if shift >= 64 {
            0
        } else {
            tree_size >> shift
        }
    }

    /// Number of tile levels holding at least one position
    pub fn level_count(&self, tree_size: u64) -> u32 {
        let mut levels = 0;
        while self.level_width(levels, tree_size) > 0 {
            levels += 1;
        }
        levels
    }

    /// Tiles covering tile level `level` of a tree of `tree_size` leaves
    pub fn tiles_covering(&self, level: u32, tree_size: u64) -> Vec<Tile> {
        self.tiles_for_positions(0, self.level_width(level, tree_size))
    }

    /// Suffix of [`Self::tiles_covering`] starting at the tile that holds
    /// position `start`
    pub fn tiles_covering_range(&self, level: u32, start: u64, tree_size: u64) -> Vec<Tile> {
        self.tiles_for_positions(start, self.level_width(level, tree_size))
    }

    /// Tiles over positions `[start, count)` of a row of `count` positions,
    /// beginning with the tile containing `start`
    pub fn tiles_for_positions(&self, start: u64, count: u64) -> Vec<Tile> {
        if start >= count {
            return Vec::new();
        }
        let full_width = self.full_width() as u64;
        let first = start >> self.height;
        let end = count.div_ceil(full_width);
        (first..end)
            .map(|index| {
                let covered = count - (index << self.height);
                Tile {
                    index,
                    width: covered.min(full_width) as u32,
                }
            })
            .collect()
    }

    /// Owning tile index and offset within it for a position
    pub fn locate(&self, index: u64) -> (u64, u32) {
        let mask = (1u64 << self.height) - 1;
        (index >> self.height, (index & mask) as u32)
    }

    /// Byte offset of a position within a hash tile
    pub fn byte_offset(offset: u32) -> usize {
        offset as usize * HASH_SIZE
    }

    /// Remote path of a tile, e.g. `tile/8/0/x001/x234/067.p/13`
    pub fn path(&self, level: TileLevel, tile: Tile) -> String {
        let mut path = format!("tile/{}/{}/{}", self.height, level, encode_index(tile.index));
        if tile.width < self.full_width() {
            path.push_str(&format!(".p/{}", tile.width));
        }
        path
    }

    /// Parse a tile path produced by [`Self::path`]
    pub fn parse_path(path: &str) -> Result<(TileGeometry, TileLevel, Tile)> {
        let invalid = || Error::InvalidTilePath(path.to_string());
        let parts: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        if parts.len() < 4 || parts[0] != "tile" {
            return Err(invalid());
        }

        let height: u8 = parts[1].parse().map_err(|_| invalid())?;
        let geometry = TileGeometry::new(height)?;

        let level = match parts[2] {
            "data" => TileLevel::Data,
            level => TileLevel::Hashes(level.parse().map_err(|_| invalid())?),
        };

        let mut groups: Vec<&str> = parts[3..].to_vec();
        let mut width = geometry.full_width();
        if groups.len() >= 2 {
            let last_group = groups[groups.len() - 2];
            if let Some(stripped) = last_group.strip_suffix(".p") {
                let partial: u32 = groups[groups.len() - 1].parse().map_err(|_| invalid())?;
                if partial == 0 || partial >= geometry.full_width() {
                    return Err(Error::InvalidTileWidth {
                        width: partial,
                        height,
                    });
                }
                width = partial;
                groups.pop();
                let last = groups.len() - 1;
                groups[last] = stripped;
            }
        }

        let index = decode_index(&groups).ok_or_else(invalid)?;
        Ok((geometry, level, Tile { index, width }))
    }
}

/// Encode a tile index as three-digit path groups, all but the last prefixed
/// with `x`
fn encode_index(index: u64) -> String {
    let mut encoded = format!("{:03}", index % 1000);
    let mut rest = index / 1000;
    while rest > 0 {
        encoded = format!("x{:03}/{}", rest % 1000, encoded);
        rest /= 1000;
    }
    encoded
}

fn decode_index(groups: &[&str]) -> Option<u64> {
    let (last, prefix) = groups.split_last()?;
    let mut index: u64 = 0;
    for group in prefix {
        let digits = group.strip_prefix('x')?;
        index = index.checked_mul(1000)?.checked_add(parse_group(digits)?)?;
    }
    index.checked_mul(1000)?.checked_add(parse_group(last)?)
}

fn parse_group(digits: &str) -> Option<u64> {
    if digits.len() != 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_bounds() {
        assert!(TileGeometry::new(0).is_err());
        assert!(TileGeometry::new(31).is_err());
        assert_eq!(TileGeometry::new(8).unwrap().full_width(), 256);
        assert_eq!(TileGeometry::default().height(), DEFAULT_TILE_HEIGHT);
    }

    #[test]
    fn test_tiles_covering_full_and_partial() {
        let geometry = TileGeometry::new(2).unwrap();

        let tiles = geometry.tiles_covering(0, 10);
        assert_eq!(
            tiles,
            vec![
                Tile { index: 0, width: 4 },
                Tile { index: 1, width: 4 },
                Tile { index: 2, width: 2 },
            ]
        );

        // Level 1 holds tree level 2: 10 >> 2 = 2 complete nodes
        assert_eq!(geometry.tiles_covering(1, 10), vec![Tile { index: 0, width: 2 }]);
        assert!(geometry.tiles_covering(2, 10).is_empty());
        assert_eq!(geometry.level_count(10), 2);
        assert_eq!(geometry.level_count(0), 0);
    }

    #[test]
    fn test_tiles_covering_range_resumes_at_partial_tile() {
        let geometry = TileGeometry::new(2).unwrap();
        let tiles = geometry.tiles_covering_range(0, 6, 13);
        assert_eq!(
            tiles,
            vec![
                Tile { index: 1, width: 4 },
                Tile { index: 2, width: 4 },
                Tile { index: 3, width: 1 },
            ]
        );
        assert!(geometry.tiles_covering_range(0, 13, 13).is_empty());
    }

    #[test]
    fn test_locate() {
        let geometry = TileGeometry::new(8).unwrap();
        assert_eq!(geometry.locate(0), (0, 0));
        assert_eq!(geometry.locate(255), (0, 255));
        assert_eq!(geometry.locate(256), (1, 0));
        assert_eq!(geometry.locate(1000), (3, 232));
        assert_eq!(TileGeometry::byte_offset(3), 96);
    }

    #[test]
    fn test_path_encoding() {
        let geometry = TileGeometry::new(8).unwrap();
        assert_eq!(
            geometry.path(TileLevel::Hashes(0), Tile { index: 1234067, width: 256 }),
            "tile/8/0/x001/x234/067"
        );
        assert_eq!(
            geometry.path(TileLevel::Data, Tile { index: 5, width: 13 }),
            "tile/8/data/005.p/13"
        );
        assert_eq!(
            geometry.path(TileLevel::Hashes(2), Tile { index: 1000, width: 1 }),
            "tile/8/2/x001/000.p/1"
        );
    }

    #[test]
    fn test_path_parse_roundtrip() {
        let geometry = TileGeometry::new(8).unwrap();
        for (level, tile) in [
            (TileLevel::Data, Tile { index: 0, width: 256 }),
            (TileLevel::Data, Tile { index: 42, width: 7 }),
            (TileLevel::Hashes(1), Tile { index: 1234067, width: 255 }),
            (TileLevel::Hashes(3), Tile { index: 999, width: 256 }),
        ] {
            let path = geometry.path(level, tile);
            let parsed = TileGeometry::parse_path(&path).unwrap();
            assert_eq!(parsed, (geometry, level, tile), "path {}", path);
        }
    }

    #[test]
    fn test_path_parse_rejects_garbage() {
        for path in [
            "tile/8/data",
            "tiles/8/data/000",
            "tile/8/data/1",
            "tile/8/data/001/002",
            "tile/8/data/000.p/0",
            "tile/8/data/000.p/256",
            "tile/99/data/000",
        ] {
            assert!(TileGeometry::parse_path(path).is_err(), "path {}", path);
        }
    }
}
