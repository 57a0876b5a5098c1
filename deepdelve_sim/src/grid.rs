// Dense 2D tile grid: the authoritative terrain and ownership store.
//
// The grid is a flat `Vec<Tile>` indexed by `x + y * width`, giving O(1)
// read/write access. It is created once (bulk fill or snapshot hydration)
// and never resized; tiles are mutated in place and never deleted.
//
// Out-of-bounds reads return `None`; out-of-bounds writes are no-ops that
// return `None`. Mutators return the `(old, new)` change only when
// something actually changed, so callers (see `world.rs`) can forward
// change notifications to the nav graph and the event stream without
// emitting spurious events.
//
// See also: `territory.rs` for the claim/dig ledgers layered over the grid,
// `nav.rs` for the walkability graph derived from it, `types.rs` for the
// `TileType` property table.

use crate::types::{FactionId, TilePos, TileType};
use serde::{Deserialize, Serialize};

/// A single grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub kind: TileType,
    pub owner: Option<FactionId>,
    /// Remaining structural health. Only meaningful for diggable tiles.
    pub health: Option<f32>,
    /// Cosmetic variant index for renderers. Ignored by sim logic.
    pub variation: u8,
}

impl Tile {
    pub fn new(kind: TileType) -> Self {
        Self {
            kind,
            owner: None,
            health: kind.default_health(),
            variation: 0,
        }
    }
}

impl Default for Tile {
    fn default() -> Self {
        Self::new(TileType::Rock)
    }
}

/// A tile type transition, returned only when the type actually changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileChange {
    pub pos: TilePos,
    pub old: TileType,
    pub new: TileType,
}

/// An ownership transition, returned only when the owner actually changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OwnerChange {
    pub pos: TilePos,
    pub old: Option<FactionId>,
    pub new: Option<FactionId>,
}

/// Dense, fixed-size 2D tile grid.
#[derive(Clone, Debug, Default)]
pub struct TileGrid {
    /// Flat storage: index = x + y * width.
    tiles: Vec<Tile>,
    width: u32,
    height: u32,
}

impl TileGrid {
    /// Create a grid filled with tiles of one type.
    pub fn new(width: u32, height: u32, fill: TileType) -> Self {
        let total = width as usize * height as usize;
        Self {
            tiles: vec![Tile::new(fill); total],
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Check whether a position is within bounds.
    pub fn in_bounds(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    /// Convert a position to a flat index. Returns `None` if out of bounds.
    pub fn index(&self, pos: TilePos) -> Option<usize> {
        if self.in_bounds(pos) {
            Some(pos.x as usize + pos.y as usize * self.width as usize)
        } else {
            None
        }
    }

    /// Inverse of `index`.
    pub fn pos_of(&self, index: usize) -> TilePos {
        let w = self.width as usize;
        TilePos::new((index % w) as i32, (index / w) as i32)
    }

    pub fn get(&self, pos: TilePos) -> Option<&Tile> {
        self.index(pos).map(|i| &self.tiles[i])
    }

    pub fn tile_type(&self, pos: TilePos) -> Option<TileType> {
        self.get(pos).map(|t| t.kind)
    }

    pub fn owner(&self, pos: TilePos) -> Option<FactionId> {
        self.get(pos).and_then(|t| t.owner)
    }

    /// `false` for out-of-bounds positions.
    pub fn is_walkable(&self, pos: TilePos) -> bool {
        self.tile_type(pos).is_some_and(TileType::is_walkable)
    }

    pub fn is_diggable(&self, pos: TilePos) -> bool {
        self.tile_type(pos).is_some_and(TileType::is_diggable)
    }

    pub fn is_claimable(&self, pos: TilePos) -> bool {
        self.tile_type(pos).is_some_and(TileType::is_claimable)
    }

    /// Reassign a tile's type and reset its health to the type's default.
    /// Returns the transition iff the type changed.
    pub fn set_tile_type(&mut self, pos: TilePos, kind: TileType) -> Option<TileChange> {
        let i = self.index(pos)?;
        let tile = &mut self.tiles[i];
        if tile.kind == kind {
            return None;
        }
        let old = tile.kind;
        tile.kind = kind;
        tile.health = kind.default_health();
        Some(TileChange { pos, old, new: kind })
    }

    /// Reassign a tile's owner. Returns the transition iff the owner changed.
    pub fn set_tile_faction(
        &mut self,
        pos: TilePos,
        faction: Option<FactionId>,
    ) -> Option<OwnerChange> {
        let i = self.index(pos)?;
        let tile = &mut self.tiles[i];
        if tile.owner == faction {
            return None;
        }
        let old = tile.owner;
        tile.owner = faction;
        Some(OwnerChange {
            pos,
            old,
            new: faction,
        })
    }

    /// Overwrite a tile's health. No-op out of bounds.
    pub fn set_health(&mut self, pos: TilePos, health: Option<f32>) {
        if let Some(i) = self.index(pos) {
            self.tiles[i].health = health;
        }
    }

    pub fn set_variation(&mut self, pos: TilePos, variation: u8) {
        if let Some(i) = self.index(pos) {
            self.tiles[i].variation = variation;
        }
    }

    /// Replace a whole tile (used by snapshot hydration).
    pub fn put(&mut self, pos: TilePos, tile: Tile) -> bool {
        match self.index(pos) {
            Some(i) => {
                self.tiles[i] = tile;
                true
            }
            None => false,
        }
    }

    /// True iff any of the 4 cardinal neighbors is owned by `faction`.
    pub fn is_adjacent_to_faction(&self, pos: TilePos, faction: FactionId) -> bool {
        pos.neighbors()
            .iter()
            .any(|&(_, n)| self.owner(n) == Some(faction))
    }

    /// All positions in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = TilePos> + '_ {
        (0..self.tiles.len()).map(|i| self.pos_of(i))
    }

    /// All tiles with their positions, row-major.
    pub fn iter(&self) -> impl Iterator<Item = (TilePos, &Tile)> + '_ {
        self.tiles
            .iter()
            .enumerate()
            .map(|(i, t)| (self.pos_of(i), t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_grid_is_filled() {
        let grid = TileGrid::new(4, 3, TileType::Wall);
        assert_eq!(grid.len(), 12);
        for pos in grid.positions() {
            assert_eq!(grid.tile_type(pos), Some(TileType::Wall));
            assert_eq!(grid.get(pos).unwrap().health, Some(100.0));
        }
    }

    #[test]
    fn out_of_bounds_reads_are_none() {
        let grid = TileGrid::new(4, 4, TileType::Floor);
        assert_eq!(grid.tile_type(TilePos::new(-1, 0)), None);
        assert_eq!(grid.tile_type(TilePos::new(0, 4)), None);
        assert!(!grid.is_walkable(TilePos::new(100, 100)));
    }

    #[test]
    fn out_of_bounds_writes_are_noops() {
        let mut grid = TileGrid::new(4, 4, TileType::Floor);
        assert_eq!(grid.set_tile_type(TilePos::new(-1, 0), TileType::Wall), None);
        assert_eq!(
            grid.set_tile_faction(TilePos::new(4, 4), Some(FactionId(1))),
            None
        );
        assert!(!grid.put(TilePos::new(9, 9), Tile::new(TileType::Wall)));
    }

    #[test]
    fn set_tile_type_reports_change_and_resets_health() {
        let mut grid = TileGrid::new(4, 4, TileType::Wall);
        let pos = TilePos::new(1, 2);
        grid.set_health(pos, Some(12.0));

        let change = grid.set_tile_type(pos, TileType::Floor).unwrap();
        assert_eq!(change.old, TileType::Wall);
        assert_eq!(change.new, TileType::Floor);
        assert_eq!(grid.get(pos).unwrap().health, None);

        // Same type again is a no-op.
        assert_eq!(grid.set_tile_type(pos, TileType::Floor), None);
    }

    #[test]
    fn set_tile_faction_reports_only_real_changes() {
        let mut grid = TileGrid::new(4, 4, TileType::Floor);
        let pos = TilePos::new(0, 0);
        let change = grid.set_tile_faction(pos, Some(FactionId(2))).unwrap();
        assert_eq!(change.old, None);
        assert_eq!(change.new, Some(FactionId(2)));
        assert_eq!(grid.set_tile_faction(pos, Some(FactionId(2))), None);
    }

    #[test]
    fn adjacency_uses_cardinal_neighbors_only() {
        let mut grid = TileGrid::new(5, 5, TileType::Floor);
        grid.set_tile_faction(TilePos::new(2, 2), Some(FactionId(0)));

        assert!(grid.is_adjacent_to_faction(TilePos::new(2, 1), FactionId(0)));
        assert!(grid.is_adjacent_to_faction(TilePos::new(3, 2), FactionId(0)));
        // Diagonal does not count.
        assert!(!grid.is_adjacent_to_faction(TilePos::new(3, 3), FactionId(0)));
        // Other faction does not count.
        assert!(!grid.is_adjacent_to_faction(TilePos::new(2, 1), FactionId(1)));
        // Grid edges are fine.
        assert!(!grid.is_adjacent_to_faction(TilePos::new(0, 0), FactionId(0)));
    }

    #[test]
    fn index_roundtrips_through_pos_of() {
        let grid = TileGrid::new(7, 5, TileType::Rock);
        for pos in grid.positions() {
            let i = grid.index(pos).unwrap();
            assert_eq!(grid.pos_of(i), pos);
        }
    }
}
