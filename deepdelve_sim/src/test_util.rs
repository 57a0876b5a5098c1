// Shared fixtures for unit tests.
//
// Maps are written as rows of characters:
//   `R` rock, `#` wall, `.` floor, `A` claimed by faction 0,
//   `B` claimed by faction 1.
// Factions 0 ("Alpha", player) and 1 ("Beta") are always registered.

use crate::faction::{Faction, FactionTable};
use crate::grid::TileGrid;
use crate::territory::Territory;
use crate::types::{FactionId, TilePos, TileType};
use crate::world::World;

pub fn factions() -> FactionTable {
    let mut table = FactionTable::new();
    for (id, name) in [(0, "Alpha"), (1, "Beta")] {
        table.insert(Faction {
            id: FactionId(id),
            name: name.into(),
            color: [1.0, 1.0, 1.0, 1.0],
            is_player: id == 0,
            gold: 0,
        });
    }
    table
}

pub fn grid_from_rows(rows: &[&str]) -> TileGrid {
    let width = rows.first().map_or(0, |r| r.len()) as u32;
    let mut grid = TileGrid::new(width, rows.len() as u32, TileType::Wall);
    for (y, row) in rows.iter().enumerate() {
        for (x, c) in row.chars().enumerate() {
            let pos = TilePos::new(x as i32, y as i32);
            let (kind, owner) = match c {
                'R' => (TileType::Rock, None),
                '.' => (TileType::Floor, None),
                'A' => (TileType::Claimed, Some(FactionId(0))),
                'B' => (TileType::Claimed, Some(FactionId(1))),
                _ => (TileType::Wall, None),
            };
            grid.set_tile_type(pos, kind);
            grid.set_tile_faction(pos, owner);
        }
    }
    grid
}

pub fn world_from_rows(rows: &[&str]) -> World {
    World::new(Territory::new(grid_from_rows(rows), factions()))
}
