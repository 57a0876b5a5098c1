// Shared fixtures for the integration tests.
//
// Maps are rows of characters: `R` rock, `#` wall, `.` floor, `A` claimed
// by faction 0, `B` claimed by faction 1. Both factions are registered.

#![allow(dead_code)]

use deepdelve_sim::config::GameConfig;
use deepdelve_sim::faction::{Faction, FactionTable};
use deepdelve_sim::grid::TileGrid;
use deepdelve_sim::sim::SimState;
use deepdelve_sim::territory::Territory;
use deepdelve_sim::types::{FactionId, TilePos, TileType};
use deepdelve_sim::world::World;

pub const ALPHA: FactionId = FactionId(0);
pub const BETA: FactionId = FactionId(1);

pub fn factions() -> FactionTable {
    let mut table = FactionTable::new();
    for (id, name) in [(0, "Alpha"), (1, "Beta")] {
        table.insert(Faction {
            id: FactionId(id),
            name: name.into(),
            color: [0.5, 0.5, 0.5, 1.0],
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
                'A' => (TileType::Claimed, Some(ALPHA)),
                'B' => (TileType::Claimed, Some(BETA)),
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

pub fn sim_from_rows(rows: &[&str], seed: u64) -> SimState {
    SimState::new(world_from_rows(rows), GameConfig::default(), seed)
}
