// Persisted map shape and hydration.
//
// The core never reads save files on its own initiative; a collaborator
// hands it a `MapSnapshot` (usually parsed from JSON) and gets one back when
// saving. The shape:
//
// - `tiles`: one record per cell, `{x, y, type, faction, health, variation}`
//   with `faction = -1` for unclaimed and `health = -1.0` for tiles without
//   structural health.
// - `factions`: `{id, name, color, is_player, gold}`.
// - `creatures`: `{type, faction, x, y, level, xp, health, happiness}`. Ids
//   are not stored; hydration assigns them in record order.
// - `claim_progress`, `dig_markings`: position-keyed ledgers as record lists.
// - `portals`: optional.
//
// Dig-slot occupancy is not persisted. After a reload every face is empty
// and in-flight digging restarts from task assignment (wall health is kept).
//
// Hydration validates structure (dimensions, full tile coverage, known
// factions, creatures on walkable tiles) and reports the first problem as a
// `SnapshotError`. Ledger entries that no longer make sense on the restored
// grid are dropped with a warning rather than failing the load.

use crate::config::GameConfig;
use crate::creature::Creature;
use crate::faction::{Faction, FactionTable};
use crate::grid::{Tile, TileGrid};
use crate::sim::{Portal, SimState};
use crate::territory::{ClaimProgress, Territory};
use crate::types::{CreatureId, FactionId, Species, TilePos, TileType};
use crate::world::World;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Sentinel for "no faction" in the persisted shape.
pub const NO_FACTION: i64 = -1;
/// Sentinel for "no structural health" in the persisted shape.
pub const NO_HEALTH: f32 = -1.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    pub x: i32,
    pub y: i32,
    #[serde(rename = "type")]
    pub kind: TileType,
    pub faction: i64,
    pub health: f32,
    #[serde(default)]
    pub variation: u8,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactionRecord {
    pub id: u32,
    pub name: String,
    pub color: [f32; 4],
    pub is_player: bool,
    #[serde(default)]
    pub gold: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreatureRecord {
    #[serde(rename = "type")]
    pub species: Species,
    pub faction: u32,
    pub x: i32,
    pub y: i32,
    pub level: u32,
    pub xp: u32,
    pub health: f32,
    pub happiness: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub x: i32,
    pub y: i32,
    pub faction: u32,
    pub progress: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DigMarkRecord {
    pub x: i32,
    pub y: i32,
    pub faction: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapSnapshot {
    pub width: u32,
    pub height: u32,
    pub tiles: Vec<TileRecord>,
    pub factions: Vec<FactionRecord>,
    #[serde(default)]
    pub creatures: Vec<CreatureRecord>,
    #[serde(default)]
    pub claim_progress: Vec<ClaimRecord>,
    #[serde(default)]
    pub dig_markings: Vec<DigMarkRecord>,
    #[serde(default)]
    pub portals: Vec<Portal>,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to parse snapshot: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid map dimensions {width}x{height}")]
    Dimensions { width: u32, height: u32 },
    #[error("expected {expected} tile records, found {found}")]
    TileCount { expected: usize, found: usize },
    #[error("tile ({x}, {y}) is out of bounds or listed twice")]
    BadTile { x: i32, y: i32 },
    #[error("faction {0} is listed twice")]
    DuplicateFaction(u32),
    #[error("unknown faction {0}")]
    UnknownFaction(i64),
    #[error("creature #{index} at ({x}, {y}) is not on a walkable tile")]
    CreaturePosition { index: usize, x: i32, y: i32 },
    #[error("no species data for {0:?}")]
    MissingSpecies(Species),
}

impl MapSnapshot {
    pub fn from_json_str(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, SnapshotError> {
        let json = fs::read_to_string(path).map_err(|source| SnapshotError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn write_file(&self, path: &Path) -> Result<(), SnapshotError> {
        let json = self.to_json_string()?;
        fs::write(path, json).map_err(|source| SnapshotError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Capture the persisted shape of a running simulation.
    pub fn capture(sim: &SimState) -> Self {
        let territory = sim.world.territory();
        let grid = &territory.grid;
        let tiles = grid
            .iter()
            .map(|(pos, tile)| TileRecord {
                x: pos.x,
                y: pos.y,
                kind: tile.kind,
                faction: tile.owner.map_or(NO_FACTION, |f| i64::from(f.0)),
                health: tile.health.unwrap_or(NO_HEALTH),
                variation: tile.variation,
            })
            .collect();
        let factions = territory
            .factions
            .iter()
            .map(|f| FactionRecord {
                id: f.id.0,
                name: f.name.clone(),
                color: f.color,
                is_player: f.is_player,
                gold: f.gold,
            })
            .collect();
        let creatures = sim
            .creatures
            .values()
            .map(|c| CreatureRecord {
                species: c.species,
                faction: c.faction.0,
                x: c.tile.x,
                y: c.tile.y,
                level: c.level,
                xp: c.xp,
                health: c.health,
                happiness: c.happiness,
            })
            .collect();
        let claim_progress = territory
            .claims()
            .map(|(pos, claim)| ClaimRecord {
                x: pos.x,
                y: pos.y,
                faction: claim.faction.0,
                progress: claim.progress,
            })
            .collect();
        let dig_markings = territory
            .dig_marks()
            .map(|(pos, faction)| DigMarkRecord {
                x: pos.x,
                y: pos.y,
                faction: faction.0,
            })
            .collect();
        Self {
            width: grid.width(),
            height: grid.height(),
            tiles,
            factions,
            creatures,
            claim_progress,
            dig_markings,
            portals: sim.portals.clone(),
        }
    }

    /// Build the territory (grid, factions, ledgers) this snapshot describes.
    pub fn to_territory(&self) -> Result<Territory, SnapshotError> {
        if self.width == 0 || self.height == 0 {
            return Err(SnapshotError::Dimensions {
                width: self.width,
                height: self.height,
            });
        }

        let mut factions = FactionTable::new();
        for record in &self.factions {
            let inserted = factions.insert(Faction {
                id: FactionId(record.id),
                name: record.name.clone(),
                color: record.color,
                is_player: record.is_player,
                gold: record.gold,
            });
            if !inserted {
                return Err(SnapshotError::DuplicateFaction(record.id));
            }
        }

        let expected = self.width as usize * self.height as usize;
        if self.tiles.len() != expected {
            return Err(SnapshotError::TileCount {
                expected,
                found: self.tiles.len(),
            });
        }
        let mut grid = TileGrid::new(self.width, self.height, TileType::Rock);
        let mut seen = BTreeSet::new();
        for record in &self.tiles {
            let pos = TilePos::new(record.x, record.y);
            if !grid.in_bounds(pos) || !seen.insert(pos) {
                return Err(SnapshotError::BadTile {
                    x: record.x,
                    y: record.y,
                });
            }
            let owner = faction_from_record(&factions, record.faction)?;
            let health = if record.health < 0.0 {
                None
            } else {
                Some(record.health)
            };
            grid.put(
                pos,
                Tile {
                    kind: record.kind,
                    owner,
                    health,
                    variation: record.variation,
                },
            );
        }

        let mut territory = Territory::new(grid, factions);
        for record in &self.claim_progress {
            let pos = TilePos::new(record.x, record.y);
            let claim = ClaimProgress {
                faction: FactionId(record.faction),
                progress: record.progress,
            };
            if !territory.restore_claim(pos, claim) {
                tracing::warn!(
                    target: "deepdelve::snapshot",
                    x = record.x,
                    y = record.y,
                    "snapshot.claim_dropped"
                );
            }
        }
        for record in &self.dig_markings {
            let pos = TilePos::new(record.x, record.y);
            if !territory.mark_for_digging(pos, FactionId(record.faction)) {
                tracing::warn!(
                    target: "deepdelve::snapshot",
                    x = record.x,
                    y = record.y,
                    "snapshot.dig_mark_dropped"
                );
            }
        }
        Ok(territory)
    }

    /// Hydrate a full simulation from this snapshot.
    pub fn into_sim(self, config: GameConfig, seed: u64) -> Result<SimState, SnapshotError> {
        let territory = self.to_territory()?;
        let mut sim = SimState::new(World::new(territory), config, seed);

        for (index, record) in self.creatures.iter().enumerate() {
            let pos = TilePos::new(record.x, record.y);
            let faction = FactionId(record.faction);
            if !sim.world.territory().factions.contains(faction) {
                return Err(SnapshotError::UnknownFaction(i64::from(record.faction)));
            }
            if !sim.world.grid().is_walkable(pos) {
                return Err(SnapshotError::CreaturePosition {
                    index,
                    x: record.x,
                    y: record.y,
                });
            }
            let data = sim
                .config
                .species_data(record.species)
                .ok_or(SnapshotError::MissingSpecies(record.species))?;
            let mut creature = Creature::new(
                CreatureId(0),
                record.species,
                faction,
                pos,
                data,
                sim.config.tile_size,
            );
            creature.level = record.level.clamp(1, sim.config.max_level());
            creature.xp = record.xp;
            creature.health = record.health;
            creature.happiness = record.happiness.clamp(0.0, crate::creature::MAX_HAPPINESS);
            sim.adopt_creature(creature);
        }

        for portal in self.portals {
            let pos = portal.pos;
            if !sim.add_portal(portal) {
                tracing::warn!(
                    target: "deepdelve::snapshot",
                    x = pos.x,
                    y = pos.y,
                    "snapshot.portal_dropped"
                );
            }
        }

        tracing::info!(
            target: "deepdelve::snapshot",
            width = self.width,
            height = self.height,
            creatures = sim.creatures.len(),
            "snapshot.loaded"
        );
        Ok(sim)
    }
}

fn faction_from_record(
    factions: &FactionTable,
    raw: i64,
) -> Result<Option<FactionId>, SnapshotError> {
    if raw < 0 {
        return Ok(None);
    }
    let id = u32::try_from(raw).map_err(|_| SnapshotError::UnknownFaction(raw))?;
    if !factions.contains(FactionId(id)) {
        return Err(SnapshotError::UnknownFaction(raw));
    }
    Ok(Some(FactionId(id)))
}
