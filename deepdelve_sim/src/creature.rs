// Creature data and per-creature mechanics.
//
// `Creature` is the single unit type; species differences come from
// `SpeciesData`. This module owns the mechanics that touch only one
// creature: level/XP bookkeeping, happiness decay, and movement
// integration. The state machine that decides *what* a creature does lives
// in `behavior.rs`.
//
// Movement: the continuous visual `position` moves toward a target point at
// `speed(level) * tile_size` units per second. Arrival uses
// `arrival_epsilon`, not exact equality. Unused movement budget carries over
// to the next path node within the same tick. The discrete `tile` is
// recomputed from the position after every move, and `CreatureMoved` fires
// only when that cell actually changes.
//
// Happiness decays linearly and is floored at 0. `CreatureHappinessChanged`
// fires only when the value crosses into a different 5-point bucket.
//
// See also: `behavior.rs` for the state machine, `species.rs` for stats,
// `scheduler.rs` for task ownership (`current_task` only holds the id).

use crate::config::GameConfig;
use crate::event::{EventSink, SimEventKind};
use crate::handlers::Worker;
use crate::species::SpeciesData;
use crate::types::{CreatureId, CreatureState, FactionId, Species, TaskId, TilePos, Vec2};
use serde::{Deserialize, Serialize};

pub const MAX_HAPPINESS: f32 = 100.0;
const HAPPINESS_BUCKET: f32 = 5.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Creature {
    pub id: CreatureId,
    pub species: Species,
    pub faction: FactionId,
    pub level: u32,
    pub xp: u32,
    pub health: f32,
    /// 0–100.
    pub happiness: f32,
    /// Discrete grid cell, derived from `position`.
    pub tile: TilePos,
    /// Continuous visual position.
    pub position: Vec2,
    pub state: CreatureState,
    pub current_task: Option<TaskId>,
    /// Tiles to visit; `path[path_index]` is the next one.
    pub path: Vec<TilePos>,
    pub path_index: usize,
    /// Seconds until the next wander decision.
    pub wander_cooldown: f32,
    /// Precise point inside the work tile, set on entering WORKING.
    pub work_point: Option<Vec2>,
    pub at_work_point: bool,
}

impl Creature {
    pub fn new(
        id: CreatureId,
        species: Species,
        faction: FactionId,
        tile: TilePos,
        data: &SpeciesData,
        tile_size: f32,
    ) -> Self {
        Self {
            id,
            species,
            faction,
            level: 1,
            xp: 0,
            health: data.max_health(1),
            happiness: MAX_HAPPINESS,
            tile,
            position: tile.center(tile_size),
            state: CreatureState::Idle,
            current_task: None,
            path: Vec::new(),
            path_index: 0,
            wander_cooldown: 0.0,
            work_point: None,
            at_work_point: false,
        }
    }

    /// Snapshot of the fields task handlers need.
    pub fn worker(&self) -> Worker {
        Worker {
            id: self.id,
            faction: self.faction,
            species: self.species,
            tile: self.tile,
            level: self.level,
        }
    }

    pub fn set_state(&mut self, new: CreatureState, events: &mut EventSink) {
        if self.state == new {
            return;
        }
        let old = self.state;
        self.state = new;
        events.emit(SimEventKind::CreatureStateChanged {
            creature_id: self.id,
            old,
            new,
        });
    }

    /// Add XP and apply any level-ups. A level-up raises current health by
    /// the max-health gained. Returns whether the level changed.
    pub fn gain_xp(
        &mut self,
        amount: u32,
        config: &GameConfig,
        data: &SpeciesData,
        events: &mut EventSink,
    ) -> bool {
        self.xp = self.xp.saturating_add(amount);
        let new_level = config.level_for_xp(self.xp);
        if new_level <= self.level {
            return false;
        }
        let gained = data.max_health(new_level) - data.max_health(self.level);
        self.health = (self.health + gained).min(data.max_health(new_level));
        self.level = new_level;
        events.emit(SimEventKind::CreatureLeveledUp {
            creature_id: self.id,
            level: new_level,
        });
        tracing::info!(
            target: "deepdelve::sim",
            creature = self.id.0,
            level = new_level,
            "creature.leveled_up"
        );
        true
    }

    pub fn decay_happiness(&mut self, delta: f32, rate: f32, events: &mut EventSink) {
        if self.happiness <= 0.0 {
            return;
        }
        let before = (self.happiness / HAPPINESS_BUCKET).floor();
        self.happiness = (self.happiness - rate * delta).max(0.0);
        let after = (self.happiness / HAPPINESS_BUCKET).floor();
        if before != after {
            events.emit(SimEventKind::CreatureHappinessChanged {
                creature_id: self.id,
                happiness: self.happiness,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Movement
    // -----------------------------------------------------------------------

    /// Start following `path`. A leading entry equal to the current tile is
    /// still visited so the creature re-centers before moving on.
    pub fn set_path(&mut self, path: Vec<TilePos>) {
        self.path = path;
        self.path_index = 0;
    }

    pub fn clear_path(&mut self) {
        self.path.clear();
        self.path_index = 0;
    }

    pub fn path_exhausted(&self) -> bool {
        self.path_index >= self.path.len()
    }

    fn sync_tile(&mut self, tile_size: f32, events: &mut EventSink) {
        let cell = TilePos::containing(self.position, tile_size);
        if cell != self.tile {
            events.emit(SimEventKind::CreatureMoved {
                creature_id: self.id,
                from: self.tile,
                to: cell,
            });
            self.tile = cell;
        }
    }

    /// Advance along the current path. Returns `true` once the path is
    /// exhausted.
    pub fn advance_along_path(
        &mut self,
        delta: f32,
        speed: f32,
        config: &GameConfig,
        events: &mut EventSink,
    ) -> bool {
        let tile_size = config.tile_size;
        let mut budget = speed * tile_size * delta;
        while let Some(&next) = self.path.get(self.path_index) {
            let target = next.center(tile_size);
            let dist = self.position.distance(target);
            if dist <= config.arrival_epsilon {
                self.position = target;
                self.sync_tile(tile_size, events);
                self.path_index += 1;
                continue;
            }
            if budget <= 0.0 {
                break;
            }
            let (moved_to, _) = self.position.move_toward(target, budget);
            budget -= dist.min(budget);
            self.position = moved_to;
            self.sync_tile(tile_size, events);
            if self.position.distance(target) > config.arrival_epsilon {
                break;
            }
        }
        self.path_exhausted()
    }

    /// Move toward a free point (work point). Returns `true` on arrival.
    pub fn move_toward_point(
        &mut self,
        target: Vec2,
        delta: f32,
        speed: f32,
        config: &GameConfig,
        events: &mut EventSink,
    ) -> bool {
        if self.position.distance(target) <= config.arrival_epsilon {
            self.position = target;
            return true;
        }
        let (moved_to, _) = self
            .position
            .move_toward(target, speed * config.tile_size * delta);
        self.position = moved_to;
        self.sync_tile(config.tile_size, events);
        let arrived = self.position.distance(target) <= config.arrival_epsilon;
        if arrived {
            self.position = target;
        }
        arrived
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imp_at(x: i32, y: i32) -> Creature {
        Creature::new(
            CreatureId(0),
            Species::Imp,
            FactionId(0),
            TilePos::new(x, y),
            &SpeciesData::imp(),
            1.0,
        )
    }

    #[test]
    fn new_creature_starts_centered_and_idle() {
        let c = imp_at(2, 3);
        assert_eq!(c.position, Vec2::new(2.5, 3.5));
        assert_eq!(c.state, CreatureState::Idle);
        assert_eq!(c.health, SpeciesData::imp().base_health);
        assert_eq!(c.happiness, MAX_HAPPINESS);
    }

    #[test]
    fn set_state_emits_only_on_change() {
        let mut c = imp_at(0, 0);
        let mut events = EventSink::new(0);
        c.set_state(CreatureState::Idle, &mut events);
        assert!(events.is_empty());
        c.set_state(CreatureState::Walking, &mut events);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn gain_xp_levels_up_and_raises_health() {
        let config = GameConfig::default();
        let data = SpeciesData::imp();
        let mut c = imp_at(0, 0);
        let mut events = EventSink::new(0);
        assert!(!c.gain_xp(50, &config, &data, &mut events));
        assert!(c.gain_xp(60, &config, &data, &mut events));
        assert_eq!(c.level, 2);
        assert_eq!(c.health, data.max_health(2));
        assert!(matches!(
            events.events()[0].kind,
            SimEventKind::CreatureLeveledUp { level: 2, .. }
        ));
    }

    #[test]
    fn happiness_events_only_on_bucket_crossing() {
        let mut c = imp_at(0, 0);
        let mut events = EventSink::new(0);
        // 100 -> 99: bucket 20 -> 19.
        c.decay_happiness(1.0, 1.0, &mut events);
        assert_eq!(events.len(), 1);
        // 99 -> 96: same bucket.
        c.decay_happiness(3.0, 1.0, &mut events);
        assert_eq!(events.len(), 1);
        // 96 -> 94: crosses 95.
        c.decay_happiness(2.0, 1.0, &mut events);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn happiness_floors_at_zero() {
        let mut c = imp_at(0, 0);
        let mut events = EventSink::new(0);
        c.decay_happiness(10_000.0, 1.0, &mut events);
        assert_eq!(c.happiness, 0.0);
        let n = events.len();
        c.decay_happiness(1.0, 1.0, &mut events);
        assert_eq!(events.len(), n);
    }

    #[test]
    fn walking_carries_budget_across_nodes_and_reports_cell_changes() {
        let config = GameConfig::default();
        let mut c = imp_at(0, 0);
        let mut events = EventSink::new(0);
        c.set_path(vec![TilePos::new(0, 0), TilePos::new(1, 0), TilePos::new(2, 0)]);
        // 1.5 tiles of budget: reaches (1,0) center and half of the next hop.
        assert!(!c.advance_along_path(0.5, 3.0, &config, &mut events));
        assert!((c.position.x - 2.0).abs() < 1e-4);
        assert_eq!(c.tile, TilePos::new(2, 0));
        assert!(c.advance_along_path(1.0, 3.0, &config, &mut events));
        assert_eq!(c.position, TilePos::new(2, 0).center(1.0));

        let moves: Vec<_> = events
            .events()
            .iter()
            .filter_map(|e| match e.kind {
                SimEventKind::CreatureMoved { to, .. } => Some(to),
                _ => None,
            })
            .collect();
        assert_eq!(moves, vec![TilePos::new(1, 0), TilePos::new(2, 0)]);
    }

    #[test]
    fn zero_delta_does_not_move() {
        let config = GameConfig::default();
        let mut c = imp_at(0, 0);
        let mut events = EventSink::new(0);
        c.set_path(vec![TilePos::new(0, 0), TilePos::new(1, 0)]);
        assert!(!c.advance_along_path(0.0, 3.0, &config, &mut events));
        assert_eq!(c.position, Vec2::new(0.5, 0.5));
    }

    #[test]
    fn move_toward_point_arrives_within_epsilon() {
        let config = GameConfig::default();
        let mut c = imp_at(0, 0);
        let mut events = EventSink::new(0);
        let target = Vec2::new(0.5, 0.2);
        assert!(!c.move_toward_point(target, 0.05, 1.0, &config, &mut events));
        assert!(c.move_toward_point(target, 1.0, 1.0, &config, &mut events));
        assert_eq!(c.position, target);
        assert!(events.is_empty(), "stayed in the same cell");
    }
}
