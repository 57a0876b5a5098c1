// World facade: territory and nav graph kept in lockstep.
//
// `World` owns the `Territory` (grid + ledgers) and the `NavGraph` derived
// from it. Every mutation that can change a tile's type goes through here so
// the change is forwarded to `NavGraph::on_tile_type_changed()` in the same
// call; the nav graph is never rebuilt after load. The mutators also emit
// the matching `SimEventKind`s into the caller's `EventSink`.
//
// Read access to the territory is unrestricted (`territory()`). There is no
// `territory_mut()`; tile changes go through the methods below.
//
// See also: `territory.rs` for the bookkeeping rules, `nav.rs` and
// `pathfinding.rs` for the graph and searches, `event.rs` for the events.

use crate::event::{EventSink, SimEventKind};
use crate::grid::{OwnerChange, TileChange, TileGrid};
use crate::nav::NavGraph;
use crate::pathfinding;
use crate::territory::{ClaimOutcome, Territory};
use crate::types::{CreatureId, Direction, FactionId, TilePos, TileType};
use rand::Rng;

#[derive(Clone, Debug, Default)]
pub struct World {
    territory: Territory,
    nav: NavGraph,
}

impl World {
    pub fn new(territory: Territory) -> Self {
        let nav = NavGraph::build(&territory.grid);
        Self { territory, nav }
    }

    pub fn territory(&self) -> &Territory {
        &self.territory
    }

    pub fn grid(&self) -> &TileGrid {
        &self.territory.grid
    }

    pub fn nav(&self) -> &NavGraph {
        &self.nav
    }

    /// Full nav rebuild from the current grid.
    pub fn rebuild_nav(&mut self) {
        self.nav.rebuild_graph(&self.territory.grid);
    }

    fn on_type_change(&mut self, change: TileChange, events: &mut EventSink) {
        self.nav.on_tile_type_changed(&change);
        events.emit(SimEventKind::TileTypeChanged {
            pos: change.pos,
            old: change.old,
            new: change.new,
        });
    }

    fn on_owner_change(change: OwnerChange, events: &mut EventSink) {
        events.emit(SimEventKind::TileOwnerChanged {
            pos: change.pos,
            old: change.old,
            new: change.new,
        });
    }

    // -----------------------------------------------------------------------
    // Tile mutation
    // -----------------------------------------------------------------------

    /// Returns whether the type changed.
    pub fn set_tile_type(&mut self, pos: TilePos, kind: TileType, events: &mut EventSink) -> bool {
        match self.territory.set_tile_type(pos, kind) {
            Some(change) => {
                self.on_type_change(change, events);
                true
            }
            None => false,
        }
    }

    /// Returns whether the owner changed.
    pub fn set_tile_faction(
        &mut self,
        pos: TilePos,
        faction: Option<FactionId>,
        events: &mut EventSink,
    ) -> bool {
        match self.territory.set_tile_faction(pos, faction) {
            Some(change) => {
                Self::on_owner_change(change, events);
                true
            }
            None => false,
        }
    }

    /// Feed claim work into the contest ledger and report what happened.
    pub fn add_claim_progress(
        &mut self,
        pos: TilePos,
        faction: FactionId,
        amount: f32,
        events: &mut EventSink,
    ) -> ClaimOutcome {
        let outcome = self.territory.add_claim_progress(pos, faction, amount);
        match outcome {
            ClaimOutcome::Rejected => {}
            ClaimOutcome::Started { progress } | ClaimOutcome::Flipped { progress } => {
                events.emit(SimEventKind::ClaimStarted { pos, faction });
                events.emit(SimEventKind::ClaimProgress {
                    pos,
                    faction,
                    progress,
                });
            }
            ClaimOutcome::Advanced { progress } => {
                events.emit(SimEventKind::ClaimProgress {
                    pos,
                    faction,
                    progress,
                });
            }
            ClaimOutcome::Contested { leader, progress } => {
                events.emit(SimEventKind::ClaimProgress {
                    pos,
                    faction: leader,
                    progress,
                });
            }
            ClaimOutcome::Completed {
                type_change,
                owner_change,
            } => {
                if let Some(change) = type_change {
                    self.on_type_change(change, events);
                }
                if let Some(change) = owner_change {
                    Self::on_owner_change(change, events);
                }
                events.emit(SimEventKind::ClaimCompleted { pos, faction });
                tracing::info!(
                    target: "deepdelve::territory",
                    x = pos.x,
                    y = pos.y,
                    faction = faction.0,
                    "claim.completed"
                );
            }
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // Digging
    // -----------------------------------------------------------------------

    pub fn mark_for_digging(
        &mut self,
        pos: TilePos,
        faction: FactionId,
        events: &mut EventSink,
    ) -> bool {
        let marked = self.territory.mark_for_digging(pos, faction);
        if marked {
            events.emit(SimEventKind::DigMarked { pos, faction });
        }
        marked
    }

    pub fn unmark_for_digging(&mut self, pos: TilePos, events: &mut EventSink) -> Option<FactionId> {
        let previous = self.territory.unmark_for_digging(pos);
        if let Some(faction) = previous {
            events.emit(SimEventKind::DigUnmarked { pos, faction });
        }
        previous
    }

    /// Apply dig damage. Emits `DigProgress` only when the displayed
    /// (rounded-up) health changes. Returns the remaining float health.
    pub fn damage_wall(&mut self, pos: TilePos, amount: f32, events: &mut EventSink) -> Option<f32> {
        let before = self.territory.dig_health(pos);
        let remaining = self.territory.damage_wall(pos, amount)?;
        let after = self.territory.dig_health(pos);
        if let Some(health) = after {
            if after != before {
                events.emit(SimEventKind::DigProgress { pos, health });
            }
        }
        Some(remaining)
    }

    /// Excavate a wall: it becomes floor and every dig record for it is
    /// dropped. Returns `false` if the tile is not diggable.
    pub fn complete_dig(&mut self, pos: TilePos, events: &mut EventSink) -> bool {
        if !self.territory.grid.is_diggable(pos) {
            return false;
        }
        let faction = self.territory.marked_by(pos);
        self.set_tile_type(pos, TileType::Floor, events);
        self.territory.clear_dig_metadata(pos);
        events.emit(SimEventKind::DigCompleted { pos, faction });
        tracing::info!(target: "deepdelve::territory", x = pos.x, y = pos.y, "dig.completed");
        true
    }

    pub fn claim_dig_slot(
        &mut self,
        wall: TilePos,
        dir: Direction,
        creature: CreatureId,
    ) -> Option<usize> {
        self.territory.claim_dig_slot(wall, dir, creature)
    }

    pub fn release_dig_slot(&mut self, wall: TilePos, dir: Direction, creature: CreatureId) -> bool {
        self.territory.release_dig_slot(wall, dir, creature)
    }

    pub fn release_all_slots_of(&mut self, creature: CreatureId) {
        self.territory.release_all_slots_of(creature);
    }

    // -----------------------------------------------------------------------
    // Searches
    // -----------------------------------------------------------------------

    pub fn find_path(&self, from: TilePos, to: TilePos) -> Vec<TilePos> {
        pathfinding::find_path(&self.nav, from, to)
    }

    pub fn find_path_in_territory(
        &self,
        from: TilePos,
        to: TilePos,
        faction: FactionId,
    ) -> Vec<TilePos> {
        pathfinding::find_path_in_territory(&self.nav, &self.territory.grid, from, to, faction)
    }

    pub fn find_nearest_tile(
        &self,
        from: TilePos,
        predicate: impl FnMut(TilePos) -> bool,
        max_distance: u32,
    ) -> Option<TilePos> {
        pathfinding::find_nearest_tile(&self.nav, &self.territory.grid, from, predicate, max_distance)
    }

    pub fn get_random_walkable_neighbor<R: Rng>(
        &self,
        pos: TilePos,
        faction: Option<FactionId>,
        rng: &mut R,
    ) -> Option<TilePos> {
        pathfinding::get_random_walkable_neighbor(&self.nav, &self.territory.grid, pos, faction, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faction::{Faction, FactionTable};

    fn world_with_floor_strip() -> World {
        let mut grid = TileGrid::new(4, 3, TileType::Wall);
        for x in 0..4 {
            grid.set_tile_type(TilePos::new(x, 1), TileType::Floor);
        }
        let mut factions = FactionTable::new();
        factions.insert(Faction {
            id: FactionId(0),
            name: "Keeper".into(),
            color: [0.2, 0.4, 1.0, 1.0],
            is_player: true,
            gold: 0,
        });
        World::new(Territory::new(grid, factions))
    }

    #[test]
    fn tile_changes_keep_nav_in_sync() {
        let mut world = world_with_floor_strip();
        let mut events = EventSink::new(0);
        assert!(world.set_tile_type(TilePos::new(1, 0), TileType::Floor, &mut events));
        assert!(world.set_tile_type(TilePos::new(2, 1), TileType::Wall, &mut events));
        assert_eq!(*world.nav(), NavGraph::build(world.grid()));
        assert_eq!(events.len(), 2);
        assert!(!world.set_tile_type(TilePos::new(2, 1), TileType::Wall, &mut events));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn completed_dig_opens_the_wall() {
        let mut world = world_with_floor_strip();
        let mut events = EventSink::new(0);
        let wall = TilePos::new(1, 0);
        assert!(world.mark_for_digging(wall, FactionId(0), &mut events));
        world.claim_dig_slot(wall, Direction::South, CreatureId(1));
        assert!(world.complete_dig(wall, &mut events));

        assert_eq!(world.grid().tile_type(wall), Some(TileType::Floor));
        assert!(world.nav().has_node(wall));
        assert_eq!(world.territory().marked_by(wall), None);
        assert_eq!(world.territory().occupied_face_count(), 0);
        assert!(events.events().iter().any(|e| matches!(
            e.kind,
            SimEventKind::DigCompleted {
                faction: Some(FactionId(0)),
                ..
            }
        )));
    }

    #[test]
    fn dig_progress_emits_only_on_displayed_change() {
        let mut world = world_with_floor_strip();
        let mut events = EventSink::new(0);
        let wall = TilePos::new(0, 0);
        world.damage_wall(wall, 0.25, &mut events);
        assert!(events.is_empty(), "99.75 still displays as 100");
        world.damage_wall(wall, 1.0, &mut events);
        assert_eq!(
            events.events()[0].kind,
            SimEventKind::DigProgress {
                pos: wall,
                health: 99
            }
        );
    }

    #[test]
    fn claim_completion_emits_tile_and_claim_events() {
        let mut world = world_with_floor_strip();
        let mut events = EventSink::new(0);
        let pos = TilePos::new(0, 1);
        world.add_claim_progress(pos, FactionId(0), 60.0, &mut events);
        world.add_claim_progress(pos, FactionId(0), 60.0, &mut events);
        let kinds: Vec<_> = events.events().iter().map(|e| &e.kind).collect();
        assert!(matches!(kinds[0], SimEventKind::ClaimStarted { .. }));
        assert!(kinds.iter().any(|k| matches!(
            k,
            SimEventKind::TileTypeChanged {
                new: TileType::Claimed,
                ..
            }
        )));
        assert!(matches!(kinds.last(), Some(SimEventKind::ClaimCompleted { .. })));
        assert_eq!(world.grid().owner(pos), Some(FactionId(0)));
    }
}
