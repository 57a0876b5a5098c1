// Territory model: the grid plus the ledgers layered on top of it.
//
// `Territory` owns the `TileGrid`, the `FactionTable`, and three sparse
// ledgers keyed by tile position:
//
// - **Claim progress** (`claims`): one entry per tile that is actively being
//   claimed or contested. An entry records which faction currently leads the
//   contest and how far along it is (0–100). Entries are removed on
//   completion, so the map never grows beyond the number of live contests.
//
// - **Dig markings** (`dig_marks`): wall → faction that marked it. A marking
//   lives until the wall is excavated or explicitly unmarked.
//
// - **Dig slots** (`dig_slots`): (wall, face direction) → up to
//   `MAX_DIGGERS_PER_FACE` creature ids. A face is eligible only while the
//   tile on its far side is walkable. Slot indices are stable for the
//   lifetime of an occupancy so renderers can spread diggers along the face;
//   a released index is reused by the next claimant. Empty faces are pruned.
//
// ## Claim contest rules
//
// `add_claim_progress(pos, faction, amount)`:
// - No contest yet: one starts for `faction` with `amount` progress.
// - Same faction leads: progress rises (clamped to 100); 100 completes.
// - Another faction leads: `amount` is subtracted. If progress drops to 0 or
//   below, the *contest* flips to `faction` and the deficit carries over as
//   its head start (`abs(progress)`). Tile ownership does not change until a
//   contest completes.
// - Completion converts the tile to `Claimed`, grants ownership, and deletes
//   the ledger entry.
//
// Every operation here is pure bookkeeping: no events, no nav updates.
// `world.rs` wraps these calls to emit events and keep the nav graph in
// sync. Invalid input (out-of-bounds, wrong tile type, unknown faction) is a
// no-op that returns a failure value, never a panic.
//
// **Critical constraint: determinism.** All ledgers are `BTreeMap`s.

use crate::faction::FactionTable;
use crate::grid::{OwnerChange, TileChange, TileGrid};
use crate::types::{CreatureId, Direction, FactionId, TilePos, TileType};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Maximum number of creatures digging one wall face at the same time.
pub const MAX_DIGGERS_PER_FACE: usize = 3;

/// Claim progress at which a contest completes.
pub const CLAIM_COMPLETE: f32 = 100.0;

/// An active contest over one tile.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClaimProgress {
    /// The faction currently leading the contest.
    pub faction: FactionId,
    /// Progress in [0, 100].
    pub progress: f32,
}

/// Result of one `add_claim_progress` call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClaimOutcome {
    /// Out of bounds, not claimable, already owned by the faction, unknown
    /// faction, or a non-positive amount.
    Rejected,
    /// A new contest was opened for the faction.
    Started { progress: f32 },
    /// The faction's own contest advanced.
    Advanced { progress: f32 },
    /// Another faction still leads; its progress was reduced.
    Contested { leader: FactionId, progress: f32 },
    /// The contest flipped to the faction with the carried-over deficit.
    Flipped { progress: f32 },
    /// The tile is now owned by the faction.
    Completed {
        type_change: Option<TileChange>,
        owner_change: Option<OwnerChange>,
    },
}

/// Slot occupancy for one wall face. Index = slot number.
pub type FaceSlots = [Option<CreatureId>; MAX_DIGGERS_PER_FACE];

/// The grid together with faction, claim, and dig bookkeeping.
#[derive(Clone, Debug, Default)]
pub struct Territory {
    pub grid: TileGrid,
    pub factions: FactionTable,
    claims: BTreeMap<TilePos, ClaimProgress>,
    dig_marks: BTreeMap<TilePos, FactionId>,
    dig_slots: BTreeMap<(TilePos, Direction), FaceSlots>,
}

impl Territory {
    pub fn new(grid: TileGrid, factions: FactionTable) -> Self {
        Self {
            grid,
            factions,
            ..Self::default()
        }
    }

    // -----------------------------------------------------------------------
    // Tile mutation
    // -----------------------------------------------------------------------

    /// Set a tile's type. A tile that stops being diggable loses its dig
    /// marking and slots; one that stops being claimable loses its contest.
    pub fn set_tile_type(&mut self, pos: TilePos, kind: TileType) -> Option<TileChange> {
        let change = self.grid.set_tile_type(pos, kind)?;
        if !kind.is_diggable() {
            self.clear_dig_metadata(pos);
        }
        if !kind.is_claimable() {
            self.claims.remove(&pos);
        }
        Some(change)
    }

    pub fn set_tile_faction(
        &mut self,
        pos: TilePos,
        faction: Option<FactionId>,
    ) -> Option<OwnerChange> {
        if let Some(id) = faction {
            if !self.factions.contains(id) {
                return None;
            }
        }
        self.grid.set_tile_faction(pos, faction)
    }

    pub fn is_adjacent_to_faction(&self, pos: TilePos, faction: FactionId) -> bool {
        self.grid.is_adjacent_to_faction(pos, faction)
    }

    /// Whether `faction` could ever claim this tile: claimable type and not
    /// already its own.
    pub fn is_claimable_by(&self, pos: TilePos, faction: FactionId) -> bool {
        self.grid
            .get(pos)
            .is_some_and(|t| t.kind.is_claimable() && t.owner != Some(faction))
    }

    // -----------------------------------------------------------------------
    // Claim ledger
    // -----------------------------------------------------------------------

    pub fn add_claim_progress(
        &mut self,
        pos: TilePos,
        faction: FactionId,
        amount: f32,
    ) -> ClaimOutcome {
        if !(amount > 0.0) || !self.factions.contains(faction) || !self.is_claimable_by(pos, faction)
        {
            return ClaimOutcome::Rejected;
        }

        let outcome = match self.claims.get_mut(&pos) {
            None => {
                let progress = amount.min(CLAIM_COMPLETE);
                self.claims.insert(pos, ClaimProgress { faction, progress });
                ClaimOutcome::Started { progress }
            }
            Some(entry) if entry.faction == faction => {
                entry.progress = (entry.progress + amount).min(CLAIM_COMPLETE);
                ClaimOutcome::Advanced {
                    progress: entry.progress,
                }
            }
            Some(entry) => {
                entry.progress -= amount;
                if entry.progress <= 0.0 {
                    entry.faction = faction;
                    entry.progress = entry.progress.abs().min(CLAIM_COMPLETE);
                    ClaimOutcome::Flipped {
                        progress: entry.progress,
                    }
                } else {
                    ClaimOutcome::Contested {
                        leader: entry.faction,
                        progress: entry.progress,
                    }
                }
            }
        };

        let reached = self
            .claims
            .get(&pos)
            .is_some_and(|c| c.faction == faction && c.progress >= CLAIM_COMPLETE);
        if reached {
            self.claims.remove(&pos);
            let type_change = self.grid.set_tile_type(pos, TileType::Claimed);
            let owner_change = self.grid.set_tile_faction(pos, Some(faction));
            return ClaimOutcome::Completed {
                type_change,
                owner_change,
            };
        }
        outcome
    }

    pub fn claim_progress(&self, pos: TilePos) -> Option<ClaimProgress> {
        self.claims.get(&pos).copied()
    }

    pub fn claims(&self) -> impl Iterator<Item = (TilePos, ClaimProgress)> + '_ {
        self.claims.iter().map(|(p, c)| (*p, *c))
    }

    /// Restore a ledger entry verbatim (snapshot hydration). Rejects entries
    /// on unclaimable tiles or for unknown factions.
    pub fn restore_claim(&mut self, pos: TilePos, claim: ClaimProgress) -> bool {
        if !self.grid.is_claimable(pos) || !self.factions.contains(claim.faction) {
            return false;
        }
        let progress = claim.progress.clamp(0.0, CLAIM_COMPLETE);
        self.claims.insert(
            pos,
            ClaimProgress {
                faction: claim.faction,
                progress,
            },
        );
        true
    }

    // -----------------------------------------------------------------------
    // Dig markings
    // -----------------------------------------------------------------------

    /// Mark a wall for digging. Fails if the tile is not diggable, is
    /// already marked, or the faction is unknown.
    pub fn mark_for_digging(&mut self, pos: TilePos, faction: FactionId) -> bool {
        if !self.grid.is_diggable(pos)
            || self.dig_marks.contains_key(&pos)
            || !self.factions.contains(faction)
        {
            return false;
        }
        self.dig_marks.insert(pos, faction);
        true
    }

    /// Remove a dig marking and every slot on that wall. Returns the faction
    /// that held the marking, or `None` if the tile was not marked.
    pub fn unmark_for_digging(&mut self, pos: TilePos) -> Option<FactionId> {
        let previous = self.dig_marks.remove(&pos);
        if previous.is_some() {
            self.clear_dig_slots(pos);
        }
        previous
    }

    pub fn marked_by(&self, pos: TilePos) -> Option<FactionId> {
        self.dig_marks.get(&pos).copied()
    }

    pub fn is_marked_for(&self, pos: TilePos, faction: FactionId) -> bool {
        self.marked_by(pos) == Some(faction)
    }

    pub fn dig_marks(&self) -> impl Iterator<Item = (TilePos, FactionId)> + '_ {
        self.dig_marks.iter().map(|(p, f)| (*p, *f))
    }

    // -----------------------------------------------------------------------
    // Wall health
    // -----------------------------------------------------------------------

    /// Subtract `amount` from a diggable tile's health, flooring at 0.
    /// Returns the remaining health, or `None` if the tile is not diggable.
    pub fn damage_wall(&mut self, pos: TilePos, amount: f32) -> Option<f32> {
        let tile = self.grid.get(pos)?;
        if !tile.kind.is_diggable() {
            return None;
        }
        let current = tile.health.or(tile.kind.default_health())?;
        let remaining = (current - amount.max(0.0)).max(0.0);
        self.grid.set_health(pos, Some(remaining));
        Some(remaining)
    }

    /// Float health of a diggable tile.
    pub fn wall_health(&self, pos: TilePos) -> Option<f32> {
        self.grid
            .get(pos)
            .filter(|t| t.kind.is_diggable())
            .and_then(|t| t.health)
    }

    /// Wall health as shown to players: rounded up so a wall never reads 0
    /// while it still stands.
    pub fn dig_health(&self, pos: TilePos) -> Option<i32> {
        self.wall_health(pos).map(|h| h.ceil() as i32)
    }

    // -----------------------------------------------------------------------
    // Dig slots
    // -----------------------------------------------------------------------

    /// A face is eligible iff the tile is diggable and the tile on the far
    /// side of `dir` is walkable.
    pub fn is_face_eligible(&self, wall: TilePos, dir: Direction) -> bool {
        self.grid.is_diggable(wall) && self.grid.is_walkable(wall.step(dir))
    }

    /// Acquire a slot on a wall face. Returns the slot index, the existing
    /// index if the creature already holds one here, or `None` if the face
    /// is ineligible or full.
    pub fn claim_dig_slot(
        &mut self,
        wall: TilePos,
        dir: Direction,
        creature: CreatureId,
    ) -> Option<usize> {
        if !self.is_face_eligible(wall, dir) {
            return None;
        }
        let slots = self.dig_slots.entry((wall, dir)).or_default();
        if let Some(held) = slots.iter().position(|s| *s == Some(creature)) {
            return Some(held);
        }
        let free = slots.iter().position(Option::is_none);
        match free {
            Some(i) => {
                slots[i] = Some(creature);
                Some(i)
            }
            None => None,
        }
    }

    /// Release a creature's slot on a face. Returns whether anything was
    /// released. Releasing a slot that is not held is a no-op.
    pub fn release_dig_slot(&mut self, wall: TilePos, dir: Direction, creature: CreatureId) -> bool {
        let key = (wall, dir);
        let Some(slots) = self.dig_slots.get_mut(&key) else {
            return false;
        };
        let mut released = false;
        for slot in slots.iter_mut() {
            if *slot == Some(creature) {
                *slot = None;
                released = true;
            }
        }
        if slots.iter().all(Option::is_none) {
            self.dig_slots.remove(&key);
        }
        released
    }

    /// Release every slot a creature holds anywhere (despawn cleanup).
    pub fn release_all_slots_of(&mut self, creature: CreatureId) {
        let held: Vec<(TilePos, Direction)> = self
            .dig_slots
            .iter()
            .filter(|(_, slots)| slots.contains(&Some(creature)))
            .map(|(k, _)| *k)
            .collect();
        for (wall, dir) in held {
            self.release_dig_slot(wall, dir, creature);
        }
    }

    pub fn face_slots(&self, wall: TilePos, dir: Direction) -> FaceSlots {
        self.dig_slots.get(&(wall, dir)).copied().unwrap_or_default()
    }

    pub fn face_occupancy(&self, wall: TilePos, dir: Direction) -> usize {
        self.dig_slots
            .get(&(wall, dir))
            .map_or(0, |s| s.iter().filter(|c| c.is_some()).count())
    }

    fn face_has_capacity(&self, wall: TilePos, dir: Direction) -> bool {
        self.face_occupancy(wall, dir) < MAX_DIGGERS_PER_FACE
    }

    /// First eligible face with spare capacity, in N, E, S, W order.
    pub fn get_available_dig_face(&self, wall: TilePos) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .find(|&dir| self.is_face_eligible(wall, dir) && self.face_has_capacity(wall, dir))
    }

    /// Every eligible face with spare capacity, in N, E, S, W order.
    pub fn get_all_available_dig_faces(&self, wall: TilePos) -> SmallVec<[Direction; 4]> {
        Direction::ALL
            .into_iter()
            .filter(|&dir| self.is_face_eligible(wall, dir) && self.face_has_capacity(wall, dir))
            .collect()
    }

    /// Drop every slot on a wall (all four faces).
    pub fn clear_dig_slots(&mut self, wall: TilePos) {
        for dir in Direction::ALL {
            self.dig_slots.remove(&(wall, dir));
        }
    }

    /// Drop the marking and every slot for a wall.
    pub fn clear_dig_metadata(&mut self, wall: TilePos) {
        self.dig_marks.remove(&wall);
        self.clear_dig_slots(wall);
    }

    /// Number of faces with at least one occupied slot (diagnostics/tests).
    pub fn occupied_face_count(&self) -> usize {
        self.dig_slots.len()
    }
}
