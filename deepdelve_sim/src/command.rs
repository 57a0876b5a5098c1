// Commands that mutate simulation state.
//
// Every collaborator-to-core request goes through `SimCommand`. Commands
// passed to `SimState::step()` are applied in slice order before any
// creature updates for that step, so a wall marked this step can be picked
// up by an idle creature in the same step.
//
// Actions:
// - `ClaimTile`: queue a CLAIM task on the faction's pending queue.
// - `MarkDig` / `UnmarkDig`: add or remove a dig marking. Unmarking cancels
//   every dig task on that wall; only the marking faction may unmark.
// - `SpawnCreature` / `DespawnCreature`: explicit creature lifecycle.
// - `SetSimSpeed`: pause / normal / fast.
//
// Creating work (a claim request or a dig marking) also interrupts the
// faction's wandering creatures so they re-poll immediately.
//
// See also: `sim.rs` for `apply_command()` which dispatches these.

use crate::types::{CreatureId, FactionId, SimSpeed, Species, TilePos};
use serde::{Deserialize, Serialize};

/// A request issued on behalf of one faction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimCommand {
    pub faction: FactionId,
    pub action: SimAction,
}

impl SimCommand {
    pub fn new(faction: FactionId, action: SimAction) -> Self {
        Self { faction, action }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SimAction {
    /// Ask the faction's workers to claim a tile.
    ClaimTile { pos: TilePos },
    MarkDig { pos: TilePos },
    UnmarkDig { pos: TilePos },
    /// Spawn a creature on a walkable tile.
    SpawnCreature { species: Species, pos: TilePos },
    /// Remove one of the faction's creatures, releasing its task and slot.
    DespawnCreature { creature_id: CreatureId },
    SetSimSpeed { speed: SimSpeed },
}
