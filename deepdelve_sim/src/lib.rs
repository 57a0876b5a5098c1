// deepdelve_sim: pure Rust colony simulation library.
//
// This crate contains all simulation logic for Deepdelve: the territory
// grid and its claim/dig ledgers, the incrementally maintained nav graph,
// the task scheduler and its per-kind handlers, and the creature state
// machine. It has no rendering, audio, or file-format dependencies beyond
// the snapshot shape, and can be tested, benchmarked, and run headless.
//
// Module overview:
// - `sim.rs`:         Top-level SimState, step loop, command dispatch, portals.
// - `command.rs`:     SimCommand / SimAction: all collaborator-issued mutations.
// - `event.rs`:       SimEvent stream, EventSink, observer fan-out (EventBus).
// - `world.rs`:       World facade: territory + nav graph kept in sync, emits events.
// - `grid.rs`:        Dense 2D tile grid.
// - `territory.rs`:   Claim-contest ledger, dig markings, per-face dig slots.
// - `faction.rs`:     Faction table.
// - `nav.rs`:         Walkability graph with incremental maintenance.
// - `pathfinding.rs`: A*, territory-filtered A*, bounded BFS, random neighbor.
// - `task.rs`:        Task header + per-kind payload.
// - `handlers/`:      TaskHandler trait and the claim / dig / carry handlers.
// - `scheduler.rs`:   Matches idle creatures to pending and discovered work.
// - `creature.rs`:    Creature data, level/XP, happiness, movement integration.
// - `behavior.rs`:    IDLE / WALKING / WORKING / WANDERING state machine.
// - `species.rs`:     SpeciesData: level-scaled stats and task eligibility.
// - `config.rs`:      GameConfig: all tunables, JSON loading and validation.
// - `snapshot.rs`:    Persisted map shape, hydration and capture.
// - `types.rs`:       TilePos, Direction, Vec2, ids, the tile property table.
//
// **Critical constraint: determinism.** Given the same snapshot, seed, and
// command/delta sequence the simulation produces the same events. All
// randomness comes from a seeded ChaCha8 PRNG; ordered state lives in
// `BTreeMap`s; per-tick creature order is ascending id.

pub mod behavior;
pub mod command;
pub mod config;
pub mod creature;
pub mod event;
pub mod faction;
pub mod grid;
pub mod handlers;
pub mod nav;
pub mod pathfinding;
pub mod scheduler;
pub mod sim;
pub mod snapshot;
pub mod species;
pub mod task;
pub mod territory;
pub mod types;
pub mod world;

#[cfg(test)]
mod test_util;
