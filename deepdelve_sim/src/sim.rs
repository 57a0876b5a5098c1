// Core simulation state and tick loop.
//
// `SimState` owns everything the simulation mutates: the world (territory +
// nav graph), the task scheduler, the creature table, portals, the PRNG, and
// the config. Collaborators drive it with `step(commands, delta)` and read
// back the events it returns.
//
// ## Step order
//
//   1. Apply every command in slice order (see `command.rs`).
//   2. Scale `delta` by the current `SimSpeed`. A paused sim stops here.
//   3. Advance portal timers and auto-spawn.
//   4. Snapshot the creature ids and update each one in ascending id order
//      (`behavior::update_creature`). Ids that disappear mid-step are
//      skipped; creatures created mid-step first update on the next step.
//   5. Publish the collected events to the `EventBus` observers, return
//      them in `StepResult`, and advance `tick`.
//
// Admission to contended resources (claim targets, dig slots) is
// first-come-first-served within step 4, so ascending id order is the
// fairness order.
//
// ## Creature ids
//
// Ids are assigned monotonically from `next_creature_id` and never reused,
// so a despawned creature cannot alias a live one in events or tasks.
//
// See also: `behavior.rs` for the per-creature state machine,
// `scheduler.rs` for task assignment, `snapshot.rs` for hydration from the
// persisted shape.
//
// **Critical constraint: determinism.** All randomness comes from one
// seeded `ChaCha8Rng`; all iteration is over `BTreeMap`s or `Vec`s in a
// fixed order.

use crate::behavior::{self, BehaviorContext};
use crate::command::{SimAction, SimCommand};
use crate::config::GameConfig;
use crate::creature::Creature;
use crate::event::{EventBus, EventSink, SimEvent, SimEventKind, SimObserver};
use crate::handlers::TaskContext;
use crate::scheduler::TaskScheduler;
use crate::task::{Task, TaskKind};
use crate::types::{CreatureId, FactionId, SimSpeed, Species, TilePos};
use crate::world::World;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A faction-owned spawn point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Portal {
    pub pos: TilePos,
    pub faction: FactionId,
    pub species: Species,
    /// Seconds accumulated toward the next spawn.
    #[serde(default)]
    pub timer: f32,
}

/// The result of applying commands and advancing the simulation.
#[derive(Clone, Debug, Default)]
pub struct StepResult {
    pub events: Vec<SimEvent>,
}

#[derive(Debug)]
pub struct SimState {
    pub world: World,
    pub scheduler: TaskScheduler,
    pub creatures: BTreeMap<CreatureId, Creature>,
    pub portals: Vec<Portal>,
    pub config: GameConfig,
    pub speed: SimSpeed,
    /// Number of completed steps.
    pub tick: u64,
    /// Simulated seconds (after speed scaling).
    pub elapsed: f64,
    rng: ChaCha8Rng,
    next_creature_id: u32,
    bus: EventBus,
}

impl SimState {
    pub fn new(world: World, config: GameConfig, seed: u64) -> Self {
        tracing::info!(
            target: "deepdelve::sim",
            width = world.grid().width(),
            height = world.grid().height(),
            factions = world.territory().factions.len(),
            seed,
            "sim.created"
        );
        Self {
            world,
            scheduler: TaskScheduler::new(),
            creatures: BTreeMap::new(),
            portals: Vec::new(),
            config,
            speed: SimSpeed::Normal,
            tick: 0,
            elapsed: 0.0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_creature_id: 0,
            bus: EventBus::new(),
        }
    }

    /// Register an observer that sees every event published after this call.
    pub fn subscribe(&mut self, observer: Box<dyn SimObserver>) {
        self.bus.subscribe(observer);
    }

    /// Add a portal. Rejects unknown factions, species without data, and
    /// positions off the grid.
    pub fn add_portal(&mut self, portal: Portal) -> bool {
        if !self.world.territory().factions.contains(portal.faction)
            || self.config.species_data(portal.species).is_none()
            || !self.world.grid().in_bounds(portal.pos)
        {
            return false;
        }
        self.portals.push(portal);
        true
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn creature(&self, id: CreatureId) -> Option<&Creature> {
        self.creatures.get(&id)
    }

    pub fn creatures_of_faction(&self, faction: FactionId) -> impl Iterator<Item = &Creature> {
        self.creatures.values().filter(move |c| c.faction == faction)
    }

    pub fn task_for(&self, creature: CreatureId) -> Option<&Task> {
        self.scheduler.task_for(creature)
    }

    pub fn pending_len(&self, faction: FactionId) -> usize {
        self.scheduler.pending_len(faction)
    }

    pub fn dig_health(&self, pos: TilePos) -> Option<i32> {
        self.world.territory().dig_health(pos)
    }

    // -----------------------------------------------------------------------
    // Tick loop
    // -----------------------------------------------------------------------

    /// Apply `commands`, then advance the simulation by `delta` seconds
    /// (before speed scaling).
    pub fn step(&mut self, commands: &[SimCommand], delta: f32) -> StepResult {
        let mut events = EventSink::new(self.tick);
        for command in commands {
            self.apply_command(command, &mut events);
        }

        let scaled = delta.max(0.0) * self.speed.multiplier();
        if scaled > 0.0 {
            self.elapsed += f64::from(scaled);
            self.update_portals(scaled, &mut events);

            let ids: Vec<CreatureId> = self.creatures.keys().copied().collect();
            let mut ctx = BehaviorContext {
                world: &mut self.world,
                scheduler: &mut self.scheduler,
                config: &self.config,
                rng: &mut self.rng,
                events: &mut events,
                now: self.elapsed,
            };
            for id in ids {
                behavior::update_creature(&mut ctx, &mut self.creatures, id, scaled);
            }
        }

        let events = events.into_events();
        self.bus.publish(&events);
        tracing::trace!(
            target: "deepdelve::sim",
            tick = self.tick,
            events = events.len(),
            "sim.step"
        );
        self.tick += 1;
        StepResult { events }
    }

    fn apply_command(&mut self, command: &SimCommand, events: &mut EventSink) {
        let faction = command.faction;
        if !self.world.territory().factions.contains(faction) {
            tracing::warn!(
                target: "deepdelve::sim",
                faction = faction.0,
                "command.unknown_faction"
            );
            return;
        }
        match &command.action {
            SimAction::ClaimTile { pos } => {
                let pos = *pos;
                let territory = self.world.territory();
                if !territory.grid.is_walkable(pos) || !territory.is_claimable_by(pos, faction) {
                    tracing::debug!(target: "deepdelve::sim", x = pos.x, y = pos.y, "command.claim_rejected");
                    return;
                }
                if self
                    .scheduler
                    .queue_task(TaskKind::Claim, pos, faction, self.elapsed)
                    .is_some()
                {
                    behavior::interrupt_wanderers(&mut self.creatures, faction, events);
                }
            }
            SimAction::MarkDig { pos } => {
                if self.world.mark_for_digging(*pos, faction, events) {
                    behavior::interrupt_wanderers(&mut self.creatures, faction, events);
                }
            }
            SimAction::UnmarkDig { pos } => {
                let pos = *pos;
                if self.world.territory().marked_by(pos) != Some(faction) {
                    return;
                }
                self.world.unmark_for_digging(pos, events);
                let mut ctx = TaskContext {
                    world: &mut self.world,
                    config: &self.config,
                    events: &mut *events,
                };
                self.scheduler.cancel_tasks_at_position(
                    &mut ctx,
                    TaskKind::Dig,
                    pos,
                    &mut self.creatures,
                );
            }
            SimAction::SpawnCreature { species, pos } => {
                self.spawn_creature(*species, faction, *pos, events);
            }
            SimAction::DespawnCreature { creature_id } => {
                let owned = self
                    .creatures
                    .get(creature_id)
                    .is_some_and(|c| c.faction == faction);
                if owned {
                    self.despawn_creature(*creature_id, events);
                }
            }
            SimAction::SetSimSpeed { speed } => {
                if self.speed != *speed {
                    self.speed = *speed;
                    events.emit(SimEventKind::SpeedChanged { speed: *speed });
                    tracing::info!(target: "deepdelve::sim", speed = ?speed, "sim.speed_changed");
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Creature lifecycle
    // -----------------------------------------------------------------------

    /// Spawn a creature on a walkable tile. Returns `None` for unknown
    /// factions, species without data, or unwalkable positions.
    fn spawn_creature(
        &mut self,
        species: Species,
        faction: FactionId,
        pos: TilePos,
        events: &mut EventSink,
    ) -> Option<CreatureId> {
        if !self.world.territory().factions.contains(faction) || !self.world.grid().is_walkable(pos)
        {
            return None;
        }
        let data = self.config.species_data(species)?;
        let id = CreatureId(self.next_creature_id);
        self.next_creature_id += 1;
        let creature = Creature::new(id, species, faction, pos, data, self.config.tile_size);
        self.creatures.insert(id, creature);
        events.emit(SimEventKind::CreatureSpawned {
            creature_id: id,
            species,
            faction,
            pos,
        });
        tracing::info!(
            target: "deepdelve::sim",
            creature = id.0,
            species = ?species,
            faction = faction.0,
            x = pos.x,
            y = pos.y,
            "creature.spawned"
        );
        Some(id)
    }

    /// Insert a fully built creature (snapshot hydration), assigning it the
    /// next id. No event is emitted.
    pub(crate) fn adopt_creature(&mut self, mut creature: Creature) -> CreatureId {
        let id = CreatureId(self.next_creature_id);
        self.next_creature_id += 1;
        creature.id = id;
        self.creatures.insert(id, creature);
        id
    }

    fn despawn_creature(&mut self, id: CreatureId, events: &mut EventSink) -> bool {
        if self.creatures.remove(&id).is_none() {
            return false;
        }
        let mut ctx = TaskContext {
            world: &mut self.world,
            config: &self.config,
            events: &mut *events,
        };
        self.scheduler.cancel_active(&mut ctx, id);
        ctx.world.release_all_slots_of(id);
        events.emit(SimEventKind::CreatureDespawned { creature_id: id });
        tracing::info!(target: "deepdelve::sim", creature = id.0, "creature.despawned");
        true
    }

    fn update_portals(&mut self, delta: f32, events: &mut EventSink) {
        let interval = self.config.portal_spawn_interval_secs;
        if interval <= 0.0 {
            return;
        }
        for i in 0..self.portals.len() {
            let portal = &mut self.portals[i];
            portal.timer += delta;
            if portal.timer < interval {
                continue;
            }
            portal.timer -= interval;
            let (pos, faction, species) = (portal.pos, portal.faction, portal.species);

            let population = self.creatures_of_faction(faction).count();
            if population >= self.config.max_creatures_per_faction as usize {
                continue;
            }
            if self.spawn_creature(species, faction, pos, events).is_none() {
                tracing::debug!(
                    target: "deepdelve::sim",
                    x = pos.x,
                    y = pos.y,
                    "portal.spawn_blocked"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::world_from_rows;
    use crate::types::{CreatureState, TileType};
    use std::cell::RefCell;
    use std::rc::Rc;

    const A: FactionId = FactionId(0);
    const B: FactionId = FactionId(1);

    fn sim(rows: &[&str]) -> SimState {
        SimState::new(world_from_rows(rows), GameConfig::default(), 42)
    }

    fn spawn(sim: &mut SimState, faction: FactionId, x: i32, y: i32) -> CreatureId {
        let before = sim.creatures.len();
        sim.step(
            &[SimCommand::new(
                faction,
                SimAction::SpawnCreature {
                    species: Species::Imp,
                    pos: TilePos::new(x, y),
                },
            )],
            0.0,
        );
        assert_eq!(sim.creatures.len(), before + 1);
        *sim.creatures.keys().next_back().unwrap()
    }

    #[test]
    fn spawn_rejects_walls_and_unknown_factions() {
        let mut s = sim(&["A#"]);
        let result = s.step(
            &[
                SimCommand::new(
                    A,
                    SimAction::SpawnCreature {
                        species: Species::Imp,
                        pos: TilePos::new(1, 0),
                    },
                ),
                SimCommand::new(
                    FactionId(9),
                    SimAction::SpawnCreature {
                        species: Species::Imp,
                        pos: TilePos::new(0, 0),
                    },
                ),
            ],
            0.1,
        );
        assert!(s.creatures.is_empty());
        assert!(result.events.is_empty());
    }

    #[test]
    fn creature_ids_are_never_reused() {
        let mut s = sim(&["AAA"]);
        let first = spawn(&mut s, A, 0, 0);
        s.step(
            &[SimCommand::new(A, SimAction::DespawnCreature { creature_id: first })],
            0.0,
        );
        let second = spawn(&mut s, A, 1, 0);
        assert_ne!(first, second);
        assert_eq!(second, CreatureId(1));
    }

    #[test]
    fn paused_sim_applies_commands_but_does_not_advance() {
        let mut s = sim(&["A#"]);
        let imp = spawn(&mut s, A, 0, 0);
        s.step(
            &[
                SimCommand::new(A, SimAction::SetSimSpeed { speed: SimSpeed::Paused }),
                SimCommand::new(A, SimAction::MarkDig { pos: TilePos::new(1, 0) }),
            ],
            1.0,
        );
        assert_eq!(s.elapsed, 0.0);
        assert_eq!(s.creature(imp).unwrap().state, CreatureState::Idle);
        assert_eq!(s.world.territory().marked_by(TilePos::new(1, 0)), Some(A));

        s.step(&[SimCommand::new(A, SimAction::SetSimSpeed { speed: SimSpeed::Fast })], 1.0);
        assert!((s.elapsed - 3.0).abs() < 1e-9);
        assert!(s.task_for(imp).is_some());
    }

    #[test]
    fn unmark_cancels_diggers_and_despawn_frees_slots() {
        let mut s = sim(&["A#"]);
        let wall = TilePos::new(1, 0);
        let first = spawn(&mut s, A, 0, 0);
        let second = spawn(&mut s, A, 0, 0);
        s.step(&[SimCommand::new(A, SimAction::MarkDig { pos: wall })], 0.1);
        assert!(s.task_for(first).is_some());
        assert!(s.task_for(second).is_some());

        s.step(
            &[SimCommand::new(A, SimAction::DespawnCreature { creature_id: first })],
            0.0,
        );
        assert_eq!(s.world.territory().occupied_face_count(), 1);

        // Another faction cannot unmark.
        s.step(&[SimCommand::new(B, SimAction::UnmarkDig { pos: wall })], 0.0);
        assert_eq!(s.world.territory().marked_by(wall), Some(A));

        let result = s.step(&[SimCommand::new(A, SimAction::UnmarkDig { pos: wall })], 0.0);
        assert!(s.task_for(second).is_none());
        assert_eq!(s.creature(second).unwrap().state, CreatureState::Idle);
        assert_eq!(s.world.territory().occupied_face_count(), 0);
        assert!(result
            .events
            .iter()
            .any(|e| matches!(e.kind, SimEventKind::TaskCancelled { .. })));
    }

    #[test]
    fn claim_request_is_worked_to_completion() {
        let mut s = sim(&[
            "#####", //
            "..A..", //
            "#####",
        ]);
        // Discovery alone would pick the east neighbor first.
        let imp = spawn(&mut s, A, 2, 1);
        let target = TilePos::new(1, 1);
        s.step(&[SimCommand::new(A, SimAction::ClaimTile { pos: target })], 0.1);
        assert_eq!(s.task_for(imp).map(|t| t.target), Some(target));
        assert_eq!(s.pending_len(A), 0);

        for _ in 0..100 {
            s.step(&[], 0.1);
            if s.world.grid().owner(target) == Some(A) {
                break;
            }
        }
        assert_eq!(s.world.grid().tile_type(target), Some(TileType::Claimed));
        assert_eq!(s.world.grid().owner(target), Some(A));
    }

    #[test]
    fn portal_spawns_on_interval_up_to_the_cap() {
        let mut s = sim(&["AA"]);
        s.config.max_creatures_per_faction = 2;
        assert!(s.add_portal(Portal {
            pos: TilePos::new(0, 0),
            faction: A,
            species: Species::Goblin,
            timer: 0.0,
        }));
        assert!(!s.add_portal(Portal {
            pos: TilePos::new(5, 5),
            faction: A,
            species: Species::Goblin,
            timer: 0.0,
        }));
        for _ in 0..14 {
            s.step(&[], 1.0);
        }
        assert!(s.creatures.is_empty());
        s.step(&[], 1.0);
        assert_eq!(s.creatures_of_faction(A).count(), 1);
        for _ in 0..60 {
            s.step(&[], 1.0);
        }
        assert_eq!(s.creatures_of_faction(A).count(), 2);
    }

    struct Recorder(Rc<RefCell<Vec<SimEvent>>>);

    impl SimObserver for Recorder {
        fn on_event(&mut self, event: &SimEvent) {
            self.0.borrow_mut().push(event.clone());
        }
    }

    #[test]
    fn observers_see_the_same_events_as_the_step_result() {
        let mut s = sim(&["AA"]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        s.subscribe(Box::new(Recorder(Rc::clone(&seen))));
        let result = s.step(
            &[SimCommand::new(
                A,
                SimAction::SpawnCreature {
                    species: Species::Goblin,
                    pos: TilePos::new(1, 0),
                },
            )],
            0.5,
        );
        assert!(!result.events.is_empty());
        assert_eq!(*seen.borrow(), result.events);
        assert!(result.events.iter().all(|e| e.tick == 0));
        assert_eq!(s.tick, 1);
    }
}
