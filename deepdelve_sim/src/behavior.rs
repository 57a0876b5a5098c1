// Creature behavior state machine.
//
// One `update_creature` call per creature per tick, in ascending creature-id
// order (the caller iterates a `BTreeMap`). Happiness decays first, then the
// creature's current state runs:
//
// - IDLE: ask the scheduler for work. On success, follow the returned path
//   (WALKING). Otherwise start WANDERING with a fresh cooldown. A creature
//   on an empty map stays IDLE.
// - WALKING: interpolate along the path. When it is exhausted: no task means
//   the walk was a wander, so go IDLE; a task whose handler confirms the work
//   position moves to WORKING; anything else is inconsistent and the task is
//   cancelled.
// - WORKING: first walk to the handler's in-tile work point, then feed
//   `delta` into `execute_task` each tick. Completion and failure return the
//   creature to IDLE from inside the scheduler.
// - WANDERING: count the cooldown down. At zero, roll
//   `wander_new_point_chance`: on success walk to a random owned tile within
//   `wander_radius` along an in-territory path; otherwise go IDLE to re-poll.
//
// Walking a wander path is WALKING with `current_task == None`.
// `interrupt_wanderers` sends those creatures, and WANDERING ones, back to
// IDLE when the player creates new work for their faction.

use crate::config::GameConfig;
use crate::creature::Creature;
use crate::event::EventSink;
use crate::handlers::TaskContext;
use crate::scheduler::TaskScheduler;
use crate::types::{CreatureId, CreatureState, FactionId, TilePos};
use crate::world::World;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Random destinations tried before a wander roll gives up.
const WANDER_ATTEMPTS: u32 = 8;

/// Everything a creature update may touch besides the creature table.
pub struct BehaviorContext<'a> {
    pub world: &'a mut World,
    pub scheduler: &'a mut TaskScheduler,
    pub config: &'a GameConfig,
    pub rng: &'a mut ChaCha8Rng,
    pub events: &'a mut EventSink,
    /// Simulation time in seconds, stamped onto new tasks.
    pub now: f64,
}

impl BehaviorContext<'_> {
    fn split(&mut self) -> (&mut TaskScheduler, TaskContext<'_>) {
        (
            &mut *self.scheduler,
            TaskContext {
                world: &mut *self.world,
                config: self.config,
                events: &mut *self.events,
            },
        )
    }
}

fn speed_of(config: &GameConfig, creature: &Creature) -> Option<f32> {
    config
        .species_data(creature.species)
        .map(|d| d.speed(creature.level))
}

fn sample_cooldown(config: &GameConfig, rng: &mut ChaCha8Rng) -> f32 {
    let (lo, hi) = config.wander_cooldown_range;
    if hi > lo { rng.gen_range(lo..hi) } else { lo }
}

/// Advance one creature by `delta` seconds. Unknown ids are ignored.
pub fn update_creature(
    ctx: &mut BehaviorContext<'_>,
    creatures: &mut BTreeMap<CreatureId, Creature>,
    id: CreatureId,
    delta: f32,
) {
    let Some(creature) = creatures.get_mut(&id) else {
        return;
    };
    creature.decay_happiness(delta, ctx.config.happiness_decay_per_second, ctx.events);
    match creature.state {
        CreatureState::Idle => update_idle(ctx, creatures, id),
        CreatureState::Walking => update_walking(ctx, creature, delta),
        CreatureState::Working => update_working(ctx, creature, delta),
        CreatureState::Wandering => update_wandering(ctx, creature, delta),
    }
}

fn update_idle(
    ctx: &mut BehaviorContext<'_>,
    creatures: &mut BTreeMap<CreatureId, Creature>,
    id: CreatureId,
) {
    if ctx.world.grid().is_empty() {
        return;
    }
    let Some(worker) = creatures.get(&id).map(Creature::worker) else {
        return;
    };
    let now = ctx.now;
    let assignment = {
        let (scheduler, mut tctx) = ctx.split();
        scheduler.request_task(&mut tctx, &worker, creatures, now)
    };
    let Some(creature) = creatures.get_mut(&id) else {
        return;
    };
    match assignment {
        Some(assignment) => {
            creature.current_task = Some(assignment.task_id);
            creature.work_point = None;
            creature.at_work_point = false;
            creature.set_path(assignment.path);
            creature.set_state(CreatureState::Walking, ctx.events);
        }
        None => {
            creature.wander_cooldown = sample_cooldown(ctx.config, ctx.rng);
            creature.set_state(CreatureState::Wandering, ctx.events);
        }
    }
}

fn update_walking(ctx: &mut BehaviorContext<'_>, creature: &mut Creature, delta: f32) {
    let Some(speed) = speed_of(ctx.config, creature) else {
        return;
    };
    if !creature.advance_along_path(delta, speed, ctx.config, ctx.events) {
        return;
    }
    creature.clear_path();

    if creature.current_task.is_none() {
        creature.set_state(CreatureState::Idle, ctx.events);
        return;
    }
    if ctx.scheduler.is_in_work_position(ctx.world, creature) {
        creature.work_point = ctx.scheduler.work_point(ctx.config, creature.id);
        creature.at_work_point = false;
        creature.set_state(CreatureState::Working, ctx.events);
        return;
    }
    tracing::warn!(
        target: "deepdelve::sim",
        creature = creature.id.0,
        x = creature.tile.x,
        y = creature.tile.y,
        "behavior.work_position_mismatch"
    );
    let (scheduler, mut tctx) = ctx.split();
    scheduler.cancel_task(&mut tctx, creature);
}

fn update_working(ctx: &mut BehaviorContext<'_>, creature: &mut Creature, delta: f32) {
    if ctx.scheduler.task_for(creature.id).is_none() {
        creature.current_task = None;
        creature.work_point = None;
        creature.at_work_point = false;
        creature.set_state(CreatureState::Idle, ctx.events);
        return;
    }
    if !creature.at_work_point {
        if let (Some(point), Some(speed)) = (creature.work_point, speed_of(ctx.config, creature)) {
            if !creature.move_toward_point(point, delta, speed, ctx.config, ctx.events) {
                return;
            }
        }
        creature.at_work_point = true;
    }
    let (scheduler, mut tctx) = ctx.split();
    scheduler.execute_task(&mut tctx, creature, delta);
}

fn update_wandering(ctx: &mut BehaviorContext<'_>, creature: &mut Creature, delta: f32) {
    creature.wander_cooldown -= delta;
    if creature.wander_cooldown > 0.0 {
        return;
    }
    if !ctx.rng.gen_bool(ctx.config.wander_new_point_chance) {
        creature.set_state(CreatureState::Idle, ctx.events);
        return;
    }
    match pick_wander_path(ctx.world, ctx.config, ctx.rng, creature) {
        Some(path) => {
            creature.current_task = None;
            creature.set_path(path);
            creature.set_state(CreatureState::Walking, ctx.events);
        }
        None => creature.wander_cooldown = sample_cooldown(ctx.config, ctx.rng),
    }
}

/// A path to a random destination. Creatures on their own land stay on it;
/// anyone else steps to a random walkable neighbor.
fn pick_wander_path(
    world: &World,
    config: &GameConfig,
    rng: &mut ChaCha8Rng,
    creature: &Creature,
) -> Option<Vec<TilePos>> {
    let here = creature.tile;
    let faction = creature.faction;
    let grid = world.grid();

    if grid.owner(here) != Some(faction) {
        let next = world.get_random_walkable_neighbor(here, None, rng)?;
        let path = world.find_path(here, next);
        return (!path.is_empty()).then_some(path);
    }

    let r = config.wander_radius.max(1);
    for _ in 0..WANDER_ATTEMPTS {
        let dest = TilePos::new(here.x + rng.gen_range(-r..=r), here.y + rng.gen_range(-r..=r));
        if dest == here || !grid.is_walkable(dest) || grid.owner(dest) != Some(faction) {
            continue;
        }
        let path = world.find_path_in_territory(here, dest, faction);
        if !path.is_empty() {
            return Some(path);
        }
    }
    let next = world.get_random_walkable_neighbor(here, Some(faction), rng)?;
    let path = world.find_path_in_territory(here, next, faction);
    (!path.is_empty()).then_some(path)
}

/// Send the faction's wanderers back to IDLE. Returns how many changed.
pub fn interrupt_wanderers(
    creatures: &mut BTreeMap<CreatureId, Creature>,
    faction: FactionId,
    events: &mut EventSink,
) -> usize {
    let mut count = 0;
    for creature in creatures.values_mut().filter(|c| c.faction == faction) {
        let wandering = match creature.state {
            CreatureState::Wandering => true,
            CreatureState::Walking => creature.current_task.is_none(),
            _ => false,
        };
        if wandering {
            creature.clear_path();
            creature.wander_cooldown = 0.0;
            creature.set_state(CreatureState::Idle, events);
            count += 1;
        }
    }
    count
}
