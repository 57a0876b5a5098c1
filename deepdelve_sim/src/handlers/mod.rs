// Task handlers: per-kind task behavior behind one trait.
//
// The scheduler knows nothing about claiming or digging. It holds a
// `TaskKind -> Box<dyn TaskHandler>` table and drives every task through
// the same lifecycle:
//
//   find_target → get_work_position → (walk) → is_in_work_position →
//   work_point → execute* → is_complete → on_complete
//
// with `on_cancel` on any early exit. New task kinds are added by writing a
// handler and registering it (`TaskScheduler::register_handler`).
//
// Handlers see the requesting creature as a `Worker`, a `Copy` snapshot of
// the few fields they need, so the scheduler can hold a task mutably while
// the creature table is borrowed elsewhere.
//
// See also: `scheduler.rs` for the lifecycle driver, `claim.rs`, `dig.rs`,
// `carry.rs` for the implementations.

pub mod carry;
pub mod claim;
pub mod dig;

use crate::config::GameConfig;
use crate::creature::Creature;
use crate::event::EventSink;
use crate::task::{Task, TaskKind};
use crate::types::{CreatureId, FactionId, Species, TilePos, Vec2};
use crate::world::World;
use std::collections::{BTreeMap, BTreeSet};

pub use carry::CarryHandler;
pub use claim::ClaimHandler;
pub use dig::DigHandler;

/// The creature fields handlers read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Worker {
    pub id: CreatureId,
    pub faction: FactionId,
    pub species: Species,
    pub tile: TilePos,
    pub level: u32,
}

/// Mutable access for handler operations that change the world.
pub struct TaskContext<'a> {
    pub world: &'a mut World,
    pub config: &'a GameConfig,
    pub events: &'a mut EventSink,
}

/// Read-only inputs for target discovery.
pub struct TargetQuery<'a> {
    pub world: &'a World,
    pub config: &'a GameConfig,
    pub creatures: &'a BTreeMap<CreatureId, Creature>,
    /// Targets the handler must not return.
    pub excluded: &'a BTreeSet<TilePos>,
}

/// Outcome of one `execute` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkResult {
    Continue,
    /// The task can no longer be worked (target gone, slot lost, ...).
    Failed,
}

pub trait TaskHandler {
    fn kind(&self) -> TaskKind;

    /// Discover a new target for `worker`, or `None`.
    fn find_target(&self, query: &TargetQuery<'_>, worker: &Worker) -> Option<TilePos>;

    /// The tile the worker must stand on, acquiring any resource that
    /// requires (e.g. a dig slot). `None` means the task is not workable by
    /// this worker right now.
    fn get_work_position(
        &self,
        ctx: &mut TaskContext<'_>,
        worker: &Worker,
        task: &mut Task,
    ) -> Option<TilePos>;

    fn is_in_work_position(&self, world: &World, worker: &Worker, task: &Task) -> bool;

    /// Precise visual point inside the work tile where output happens.
    fn work_point(&self, config: &GameConfig, task: &Task) -> Vec2 {
        task.target.center(config.tile_size)
    }

    fn execute(
        &self,
        ctx: &mut TaskContext<'_>,
        worker: &Worker,
        task: &mut Task,
        delta: f32,
    ) -> WorkResult;

    fn is_complete(&self, world: &World, task: &Task) -> bool;

    fn on_complete(&self, ctx: &mut TaskContext<'_>, task: &mut Task);

    /// Release anything the task holds. Must be safe to call at any point
    /// in the lifecycle, including before a work position was computed.
    fn on_cancel(&self, ctx: &mut TaskContext<'_>, task: &mut Task);

    fn xp_reward(&self, config: &GameConfig) -> u32 {
        config.task_type(self.kind()).map_or(0, |t| t.xp_reward)
    }
}
