// Task scheduler: matches idle creatures to work.
//
// The scheduler owns every live task: per-faction pending queues (player
// requests waiting for a worker) and the active table (one task per
// assigned creature). Behavior per task kind is delegated to the registered
// `TaskHandler`s; the scheduler itself only implements the lifecycle.
//
// `request_task` walks the worker's eligible kinds from highest to lowest
// configured priority. For each kind it first tries the faction's pending
// queue, then (if the kind is auto-assign) asks the handler to discover a
// target, trying up to `max_target_attempts` targets. A candidate is
// accepted only if the handler produces a work position and a path to it
// exists; a rejected candidate has `on_cancel` run so it releases whatever
// `get_work_position` acquired.
//
// Exclusivity: for kinds that do not allow multiple workers, targets held by
// teammates' active tasks of such kinds are excluded, both for queued tasks
// and for discovery. Rival factions are not excluded; contesting a tile is
// the claim ledger's job. Multi-worker kinds (dig) skip this filter; the
// dig-slot ledger limits them per wall face instead.
//
// See also: `handlers/` for the per-kind behavior, `behavior.rs` for the
// state machine that calls in here, `config.rs` for `TaskTypeConfig`.
//
// **Critical constraint: determinism.** Queues are `VecDeque`s in
// `BTreeMap`s keyed by faction; the active table is keyed by creature id.
// Task ids are monotonic.

use crate::config::GameConfig;
use crate::creature::Creature;
use crate::event::{EventSink, SimEventKind};
use crate::handlers::{
    CarryHandler, ClaimHandler, DigHandler, TargetQuery, TaskContext, TaskHandler, Worker,
    WorkResult,
};
use crate::task::{Task, TaskKind, TaskState};
use crate::types::{CreatureId, CreatureState, FactionId, TaskId, TilePos, Vec2};
use crate::world::World;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

/// A successful `request_task` result.
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub target: TilePos,
    /// Tile the creature must reach before working.
    pub work_tile: TilePos,
    /// From the creature's tile to `work_tile`, both inclusive.
    pub path: Vec<TilePos>,
}

/// Result of one `execute_task` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// The creature has no active task.
    NoTask,
    InProgress,
    Completed { xp: u32 },
    Failed,
}

pub struct TaskScheduler {
    handlers: BTreeMap<TaskKind, Box<dyn TaskHandler>>,
    pending: BTreeMap<FactionId, VecDeque<Task>>,
    active: BTreeMap<CreatureId, Task>,
    next_task_id: u64,
}

impl Default for TaskScheduler {
    fn default() -> Self {
        let mut scheduler = Self::empty();
        scheduler.register_handler(Box::new(ClaimHandler));
        scheduler.register_handler(Box::new(DigHandler));
        scheduler.register_handler(Box::new(CarryHandler));
        scheduler
    }
}

impl fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("pending", &self.pending)
            .field("active", &self.active)
            .field("next_task_id", &self.next_task_id)
            .finish()
    }
}

/// Compute a work position and a path to it, or undo whatever the handler
/// acquired.
fn prepare(
    handler: &dyn TaskHandler,
    ctx: &mut TaskContext<'_>,
    worker: &Worker,
    task: &mut Task,
) -> Option<(TilePos, Vec<TilePos>)> {
    task.assigned_creature = Some(worker.id);
    let Some(work_tile) = handler.get_work_position(ctx, worker, task) else {
        task.assigned_creature = None;
        return None;
    };
    let path = ctx.world.find_path(worker.tile, work_tile);
    if path.is_empty() {
        handler.on_cancel(ctx, task);
        task.assigned_creature = None;
        return None;
    }
    Some((work_tile, path))
}

fn activate(
    active: &mut BTreeMap<CreatureId, Task>,
    events: &mut EventSink,
    worker: &Worker,
    mut task: Task,
    work_tile: TilePos,
    path: Vec<TilePos>,
) -> Assignment {
    task.state = TaskState::Assigned;
    task.assigned_creature = Some(worker.id);
    events.emit(SimEventKind::TaskStarted {
        task_id: task.id,
        creature_id: worker.id,
        kind: task.kind,
        target: task.target,
    });
    tracing::debug!(
        target: "deepdelve::scheduler",
        task = task.id.0,
        creature = worker.id.0,
        kind = ?task.kind,
        x = task.target.x,
        y = task.target.y,
        "task.assigned"
    );
    let assignment = Assignment {
        task_id: task.id,
        kind: task.kind,
        target: task.target,
        work_tile,
        path,
    };
    active.insert(worker.id, task);
    assignment
}

fn emit_cancelled(events: &mut EventSink, task: &Task) {
    events.emit(SimEventKind::TaskCancelled {
        task_id: task.id,
        creature_id: task.assigned_creature,
        kind: task.kind,
        target: task.target,
    });
}

impl TaskScheduler {
    /// Scheduler with the claim, dig, and carry handlers registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduler with no handlers.
    pub fn empty() -> Self {
        Self {
            handlers: BTreeMap::new(),
            pending: BTreeMap::new(),
            active: BTreeMap::new(),
            next_task_id: 0,
        }
    }

    /// Register a handler for its kind, returning any handler it replaces.
    pub fn register_handler(&mut self, handler: Box<dyn TaskHandler>) -> Option<Box<dyn TaskHandler>> {
        self.handlers.insert(handler.kind(), handler)
    }

    pub fn has_handler(&self, kind: TaskKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn task_for(&self, creature: CreatureId) -> Option<&Task> {
        self.active.get(&creature)
    }

    pub fn active_tasks(&self) -> impl Iterator<Item = &Task> {
        self.active.values()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn pending_tasks(&self, faction: FactionId) -> impl Iterator<Item = &Task> {
        self.pending.get(&faction).into_iter().flatten()
    }

    pub fn pending_len(&self, faction: FactionId) -> usize {
        self.pending.get(&faction).map_or(0, VecDeque::len)
    }

    pub fn is_in_work_position(&self, world: &World, creature: &Creature) -> bool {
        match self.active.get(&creature.id) {
            Some(task) => self
                .handlers
                .get(&task.kind)
                .is_some_and(|h| h.is_in_work_position(world, &creature.worker(), task)),
            None => false,
        }
    }

    pub fn work_point(&self, config: &GameConfig, creature: CreatureId) -> Option<Vec2> {
        let task = self.active.get(&creature)?;
        let handler = self.handlers.get(&task.kind)?;
        Some(handler.work_point(config, task))
    }

    /// Targets that `worker` must not be assigned for `kind`: those held by
    /// teammates on single-worker tasks. Rival factions may share a target.
    fn excluded_targets(
        &self,
        kind: TaskKind,
        worker: &Worker,
        config: &GameConfig,
    ) -> BTreeSet<TilePos> {
        let shareable = |k: TaskKind| config.task_type(k).is_some_and(|t| t.multiple_workers);
        if shareable(kind) {
            return BTreeSet::new();
        }
        self.active
            .iter()
            .filter(|(id, task)| {
                **id != worker.id && task.faction == worker.faction && !shareable(task.kind)
            })
            .map(|(_, task)| task.target)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Queue a task for `faction`. Returns `None` if an identical task
    /// (kind + target) is already queued or active for that faction.
    pub fn queue_task(
        &mut self,
        kind: TaskKind,
        target: TilePos,
        faction: FactionId,
        now: f64,
    ) -> Option<TaskId> {
        let same = |t: &Task| t.kind == kind && t.target == target && t.faction == faction;
        if self.pending_tasks(faction).any(same) || self.active.values().any(same) {
            return None;
        }
        let id = TaskId(self.next_task_id);
        self.next_task_id += 1;
        self.pending
            .entry(faction)
            .or_default()
            .push_back(Task::new(id, kind, target, faction, now));
        tracing::debug!(
            target: "deepdelve::scheduler",
            task = id.0,
            faction = faction.0,
            kind = ?kind,
            x = target.x,
            y = target.y,
            "task.queued"
        );
        Some(id)
    }

    /// Find work for an idle creature. See the module comment for the
    /// search order.
    pub fn request_task(
        &mut self,
        ctx: &mut TaskContext<'_>,
        worker: &Worker,
        creatures: &BTreeMap<CreatureId, Creature>,
        now: f64,
    ) -> Option<Assignment> {
        if self.active.contains_key(&worker.id) {
            tracing::warn!(
                target: "deepdelve::scheduler",
                creature = worker.id.0,
                "task.request_while_assigned"
            );
            self.cancel_active(ctx, worker.id);
        }

        let species = ctx.config.species_data(worker.species)?;
        let kinds = ctx.config.kinds_by_priority(&species.task_kinds);

        for kind in kinds {
            let Some(handler) = self.handlers.get(&kind) else {
                continue;
            };
            let handler = handler.as_ref();
            let mut excluded = self.excluded_targets(kind, worker, ctx.config);

            if let Some(queue) = self.pending.get_mut(&worker.faction) {
                let mut i = 0;
                while i < queue.len() {
                    let task = &mut queue[i];
                    if task.kind != kind || excluded.contains(&task.target) {
                        i += 1;
                        continue;
                    }
                    if handler.is_complete(ctx.world, task) {
                        if let Some(done) = queue.remove(i) {
                            tracing::debug!(
                                target: "deepdelve::scheduler",
                                task = done.id.0,
                                "task.dropped_already_done"
                            );
                        }
                        continue;
                    }
                    if let Some((work_tile, path)) = prepare(handler, ctx, worker, task) {
                        if let Some(task) = queue.remove(i) {
                            return Some(activate(
                                &mut self.active,
                                ctx.events,
                                worker,
                                task,
                                work_tile,
                                path,
                            ));
                        }
                    }
                    i += 1;
                }
            }

            if !ctx.config.task_type(kind).is_some_and(|t| t.auto_assign) {
                continue;
            }
            for _ in 0..ctx.config.max_target_attempts {
                let query = TargetQuery {
                    world: &*ctx.world,
                    config: ctx.config,
                    creatures,
                    excluded: &excluded,
                };
                let Some(target) = handler.find_target(&query, worker) else {
                    break;
                };
                let mut task = Task::new(
                    TaskId(self.next_task_id),
                    kind,
                    target,
                    worker.faction,
                    now,
                );
                if let Some((work_tile, path)) = prepare(handler, ctx, worker, &mut task) {
                    self.next_task_id += 1;
                    return Some(activate(
                        &mut self.active,
                        ctx.events,
                        worker,
                        task,
                        work_tile,
                        path,
                    ));
                }
                tracing::trace!(
                    target: "deepdelve::scheduler",
                    creature = worker.id.0,
                    x = target.x,
                    y = target.y,
                    "task.target_rejected"
                );
                excluded.insert(target);
            }
        }
        None
    }

    /// Run one tick of work for the creature's task. On completion the
    /// handler's `on_complete` runs, XP is granted, and the creature returns
    /// to IDLE; on failure the task is cancelled and the creature returns to
    /// IDLE.
    pub fn execute_task(
        &mut self,
        ctx: &mut TaskContext<'_>,
        creature: &mut Creature,
        delta: f32,
    ) -> ExecuteOutcome {
        let worker = creature.worker();
        let Some(task) = self.active.get_mut(&creature.id) else {
            return ExecuteOutcome::NoTask;
        };
        let Some(handler) = self.handlers.get(&task.kind) else {
            tracing::warn!(
                target: "deepdelve::scheduler",
                creature = creature.id.0,
                kind = ?task.kind,
                "task.handler_missing"
            );
            if let Some(mut orphan) = self.active.remove(&creature.id) {
                orphan.state = TaskState::Failed;
                emit_cancelled(ctx.events, &orphan);
            }
            Self::return_to_idle(creature, ctx.events);
            return ExecuteOutcome::Failed;
        };

        task.state = TaskState::InProgress;
        if handler.execute(ctx, &worker, task, delta) == WorkResult::Failed {
            if let Some(mut failed) = self.active.remove(&creature.id) {
                handler.on_cancel(ctx, &mut failed);
                failed.state = TaskState::Failed;
                emit_cancelled(ctx.events, &failed);
                tracing::debug!(
                    target: "deepdelve::scheduler",
                    task = failed.id.0,
                    creature = creature.id.0,
                    "task.failed"
                );
            }
            Self::return_to_idle(creature, ctx.events);
            return ExecuteOutcome::Failed;
        }

        if !handler.is_complete(ctx.world, task) {
            return ExecuteOutcome::InProgress;
        }
        let Some(mut done) = self.active.remove(&creature.id) else {
            return ExecuteOutcome::InProgress;
        };
        handler.on_complete(ctx, &mut done);
        done.state = TaskState::Completed;
        ctx.events.emit(SimEventKind::TaskCompleted {
            task_id: done.id,
            creature_id: creature.id,
            kind: done.kind,
            target: done.target,
        });
        let xp = handler.xp_reward(ctx.config);
        if let Some(data) = ctx.config.species_data(creature.species) {
            creature.gain_xp(xp, ctx.config, data, ctx.events);
        }
        tracing::info!(
            target: "deepdelve::scheduler",
            task = done.id.0,
            creature = creature.id.0,
            kind = ?done.kind,
            xp,
            "task.completed"
        );
        Self::return_to_idle(creature, ctx.events);
        ExecuteOutcome::Completed { xp }
    }

    fn return_to_idle(creature: &mut Creature, events: &mut EventSink) {
        creature.current_task = None;
        creature.clear_path();
        creature.work_point = None;
        creature.at_work_point = false;
        creature.set_state(CreatureState::Idle, events);
    }

    /// Drop a creature's active task, running the handler's `on_cancel`.
    /// Returns whether there was one. Does not touch the creature itself.
    pub fn cancel_active(&mut self, ctx: &mut TaskContext<'_>, creature: CreatureId) -> bool {
        let Some(mut task) = self.active.remove(&creature) else {
            return false;
        };
        if let Some(handler) = self.handlers.get(&task.kind) {
            handler.on_cancel(ctx, &mut task);
        }
        task.state = TaskState::Cancelled;
        emit_cancelled(ctx.events, &task);
        tracing::debug!(
            target: "deepdelve::scheduler",
            task = task.id.0,
            creature = creature.0,
            "task.cancelled"
        );
        true
    }

    /// Cancel the creature's task regardless of progress and return it to
    /// IDLE.
    pub fn cancel_task(&mut self, ctx: &mut TaskContext<'_>, creature: &mut Creature) -> bool {
        let cancelled = self.cancel_active(ctx, creature.id);
        Self::return_to_idle(creature, ctx.events);
        cancelled
    }

    /// Cancel every active task and purge every queued task of `kind` at
    /// `pos`, across all factions. Returns how many tasks were dropped.
    pub fn cancel_tasks_at_position(
        &mut self,
        ctx: &mut TaskContext<'_>,
        kind: TaskKind,
        pos: TilePos,
        creatures: &mut BTreeMap<CreatureId, Creature>,
    ) -> usize {
        let holders: Vec<CreatureId> = self
            .active
            .iter()
            .filter(|(_, t)| t.kind == kind && t.target == pos)
            .map(|(id, _)| *id)
            .collect();
        for id in &holders {
            match creatures.get_mut(id) {
                Some(creature) => {
                    self.cancel_task(ctx, creature);
                }
                None => {
                    self.cancel_active(ctx, *id);
                }
            }
        }

        let mut purged = 0;
        for queue in self.pending.values_mut() {
            queue.retain(|t| {
                let keep = !(t.kind == kind && t.target == pos);
                if !keep {
                    emit_cancelled(ctx.events, t);
                    purged += 1;
                }
                keep
            });
        }
        self.pending.retain(|_, q| !q.is_empty());

        if !holders.is_empty() || purged > 0 {
            tracing::info!(
                target: "deepdelve::scheduler",
                kind = ?kind,
                x = pos.x,
                y = pos.y,
                active = holders.len(),
                queued = purged,
                "task.cancelled_at_position"
            );
        }
        holders.len() + purged
    }
}
