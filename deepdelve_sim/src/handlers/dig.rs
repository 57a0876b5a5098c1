// Dig handler: excavate walls the faction has marked.
//
// Target: the nearest wall marked by the worker's faction that still has a
// face with a free slot. Several diggers may share a wall (the scheduler
// exempts digging from target exclusion); admission is the per-face slot
// limit in `territory.rs`.
//
// Work position: the walkable tile on the far side of the best face, i.e.
// the face whose standing tile is nearest the worker and reachable. The
// handler claims that face's slot before returning a position; if every
// face fails, there is no work position and the scheduler moves on. Any slot
// the task already held is released first, so recomputing never leaks.
//
// Work: `dig_strength * delta` is subtracted from the wall's health each
// tick. The digger that brings health to 0 completes the task, which turns
// the wall into floor and drops every dig record for it; other diggers on
// the same wall then fail on their next tick. The slot is released on
// completion and on cancellation.

use super::{TargetQuery, TaskContext, TaskHandler, Worker, WorkResult};
use crate::config::GameConfig;
use crate::task::{Task, TaskKind, TaskPayload};
use crate::types::{DEFAULT_WALL_HEALTH, TilePos, Vec2};
use crate::world::World;

#[derive(Clone, Copy, Debug, Default)]
pub struct DigHandler;

impl DigHandler {
    fn release_slot(ctx: &mut TaskContext<'_>, task: &mut Task) {
        if let (Some(creature), Some((face, _))) = (task.assigned_creature, task.dig_slot()) {
            ctx.world.release_dig_slot(task.target, face, creature);
        }
        task.payload = TaskPayload::Dig {
            face: None,
            slot: None,
        };
    }
}

impl TaskHandler for DigHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::Dig
    }

    fn find_target(&self, query: &TargetQuery<'_>, worker: &Worker) -> Option<TilePos> {
        let territory = query.world.territory();
        query.world.find_nearest_tile(
            worker.tile,
            |p| {
                !query.excluded.contains(&p)
                    && territory.is_marked_for(p, worker.faction)
                    && territory.get_available_dig_face(p).is_some()
            },
            query.config.nearest_tile_max_distance,
        )
    }

    fn get_work_position(
        &self,
        ctx: &mut TaskContext<'_>,
        worker: &Worker,
        task: &mut Task,
    ) -> Option<TilePos> {
        let target = task.target;
        if let Some((face, _)) = task.dig_slot() {
            ctx.world.release_dig_slot(target, face, worker.id);
        }
        task.payload = TaskPayload::Dig {
            face: None,
            slot: None,
        };
        if !ctx.world.territory().is_marked_for(target, task.faction) {
            return None;
        }

        let mut faces = ctx.world.territory().get_all_available_dig_faces(target);
        faces.sort_by_key(|&dir| (worker.tile.manhattan_distance(target.step(dir)), dir));
        for dir in faces {
            let stand = target.step(dir);
            if ctx.world.find_path(worker.tile, stand).is_empty() {
                continue;
            }
            if let Some(slot) = ctx.world.claim_dig_slot(target, dir, worker.id) {
                task.payload = TaskPayload::Dig {
                    face: Some(dir),
                    slot: Some(slot),
                };
                return Some(stand);
            }
        }
        None
    }

    fn is_in_work_position(&self, world: &World, worker: &Worker, task: &Task) -> bool {
        match task.dig_slot() {
            Some((face, _)) => {
                worker.tile == task.target.step(face) && world.grid().is_diggable(task.target)
            }
            None => false,
        }
    }

    /// Near the wall edge of the standing tile, spread along the face by
    /// slot index (slot 1 is centered).
    fn work_point(&self, config: &GameConfig, task: &Task) -> Vec2 {
        let ts = config.tile_size;
        let Some((face, slot)) = task.dig_slot() else {
            return task.target.center(ts);
        };
        let stand = task.target.step(face).center(ts);
        let toward_wall = face.opposite().unit() * (config.dig_work_offset * ts);
        let along_face = face.perpendicular() * ((slot as f32 - 1.0) * config.dig_slot_spread * ts);
        stand + toward_wall + along_face
    }

    fn execute(
        &self,
        ctx: &mut TaskContext<'_>,
        worker: &Worker,
        task: &mut Task,
        delta: f32,
    ) -> WorkResult {
        let target = task.target;
        if !ctx.world.grid().is_diggable(target) {
            return WorkResult::Failed;
        }
        let Some((face, slot)) = task.dig_slot() else {
            return WorkResult::Failed;
        };
        let holder = ctx.world.territory().face_slots(target, face).get(slot).copied().flatten();
        if holder != Some(worker.id) {
            return WorkResult::Failed;
        }
        let Some(data) = ctx.config.species_data(worker.species) else {
            return WorkResult::Failed;
        };
        let amount = data.dig_strength * delta;
        match ctx.world.damage_wall(target, amount, ctx.events) {
            Some(remaining) => {
                task.progress = ((1.0 - remaining / DEFAULT_WALL_HEALTH) * 100.0).clamp(0.0, 100.0);
                WorkResult::Continue
            }
            None => WorkResult::Failed,
        }
    }

    fn is_complete(&self, world: &World, task: &Task) -> bool {
        world
            .territory()
            .wall_health(task.target)
            .is_some_and(|h| h <= 0.0)
    }

    fn on_complete(&self, ctx: &mut TaskContext<'_>, task: &mut Task) {
        Self::release_slot(ctx, task);
        ctx.world.complete_dig(task.target, ctx.events);
    }

    fn on_cancel(&self, ctx: &mut TaskContext<'_>, task: &mut Task) {
        Self::release_slot(ctx, task);
    }
}
