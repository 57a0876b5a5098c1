// Claim handler: grow a faction's territory one tile at a time.
//
// Target: the nearest walkable tile the faction does not own that touches
// its territory (cardinal adjacency is the only admission rule), skipping
// any tile within Manhattan distance 1 of a creature from another faction.
// The worker stands on the target itself and feeds `claim_strength * delta`
// per tick into the contest ledger; the ledger converts the tile when the
// contest completes, which is what `is_complete` observes.

use super::{TargetQuery, TaskContext, TaskHandler, Worker, WorkResult};
use crate::task::{Task, TaskKind};
use crate::territory::{ClaimOutcome, Territory, CLAIM_COMPLETE};
use crate::types::{FactionId, TilePos};
use crate::world::World;

/// Claim targets closer than this to an enemy creature are skipped.
const ENEMY_SAFETY_RADIUS: u32 = 1;

#[derive(Clone, Copy, Debug, Default)]
pub struct ClaimHandler;

fn is_claim_target(territory: &Territory, pos: TilePos, faction: FactionId) -> bool {
    territory.grid.is_walkable(pos)
        && territory.is_claimable_by(pos, faction)
        && territory.is_adjacent_to_faction(pos, faction)
}

impl TaskHandler for ClaimHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::Claim
    }

    fn find_target(&self, query: &TargetQuery<'_>, worker: &Worker) -> Option<TilePos> {
        let territory = query.world.territory();
        let enemies: Vec<TilePos> = query
            .creatures
            .values()
            .filter(|c| c.faction != worker.faction)
            .map(|c| c.tile)
            .collect();
        query.world.find_nearest_tile(
            worker.tile,
            |p| {
                !query.excluded.contains(&p)
                    && is_claim_target(territory, p, worker.faction)
                    && !enemies
                        .iter()
                        .any(|e| e.manhattan_distance(p) <= ENEMY_SAFETY_RADIUS)
            },
            query.config.nearest_tile_max_distance,
        )
    }

    fn get_work_position(
        &self,
        ctx: &mut TaskContext<'_>,
        _worker: &Worker,
        task: &mut Task,
    ) -> Option<TilePos> {
        is_claim_target(ctx.world.territory(), task.target, task.faction).then_some(task.target)
    }

    fn is_in_work_position(&self, _world: &World, worker: &Worker, task: &Task) -> bool {
        worker.tile == task.target
    }

    fn execute(
        &self,
        ctx: &mut TaskContext<'_>,
        worker: &Worker,
        task: &mut Task,
        delta: f32,
    ) -> WorkResult {
        let Some(data) = ctx.config.species_data(worker.species) else {
            return WorkResult::Failed;
        };
        let amount = data.claim_strength * delta;
        match ctx
            .world
            .add_claim_progress(task.target, task.faction, amount, ctx.events)
        {
            ClaimOutcome::Rejected => WorkResult::Failed,
            ClaimOutcome::Started { progress }
            | ClaimOutcome::Advanced { progress }
            | ClaimOutcome::Flipped { progress } => {
                task.progress = progress;
                WorkResult::Continue
            }
            ClaimOutcome::Contested { .. } => {
                task.progress = 0.0;
                WorkResult::Continue
            }
            ClaimOutcome::Completed { .. } => {
                task.progress = CLAIM_COMPLETE;
                WorkResult::Continue
            }
        }
    }

    fn is_complete(&self, world: &World, task: &Task) -> bool {
        world.grid().owner(task.target) == Some(task.faction)
    }

    fn on_complete(&self, _ctx: &mut TaskContext<'_>, task: &mut Task) {
        tracing::debug!(
            target: "deepdelve::scheduler",
            task = task.id.0,
            x = task.target.x,
            y = task.target.y,
            "claim.task_done"
        );
    }

    fn on_cancel(&self, _ctx: &mut TaskContext<'_>, _task: &mut Task) {}
}
