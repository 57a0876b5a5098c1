// Carry handler: placeholder for hauling.
//
// Never discovers a target and completes as soon as it is executed. It only
// runs when a carry task is queued explicitly; goblins have it as their sole
// task kind, so with nothing queued they fall through to wandering.

use super::{TargetQuery, TaskContext, TaskHandler, Worker, WorkResult};
use crate::task::{Task, TaskKind};
use crate::types::TilePos;
use crate::world::World;

#[derive(Clone, Copy, Debug, Default)]
pub struct CarryHandler;

impl TaskHandler for CarryHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::Carry
    }

    fn find_target(&self, _query: &TargetQuery<'_>, _worker: &Worker) -> Option<TilePos> {
        None
    }

    fn get_work_position(
        &self,
        ctx: &mut TaskContext<'_>,
        _worker: &Worker,
        task: &mut Task,
    ) -> Option<TilePos> {
        ctx.world.grid().is_walkable(task.target).then_some(task.target)
    }

    fn is_in_work_position(&self, _world: &World, worker: &Worker, task: &Task) -> bool {
        worker.tile == task.target
    }

    fn execute(
        &self,
        _ctx: &mut TaskContext<'_>,
        _worker: &Worker,
        task: &mut Task,
        _delta: f32,
    ) -> WorkResult {
        task.progress = 100.0;
        WorkResult::Continue
    }

    fn is_complete(&self, _world: &World, _task: &Task) -> bool {
        true
    }

    fn on_complete(&self, _ctx: &mut TaskContext<'_>, _task: &mut Task) {}

    fn on_cancel(&self, _ctx: &mut TaskContext<'_>, _task: &mut Task) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::test_util::world_from_rows;
    use crate::types::{CreatureId, FactionId, Species, TaskId};
    use std::collections::{BTreeMap, BTreeSet};

    #[test]
    fn never_finds_a_target_and_completes_instantly() {
        let world = world_from_rows(&["A.."]);
        let config = GameConfig::default();
        let creatures = BTreeMap::new();
        let excluded = BTreeSet::new();
        let query = TargetQuery {
            world: &world,
            config: &config,
            creatures: &creatures,
            excluded: &excluded,
        };
        let worker = Worker {
            id: CreatureId(0),
            faction: FactionId(0),
            species: Species::Goblin,
            tile: TilePos::new(0, 0),
            level: 1,
        };
        assert_eq!(CarryHandler.find_target(&query, &worker), None);
        let task = Task::new(
            TaskId(0),
            TaskKind::Carry,
            TilePos::new(1, 0),
            FactionId(0),
            0.0,
        );
        assert!(CarryHandler.is_complete(&world, &task));
        assert_eq!(CarryHandler.xp_reward(&config), 2);
    }
}
