// Task entities: units of work a creature can be assigned to.
//
// A `Task` is a common header (id, kind, target, faction, lifecycle state,
// assignee, progress, creation time) plus a per-kind `TaskPayload` carrying
// handler-specific data, e.g. the wall face and slot index a digger holds.
// Tasks are created by the scheduler, either from a queued player request
// or by handler auto-discovery, and dropped on completion, cancellation, or
// failure; there is no task registry beyond the scheduler's pending queues
// and active-assignment table.
//
// See also: `scheduler.rs` for the lifecycle, `handlers/` for the per-kind
// behavior, `config.rs` for per-kind priority and assignment rules.
//
// **Critical constraint: determinism.** Task ids are assigned monotonically
// by the scheduler.

use crate::types::{CreatureId, Direction, FactionId, TaskId, TilePos};
use serde::{Deserialize, Serialize};

/// The type of work a task represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskKind {
    /// Stand on a tile and convert it to the faction's territory.
    Claim,
    /// Excavate a marked wall from an adjacent tile.
    Dig,
    /// Haul an item. Placeholder: never produces work.
    Carry,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [TaskKind::Claim, TaskKind::Dig, TaskKind::Carry];
}

/// Lifecycle state of a task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    /// Queued, not yet assigned.
    #[default]
    Pending,
    /// Assigned; the creature is walking to the work position.
    Assigned,
    /// The creature is at the work position producing output.
    InProgress,
    Completed,
    Cancelled,
    Failed,
}

/// Per-kind task data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum TaskPayload {
    #[default]
    None,
    /// The wall face and slot a digger holds. `None` until a work position
    /// has been computed.
    Dig {
        face: Option<Direction>,
        slot: Option<usize>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    pub target: TilePos,
    pub faction: FactionId,
    pub state: TaskState,
    pub assigned_creature: Option<CreatureId>,
    /// Kind-specific progress measure, informational only; handlers read the
    /// authoritative state from the world.
    pub progress: f32,
    /// Sim time (seconds) when the task was created.
    pub creation_time: f64,
    pub payload: TaskPayload,
}

impl Task {
    pub fn new(
        id: TaskId,
        kind: TaskKind,
        target: TilePos,
        faction: FactionId,
        creation_time: f64,
    ) -> Self {
        let payload = match kind {
            TaskKind::Dig => TaskPayload::Dig {
                face: None,
                slot: None,
            },
            TaskKind::Claim | TaskKind::Carry => TaskPayload::None,
        };
        Self {
            id,
            kind,
            target,
            faction,
            state: TaskState::Pending,
            assigned_creature: None,
            progress: 0.0,
            creation_time,
            payload,
        }
    }

    /// The dig face and slot this task holds, if any.
    pub fn dig_slot(&self) -> Option<(Direction, usize)> {
        match self.payload {
            TaskPayload::Dig {
                face: Some(face),
                slot: Some(slot),
            } => Some((face, slot)),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            TaskState::Completed | TaskState::Cancelled | TaskState::Failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_dig_task_has_empty_slot_payload() {
        let task = Task::new(TaskId(1), TaskKind::Dig, TilePos::new(3, 4), FactionId(0), 2.5);
        assert_eq!(task.state, TaskState::Pending);
        assert_eq!(task.dig_slot(), None);
        assert_eq!(
            task.payload,
            TaskPayload::Dig {
                face: None,
                slot: None
            }
        );
    }

    #[test]
    fn dig_slot_reads_payload() {
        let mut task = Task::new(TaskId(1), TaskKind::Dig, TilePos::new(0, 0), FactionId(0), 0.0);
        task.payload = TaskPayload::Dig {
            face: Some(Direction::East),
            slot: Some(2),
        };
        assert_eq!(task.dig_slot(), Some((Direction::East, 2)));
    }

    #[test]
    fn finished_states() {
        let mut task = Task::new(TaskId(7), TaskKind::Claim, TilePos::new(0, 0), FactionId(1), 0.0);
        assert!(!task.is_finished());
        task.state = TaskState::Failed;
        assert!(task.is_finished());
    }

    #[test]
    fn task_serialization_roundtrip() {
        let task = Task::new(TaskId(9), TaskKind::Claim, TilePos::new(5, 1), FactionId(2), 12.0);
        let json = serde_json::to_string(&task).unwrap();
        let restored: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, task);
    }
}
