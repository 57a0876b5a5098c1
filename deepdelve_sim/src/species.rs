// Species data: data-driven creature configuration.
//
// All behavioral differences between species (imps, goblins, ...) are data
// in `SpeciesData`, keyed by `Species` in `GameConfig::species`. The sim has
// a single `Creature` type and reads per-species values from this table at
// runtime; there is no per-species code branching.
//
// Level-derived stats are linear: `base + per_level * (level - 1)`.
//
// See also: `config.rs` where the species table lives, `creature.rs` for the
// stat accessors that consume this data, `scheduler.rs` which reads
// `task_kinds` to decide what a creature may be assigned.

use crate::task::TaskKind;
use serde::{Deserialize, Serialize};

/// Data-driven parameters for a creature species.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeciesData {
    /// Movement speed at level 1, in tiles per second.
    pub base_speed: f32,
    pub speed_per_level: f32,

    pub base_health: f32,
    pub health_per_level: f32,

    pub base_armor: f32,
    pub armor_per_level: f32,

    /// Wall health removed per second of digging.
    pub dig_strength: f32,

    /// Claim progress added per second of claiming.
    pub claim_strength: f32,

    /// Task kinds this species may be assigned. Order is irrelevant; the
    /// scheduler sorts by configured priority.
    pub task_kinds: Vec<TaskKind>,
}

impl SpeciesData {
    fn at_level(base: f32, per_level: f32, level: u32) -> f32 {
        base + per_level * level.saturating_sub(1) as f32
    }

    pub fn speed(&self, level: u32) -> f32 {
        Self::at_level(self.base_speed, self.speed_per_level, level)
    }

    pub fn max_health(&self, level: u32) -> f32 {
        Self::at_level(self.base_health, self.health_per_level, level)
    }

    pub fn armor(&self, level: u32) -> f32 {
        Self::at_level(self.base_armor, self.armor_per_level, level)
    }

    pub fn can_do(&self, kind: TaskKind) -> bool {
        self.task_kinds.contains(&kind)
    }

    /// Work output per second for a task kind.
    pub fn strength_for(&self, kind: TaskKind) -> f32 {
        match kind {
            TaskKind::Dig => self.dig_strength,
            TaskKind::Claim => self.claim_strength,
            TaskKind::Carry => 1.0,
        }
    }

    pub fn imp() -> Self {
        Self {
            base_speed: 3.0,
            speed_per_level: 0.1,
            base_health: 75.0,
            health_per_level: 10.0,
            base_armor: 5.0,
            armor_per_level: 1.0,
            dig_strength: 20.0,
            claim_strength: 25.0,
            task_kinds: vec![TaskKind::Dig, TaskKind::Claim],
        }
    }

    pub fn goblin() -> Self {
        Self {
            base_speed: 2.0,
            speed_per_level: 0.05,
            base_health: 120.0,
            health_per_level: 15.0,
            base_armor: 10.0,
            armor_per_level: 2.0,
            dig_strength: 0.0,
            claim_strength: 0.0,
            task_kinds: vec![TaskKind::Carry],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_scale_linearly_with_level() {
        let imp = SpeciesData::imp();
        assert_eq!(imp.speed(1), imp.base_speed);
        assert!((imp.speed(5) - (imp.base_speed + 4.0 * imp.speed_per_level)).abs() < 1e-5);
        assert_eq!(imp.max_health(3), 95.0);
        assert_eq!(imp.armor(10), 14.0);
    }

    #[test]
    fn level_zero_is_treated_as_level_one() {
        let imp = SpeciesData::imp();
        assert_eq!(imp.max_health(0), imp.max_health(1));
    }

    #[test]
    fn goblins_cannot_dig() {
        let goblin = SpeciesData::goblin();
        assert!(!goblin.can_do(TaskKind::Dig));
        assert!(goblin.can_do(TaskKind::Carry));
        assert!(SpeciesData::imp().can_do(TaskKind::Dig));
    }
}
