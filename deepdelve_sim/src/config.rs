// Game configuration: all tunable simulation parameters.
//
// `GameConfig` is loaded from JSON (or built from `Default`) and never
// mutated at runtime. Every field has a default, and the struct is
// `#[serde(default)]`, so a config file only needs the fields it overrides.
//
// Loading:
// - `GameConfig::from_json_str` / `GameConfig::from_file` parse and then
//   `validate()`, returning `ConfigError` on failure.
// - `GameConfig::load_from_env` reads `DEEPDELVE_CONFIG_PATH`; if it is
//   unset, or the file fails to load, it logs and falls back to defaults.
//
// The per-kind `TaskTypeConfig` table drives the scheduler: priority order,
// whether handlers may auto-discover targets, whether several creatures may
// share a target, and the XP granted on completion.
//
// See also: `species.rs` for the per-species table, `scheduler.rs` and
// `behavior.rs` for the main consumers.
//
// **Critical constraint: determinism.** The config must be identical for any
// two runs expected to produce the same result. Maps are `BTreeMap`s.

use crate::species::SpeciesData;
use crate::task::TaskKind;
use crate::types::Species;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::{env, fs, io};
use thiserror::Error;

/// Environment variable naming a JSON config file.
pub const CONFIG_PATH_ENV: &str = "DEEPDELVE_CONFIG_PATH";

/// Scheduler rules for one task kind.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskTypeConfig {
    /// Higher is tried first.
    pub priority: i32,
    /// Whether the handler may discover targets on its own when the pending
    /// queue has nothing reachable.
    pub auto_assign: bool,
    /// Whether more than one creature may work the same target at once.
    pub multiple_workers: bool,
    pub xp_reward: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Visual units per tile.
    pub tile_size: f32,

    /// Distance (visual units) at which a moving creature counts as arrived.
    pub arrival_epsilon: f32,

    /// Hop cutoff for nearest-target searches.
    pub nearest_tile_max_distance: u32,

    /// Seconds a wandering creature waits between decisions, sampled
    /// uniformly from `(min, max)`.
    pub wander_cooldown_range: (f32, f32),

    /// Probability that a wander decision picks a new point rather than
    /// returning to idle.
    pub wander_new_point_chance: f64,

    /// Max Manhattan distance (tiles) of a new wander point.
    pub wander_radius: i32,

    /// Happiness lost per second.
    pub happiness_decay_per_second: f32,

    /// Cumulative XP needed to reach each level. Entry `i` is the threshold
    /// for level `i + 1`; entry 0 must be 0. The length is the level cap.
    pub level_xp_thresholds: Vec<u32>,

    /// How many discovered targets the scheduler tries per task kind before
    /// moving on to the next kind.
    pub max_target_attempts: u32,

    /// How far (in tiles) a digger's work point sits from its tile center
    /// toward the wall.
    pub dig_work_offset: f32,

    /// Spacing (in tiles) between dig slots along a wall face.
    pub dig_slot_spread: f32,

    pub task_types: BTreeMap<TaskKind, TaskTypeConfig>,

    pub species: BTreeMap<Species, SpeciesData>,

    /// Seconds between portal spawns.
    pub portal_spawn_interval_secs: f32,

    /// Portals stop spawning once a faction has this many creatures.
    pub max_creatures_per_faction: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        let mut task_types = BTreeMap::new();
        task_types.insert(
            TaskKind::Dig,
            TaskTypeConfig {
                priority: 30,
                auto_assign: true,
                multiple_workers: true,
                xp_reward: 10,
            },
        );
        task_types.insert(
            TaskKind::Claim,
            TaskTypeConfig {
                priority: 20,
                auto_assign: true,
                multiple_workers: false,
                xp_reward: 5,
            },
        );
        task_types.insert(
            TaskKind::Carry,
            TaskTypeConfig {
                priority: 10,
                auto_assign: false,
                multiple_workers: false,
                xp_reward: 2,
            },
        );

        let mut species = BTreeMap::new();
        species.insert(Species::Imp, SpeciesData::imp());
        species.insert(Species::Goblin, SpeciesData::goblin());

        Self {
            tile_size: 1.0,
            arrival_epsilon: 0.01,
            nearest_tile_max_distance: 64,
            wander_cooldown_range: (2.0, 5.0),
            wander_new_point_chance: 0.7,
            wander_radius: 6,
            happiness_decay_per_second: 0.1,
            level_xp_thresholds: vec![0, 100, 250, 450, 700, 1000, 1400, 1900, 2500, 3200],
            max_target_attempts: 5,
            dig_work_offset: 0.35,
            dig_slot_spread: 0.25,
            task_types,
            species,
            portal_spawn_interval_secs: 15.0,
            max_creatures_per_faction: 20,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse game config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read game config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid game config: {0}")]
    Invalid(String),
}

impl GameConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Load from `path` if given, otherwise use defaults. Load failures are
    /// logged and fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        if let Some(path) = path {
            match Self::from_file(path) {
                Ok(config) => {
                    tracing::info!(
                        target: "deepdelve::config",
                        path = %path.display(),
                        "game_config.loaded=file"
                    );
                    return config;
                }
                Err(err) => {
                    tracing::warn!(
                        target: "deepdelve::config",
                        path = %path.display(),
                        error = %err,
                        "game_config.load_failed"
                    );
                }
            }
        }
        tracing::info!(target: "deepdelve::config", "game_config.loaded=builtin");
        Self::default()
    }

    /// Load from the file named by `DEEPDELVE_CONFIG_PATH`, falling back to
    /// defaults.
    pub fn load_from_env() -> Self {
        let path = env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        Self::load_or_default(path.as_deref())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| -> Result<(), ConfigError> { Err(ConfigError::Invalid(msg)) };
        if !(self.tile_size > 0.0) {
            return invalid(format!("tile_size must be positive, got {}", self.tile_size));
        }
        if !(self.arrival_epsilon > 0.0) {
            return invalid("arrival_epsilon must be positive".into());
        }
        let (lo, hi) = self.wander_cooldown_range;
        if lo < 0.0 || hi < lo {
            return invalid(format!("wander_cooldown_range ({lo}, {hi}) is inverted or negative"));
        }
        if !(0.0..=1.0).contains(&self.wander_new_point_chance) {
            return invalid("wander_new_point_chance must be within [0, 1]".into());
        }
        if self.level_xp_thresholds.first() != Some(&0) {
            return invalid("level_xp_thresholds must start with 0".into());
        }
        if self.level_xp_thresholds.windows(2).any(|w| w[1] <= w[0]) {
            return invalid("level_xp_thresholds must be strictly increasing".into());
        }
        if self.max_target_attempts == 0 {
            return invalid("max_target_attempts must be at least 1".into());
        }
        if !(self.portal_spawn_interval_secs > 0.0) {
            return invalid("portal_spawn_interval_secs must be positive".into());
        }
        Ok(())
    }

    /// Highest reachable level.
    pub fn max_level(&self) -> u32 {
        self.level_xp_thresholds.len().max(1) as u32
    }

    /// Level for a cumulative XP total, capped at `max_level()`.
    pub fn level_for_xp(&self, xp: u32) -> u32 {
        let reached = self
            .level_xp_thresholds
            .iter()
            .take_while(|&&threshold| xp >= threshold)
            .count() as u32;
        reached.clamp(1, self.max_level())
    }

    pub fn task_type(&self, kind: TaskKind) -> Option<&TaskTypeConfig> {
        self.task_types.get(&kind)
    }

    pub fn species_data(&self, species: Species) -> Option<&SpeciesData> {
        self.species.get(&species)
    }

    /// The configured kinds among `kinds`, highest priority first. Equal
    /// priorities keep `TaskKind` order. Unconfigured kinds are dropped.
    pub fn kinds_by_priority(&self, kinds: &[TaskKind]) -> Vec<TaskKind> {
        let mut sorted: Vec<(i32, TaskKind)> = kinds
            .iter()
            .filter_map(|&k| self.task_type(k).map(|t| (t.priority, k)))
            .collect();
        sorted.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        sorted.dedup_by_key(|(_, k)| *k);
        sorted.into_iter().map(|(_, k)| k).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_and_roundtrips() {
        let config = GameConfig::default();
        config.validate().unwrap();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let restored = GameConfig::from_json_str(&json).unwrap();
        assert_eq!(restored.level_xp_thresholds, config.level_xp_thresholds);
        assert_eq!(restored.task_types, config.task_types);
        assert_eq!(restored.species[&Species::Imp], SpeciesData::imp());
    }

    #[test]
    fn partial_json_overrides_defaults() {
        let config = GameConfig::from_json_str(
            r#"{
                "tile_size": 32.0,
                "wander_cooldown_range": [1.0, 1.5],
                "task_types": {
                    "Claim": {
                        "priority": 50,
                        "auto_assign": true,
                        "multiple_workers": false,
                        "xp_reward": 7
                    }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.tile_size, 32.0);
        assert_eq!(config.wander_cooldown_range, (1.0, 1.5));
        assert_eq!(config.task_types.len(), 1);
        assert_eq!(config.max_target_attempts, 5);
    }

    #[test]
    fn reference_priorities_order_dig_claim_carry() {
        let config = GameConfig::default();
        assert_eq!(
            config.kinds_by_priority(&[TaskKind::Carry, TaskKind::Claim, TaskKind::Dig]),
            vec![TaskKind::Dig, TaskKind::Claim, TaskKind::Carry]
        );
        assert!(config.task_types[&TaskKind::Dig].multiple_workers);
        assert!(!config.task_types[&TaskKind::Claim].multiple_workers);
    }

    #[test]
    fn level_for_xp_uses_cumulative_thresholds() {
        let config = GameConfig::default();
        assert_eq!(config.level_for_xp(0), 1);
        assert_eq!(config.level_for_xp(99), 1);
        assert_eq!(config.level_for_xp(100), 2);
        assert_eq!(config.level_for_xp(1_000_000), 10);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = GameConfig::default();
        config.wander_cooldown_range = (5.0, 1.0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = GameConfig::default();
        config.level_xp_thresholds = vec![0, 50, 50];
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.tile_size = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_error_is_reported() {
        let err = GameConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = env::temp_dir().join("deepdelve-config-does-not-exist.json");
        assert!(matches!(
            GameConfig::from_file(&path),
            Err(ConfigError::Read { .. })
        ));
        let config = GameConfig::load_or_default(Some(&path));
        assert_eq!(config.tile_size, GameConfig::default().tile_size);
    }

    #[test]
    fn from_file_reads_json() {
        let path = env::temp_dir().join(format!(
            "deepdelve-config-test-{}.json",
            std::process::id()
        ));
        fs::write(&path, r#"{ "max_target_attempts": 9 }"#).unwrap();
        let config = GameConfig::from_file(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(config.max_target_attempts, 9);
    }
}
