// Core types shared across the simulation.
//
// Defines grid coordinates (`TilePos`), cardinal directions, continuous
// visual positions (`Vec2`), strongly-typed integer IDs, the tile type
// property table, and the small enums (species, creature state, sim speed)
// that every other module speaks in. Everything derives `Serialize` and
// `Deserialize` so snapshots and events can carry them directly.
//
// Grid convention: `x` grows east, `y` grows south. North is `y - 1`.
// Tile `(x, y)` covers the visual square `[x, x+1) * tile_size` by
// `[y, y+1) * tile_size`.
//
// **Critical constraint: determinism.** IDs are assigned monotonically by
// their owners (`SimState` for creatures, `TaskScheduler` for tasks), never
// from entropy. Neighbor iteration order is always `Direction::ALL`
// (N, E, S, W); pathfinding tie-breaking depends on it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};

// ---------------------------------------------------------------------------
// Grid coordinates
// ---------------------------------------------------------------------------

/// A tile position on the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance between two tiles.
    pub fn manhattan_distance(self, other: Self) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }

    /// The tile one step away in `dir`.
    pub fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.offset();
        Self::new(self.x + dx, self.y + dy)
    }

    /// The four cardinal neighbors in N, E, S, W order.
    pub fn neighbors(self) -> [(Direction, TilePos); 4] {
        Direction::ALL.map(|dir| (dir, self.step(dir)))
    }

    /// Visual-space center of this tile.
    pub fn center(self, tile_size: f32) -> Vec2 {
        Vec2::new(
            (self.x as f32 + 0.5) * tile_size,
            (self.y as f32 + 0.5) * tile_size,
        )
    }

    /// The tile containing a visual-space point.
    pub fn containing(point: Vec2, tile_size: f32) -> Self {
        Self::new(
            (point.x / tile_size).floor() as i32,
            (point.y / tile_size).floor() as i32,
        )
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One of the four cardinal directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Fixed visitation order for every neighbor scan.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Grid offset `(dx, dy)`. North is -y.
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Bit used for this direction in nav-graph link masks.
    pub const fn bit(self) -> u8 {
        match self {
            Direction::North => 0b0001,
            Direction::East => 0b0010,
            Direction::South => 0b0100,
            Direction::West => 0b1000,
        }
    }

    /// Unit vector in visual space.
    pub fn unit(self) -> Vec2 {
        let (dx, dy) = self.offset();
        Vec2::new(dx as f32, dy as f32)
    }

    /// Unit vector perpendicular to this direction (rotated 90° clockwise).
    pub fn perpendicular(self) -> Vec2 {
        let (dx, dy) = self.offset();
        Vec2::new(-dy as f32, dx as f32)
    }
}

// ---------------------------------------------------------------------------
// Continuous visual positions
// ---------------------------------------------------------------------------

/// A point in continuous visual space (tile units scaled by `tile_size`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2::new(0.0, 0.0);

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Self) -> f32 {
        (other - self).length()
    }

    /// Move toward `target` by at most `max_step`. Returns the new point and
    /// whether it reached the target.
    pub fn move_toward(self, target: Self, max_step: f32) -> (Self, bool) {
        let delta = target - self;
        let dist = delta.length();
        if dist <= max_step || dist == 0.0 {
            (target, true)
        } else {
            (self + delta * (max_step / dist), false)
        }
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

// ---------------------------------------------------------------------------
// Strongly-typed IDs
// ---------------------------------------------------------------------------

macro_rules! sim_id {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

sim_id!(/// Unique creature identifier, assigned monotonically at spawn.
CreatureId(u32));
sim_id!(/// Unique task identifier, assigned monotonically by the scheduler.
TaskId(u64));
sim_id!(/// Faction identifier. Unclaimed tiles carry no faction at all.
FactionId(u32));

// ---------------------------------------------------------------------------
// Tile types
// ---------------------------------------------------------------------------

/// Health of a freshly placed wall tile.
pub const DEFAULT_WALL_HEALTH: f32 = 100.0;

/// The terrain type of a single tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TileType {
    /// Indestructible bedrock.
    #[default]
    Rock,
    /// Diggable earth.
    Wall,
    /// Walkable, unowned floor.
    Floor,
    /// Walkable floor owned by a faction.
    Claimed,
}

/// Derived behavior of a tile type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileProperties {
    pub walkable: bool,
    pub diggable: bool,
    pub claimable: bool,
    pub blocks_sight: bool,
}

impl TileType {
    pub const fn properties(self) -> TileProperties {
        match self {
            TileType::Rock => TileProperties {
                walkable: false,
                diggable: false,
                claimable: false,
                blocks_sight: true,
            },
            TileType::Wall => TileProperties {
                walkable: false,
                diggable: true,
                claimable: false,
                blocks_sight: true,
            },
            TileType::Floor => TileProperties {
                walkable: true,
                diggable: false,
                claimable: true,
                blocks_sight: false,
            },
            TileType::Claimed => TileProperties {
                walkable: true,
                diggable: false,
                claimable: true,
                blocks_sight: false,
            },
        }
    }

    pub const fn is_walkable(self) -> bool {
        self.properties().walkable
    }

    pub const fn is_diggable(self) -> bool {
        self.properties().diggable
    }

    pub const fn is_claimable(self) -> bool {
        self.properties().claimable
    }

    pub const fn blocks_sight(self) -> bool {
        self.properties().blocks_sight
    }

    /// Health a tile of this type starts with. `None` means indestructible
    /// or not applicable (health only matters for diggable tiles).
    pub const fn default_health(self) -> Option<f32> {
        match self {
            TileType::Wall => Some(DEFAULT_WALL_HEALTH),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation enums
// ---------------------------------------------------------------------------

/// Creature species. Behavioral differences live in `SpeciesData`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Species {
    /// Small worker that digs and claims.
    Imp,
    /// Hauler; cannot dig.
    Goblin,
}

/// Top-level behavior state of a creature.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreatureState {
    #[default]
    Idle,
    Walking,
    Working,
    Wandering,
}

/// Simulation speed settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimSpeed {
    Paused,
    #[default]
    Normal,
    Fast,
}

impl SimSpeed {
    /// Multiplier applied to the frame delta.
    pub const fn multiplier(self) -> f32 {
        match self {
            SimSpeed::Paused => 0.0,
            SimSpeed::Normal => 1.0,
            SimSpeed::Fast => 3.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rock_is_neither_walkable_nor_diggable() {
        assert!(!TileType::Rock.is_walkable());
        assert!(!TileType::Rock.is_diggable());
        assert_eq!(TileType::Rock.default_health(), None);
    }

    #[test]
    fn floor_types_are_walkable_and_not_diggable() {
        for ty in [TileType::Floor, TileType::Claimed] {
            assert!(ty.is_walkable(), "{ty:?} should be walkable");
            assert!(!ty.is_diggable(), "{ty:?} should not be diggable");
            assert!(!ty.blocks_sight());
        }
    }

    #[test]
    fn walls_carry_default_health() {
        assert_eq!(TileType::Wall.default_health(), Some(DEFAULT_WALL_HEALTH));
        assert!(TileType::Wall.is_diggable());
        assert!(!TileType::Wall.is_walkable());
    }

    #[test]
    fn neighbors_follow_fixed_order() {
        let p = TilePos::new(5, 5);
        let dirs: Vec<_> = p.neighbors().iter().map(|(d, _)| *d).collect();
        assert_eq!(dirs, Direction::ALL.to_vec());
        assert_eq!(p.step(Direction::North), TilePos::new(5, 4));
        assert_eq!(p.step(Direction::East), TilePos::new(6, 5));
    }

    #[test]
    fn opposite_is_involutive() {
        for dir in Direction::ALL {
            assert_eq!(dir.opposite().opposite(), dir);
            assert_ne!(dir.opposite(), dir);
        }
    }

    #[test]
    fn containing_inverts_center() {
        let tile_size = 32.0;
        let p = TilePos::new(3, 7);
        assert_eq!(TilePos::containing(p.center(tile_size), tile_size), p);
    }

    #[test]
    fn move_toward_snaps_on_arrival() {
        let (p, arrived) = Vec2::new(0.0, 0.0).move_toward(Vec2::new(3.0, 4.0), 10.0);
        assert!(arrived);
        assert_eq!(p, Vec2::new(3.0, 4.0));

        let (p, arrived) = Vec2::new(0.0, 0.0).move_toward(Vec2::new(3.0, 4.0), 2.5);
        assert!(!arrived);
        assert!((p.length() - 2.5).abs() < 1e-5);
    }
}
