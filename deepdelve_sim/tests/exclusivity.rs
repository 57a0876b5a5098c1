// Task exclusivity under same-tick contention.
//
// Claim is a single-worker kind: creatures of one faction requesting in the
// same step never share a target. Dig allows several workers, bounded by
// three slots per wall face.

mod common;

use std::collections::BTreeSet;

use common::{ALPHA, BETA, sim_from_rows};
use deepdelve_sim::command::{SimAction, SimCommand};
use deepdelve_sim::task::TaskKind;
use deepdelve_sim::territory::MAX_DIGGERS_PER_FACE;
use deepdelve_sim::types::{Direction, FactionId, Species, TilePos};

fn spawn_many(faction: FactionId, species: Species, pos: TilePos, n: usize) -> Vec<SimCommand> {
    (0..n)
        .map(|_| SimCommand::new(faction, SimAction::SpawnCreature { species, pos }))
        .collect()
}

#[test]
fn claim_targets_are_unique_per_faction() {
    let mut sim = sim_from_rows(
        &[
            "#######", //
            "#.....#", //
            "#..A..#", //
            "#.....#", //
            "#######",
        ],
        3,
    );
    sim.step(&spawn_many(ALPHA, Species::Imp, TilePos::new(3, 2), 6), 0.1);

    let targets: Vec<TilePos> = sim
        .creatures
        .keys()
        .filter_map(|&id| sim.task_for(id))
        .map(|t| {
            assert_eq!(t.kind, TaskKind::Claim);
            t.target
        })
        .collect();
    // Only the four cardinal neighbors touch the territory.
    assert_eq!(targets.len(), 4);
    let unique: BTreeSet<_> = targets.iter().copied().collect();
    assert_eq!(unique.len(), targets.len());
}

#[test]
fn rival_factions_may_contest_the_same_tile() {
    // (1,1) touches both territories; the imps start two tiles from it.
    let mut sim = sim_from_rows(
        &[
            "AAA", //
            "#.#", //
            "BBB",
        ],
        3,
    );
    let mut commands = spawn_many(ALPHA, Species::Imp, TilePos::new(0, 0), 1);
    commands.extend(spawn_many(BETA, Species::Imp, TilePos::new(2, 2), 1));
    sim.step(&commands, 0.1);

    let targets: Vec<TilePos> = sim
        .creatures
        .keys()
        .filter_map(|&id| sim.task_for(id))
        .map(|t| t.target)
        .collect();
    assert_eq!(targets, vec![TilePos::new(1, 1), TilePos::new(1, 1)]);
}

#[test]
fn dig_face_never_exceeds_three_workers() {
    let mut sim = sim_from_rows(&["AA#"], 5);
    let wall = TilePos::new(2, 0);
    let mut commands = spawn_many(ALPHA, Species::Imp, TilePos::new(0, 0), 5);
    commands.push(SimCommand::new(ALPHA, SimAction::MarkDig { pos: wall }));
    sim.step(&commands, 0.1);

    let diggers = sim
        .creatures
        .keys()
        .filter(|&&id| sim.task_for(id).is_some_and(|t| t.kind == TaskKind::Dig))
        .count();
    assert_eq!(diggers, MAX_DIGGERS_PER_FACE);
    assert_eq!(
        sim.world.territory().face_occupancy(wall, Direction::West),
        MAX_DIGGERS_PER_FACE
    );

    // The slots stay capped while the three work.
    for _ in 0..20 {
        sim.step(&[], 0.1);
        assert!(sim.world.territory().face_occupancy(wall, Direction::West) <= MAX_DIGGERS_PER_FACE);
    }
}

#[test]
fn two_faces_admit_six() {
    let mut sim = sim_from_rows(
        &[
            "#.#", //
            "A#A", //
            "###",
        ],
        8,
    );
    let wall = TilePos::new(1, 1);
    let mut commands = spawn_many(ALPHA, Species::Imp, TilePos::new(0, 1), 4);
    commands.extend(spawn_many(ALPHA, Species::Imp, TilePos::new(2, 1), 4));
    commands.push(SimCommand::new(ALPHA, SimAction::MarkDig { pos: wall }));
    sim.step(&commands, 0.1);

    let territory = sim.world.territory();
    assert_eq!(territory.face_occupancy(wall, Direction::West), 3);
    assert_eq!(territory.face_occupancy(wall, Direction::East), 3);
    assert_eq!(territory.face_occupancy(wall, Direction::North), 0);
}
