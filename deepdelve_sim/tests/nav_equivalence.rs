// Incremental nav maintenance must match a full rebuild.
//
// Drives seeded random sequences of tile-type mutations through
// `World::set_tile_type` (which patches the nav graph in place) and checks
// after every mutation that the maintained graph equals
// `NavGraph::build()` over the resulting grid. Also checks that paths
// found on the maintained graph are valid walks.

mod common;

use common::world_from_rows;
use deepdelve_sim::event::EventSink;
use deepdelve_sim::nav::NavGraph;
use deepdelve_sim::pathfinding;
use deepdelve_sim::types::{TilePos, TileType};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const TYPES: [TileType; 4] = [TileType::Rock, TileType::Wall, TileType::Floor, TileType::Claimed];

fn random_rows(rng: &mut ChaCha8Rng, width: usize, height: usize) -> Vec<String> {
    (0..height)
        .map(|_| {
            (0..width)
                .map(|_| match rng.gen_range(0..4) {
                    0 => 'R',
                    1 => '#',
                    2 => '.',
                    _ => 'A',
                })
                .collect()
        })
        .collect()
}

#[test]
fn incremental_updates_match_rebuild() {
    for seed in 0..16u64 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let (w, h) = (rng.gen_range(1..12), rng.gen_range(1..12));
        let rows = random_rows(&mut rng, w, h);
        let row_refs: Vec<&str> = rows.iter().map(String::as_str).collect();
        let mut world = world_from_rows(&row_refs);
        let mut events = EventSink::new(0);

        for step in 0..200 {
            let pos = TilePos::new(rng.gen_range(0..w as i32), rng.gen_range(0..h as i32));
            let kind = TYPES[rng.gen_range(0..TYPES.len())];
            world.set_tile_type(pos, kind, &mut events);
            let rebuilt = NavGraph::build(world.grid());
            assert_eq!(
                world.nav(),
                &rebuilt,
                "seed {seed} step {step}: diverged after setting {pos:?} to {kind:?}"
            );
        }
    }
}

#[test]
fn out_of_bounds_mutations_change_nothing() {
    let mut world = world_from_rows(&["A.#", "..."]);
    let before = world.nav().clone();
    let mut events = EventSink::new(0);
    assert!(!world.set_tile_type(TilePos::new(-1, 0), TileType::Floor, &mut events));
    assert!(!world.set_tile_type(TilePos::new(3, 1), TileType::Floor, &mut events));
    assert_eq!(world.nav(), &before);
    assert!(events.is_empty());
}

#[test]
fn paths_on_the_maintained_graph_are_walkable() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let rows = random_rows(&mut rng, 16, 16);
    let row_refs: Vec<&str> = rows.iter().map(String::as_str).collect();
    let mut world = world_from_rows(&row_refs);
    let mut events = EventSink::new(0);

    for _ in 0..300 {
        let pos = TilePos::new(rng.gen_range(0..16), rng.gen_range(0..16));
        world.set_tile_type(pos, TYPES[rng.gen_range(0..TYPES.len())], &mut events);

        let from = TilePos::new(rng.gen_range(0..16), rng.gen_range(0..16));
        let to = TilePos::new(rng.gen_range(0..16), rng.gen_range(0..16));
        let path = pathfinding::find_path(world.nav(), from, to);
        if path.is_empty() {
            continue;
        }
        assert_eq!(path.first(), Some(&from));
        assert_eq!(path.last(), Some(&to));
        for pair in path.windows(2) {
            assert_eq!(pair[0].manhattan_distance(pair[1]), 1);
        }
        assert!(path.iter().all(|&p| world.grid().is_walkable(p)));
        // Every step moves one tile.
        assert!(path.len() as u32 > from.manhattan_distance(to));
    }
}
