// Searches over the navigation graph.
//
// - `find_path`: A* with a Manhattan heuristic over uniform-cost cardinal
//   links. Scores and came-from data live in `Vec`s indexed like the grid,
//   and the open set is a `BinaryHeap` of `OpenEntry` with reversed
//   ordering (min-heap).
// - `find_path_in_territory`: the same A* restricted to nodes owned by one
//   faction. The restriction is a predicate applied during expansion, so the
//   graph itself is never modified.
// - `find_nearest_tile`: breadth-first search that expands only through
//   walkable tiles but tests every tile it touches (walls included) against
//   a predicate, with a hop cutoff. This is how workers find the nearest
//   marked wall or claimable floor.
// - `get_random_walkable_neighbor`: uniform choice among linked neighbors,
//   optionally restricted to one faction's tiles.
//
// Paths are returned as tile sequences including both endpoints. An empty
// `Vec` means "no path": either endpoint is not a node, the filter excludes
// an endpoint, or the two are disconnected.
//
// See also: `nav.rs` for the graph, `scheduler.rs` and `behavior.rs` for the
// callers.
//
// **Critical constraint: determinism.** Ties in the open set break on lower
// f, then higher g, then lower tile index, and neighbors expand in N, E, S,
// W order, so a query on an unchanged graph always returns the same path.
// Random choices draw only from the caller's seeded RNG.

use crate::grid::TileGrid;
use crate::nav::NavGraph;
use crate::types::{FactionId, TilePos};
use rand::Rng;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

/// Entry in the A* open set (min-heap via reversed ordering).
#[derive(Clone, Copy, PartialEq, Eq)]
struct OpenEntry {
    index: usize,
    f_score: u32,
    g_score: u32,
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed on f and index so the smallest pops first; deeper nodes
        // (larger g) win f ties.
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| self.g_score.cmp(&other.g_score))
            .then_with(|| other.index.cmp(&self.index))
    }
}

/// Shortest path from `from` to `to`, both inclusive. Empty if either
/// endpoint is not a node or no path exists.
pub fn find_path(graph: &NavGraph, from: TilePos, to: TilePos) -> Vec<TilePos> {
    astar(graph, from, to, |_| true)
}

/// Shortest path that only visits tiles owned by `faction` (endpoints
/// included).
pub fn find_path_in_territory(
    graph: &NavGraph,
    grid: &TileGrid,
    from: TilePos,
    to: TilePos,
    faction: FactionId,
) -> Vec<TilePos> {
    astar(graph, from, to, |p| grid.owner(p) == Some(faction))
}

fn astar(
    graph: &NavGraph,
    from: TilePos,
    to: TilePos,
    allowed: impl Fn(TilePos) -> bool,
) -> Vec<TilePos> {
    if !graph.has_node(from) || !graph.has_node(to) || !allowed(from) || !allowed(to) {
        return Vec::new();
    }
    let (Some(start), Some(goal)) = (graph.index(from), graph.index(to)) else {
        return Vec::new();
    };
    if start == goal {
        return vec![from];
    }

    let n = graph.tile_count();
    let mut g_score = vec![u32::MAX; n];
    let mut came_from: Vec<Option<usize>> = vec![None; n];
    let mut closed = vec![false; n];

    g_score[start] = 0;
    let mut open = BinaryHeap::new();
    open.push(OpenEntry {
        index: start,
        f_score: from.manhattan_distance(to),
        g_score: 0,
    });

    while let Some(current) = open.pop() {
        let ci = current.index;
        if ci == goal {
            return reconstruct_path(graph, &came_from, start, goal);
        }
        if closed[ci] {
            continue;
        }
        closed[ci] = true;

        let current_pos = graph.pos_of(ci);
        let tentative_g = g_score[ci] + 1;
        for neighbor in graph.neighbors(current_pos) {
            if !allowed(neighbor) {
                continue;
            }
            let Some(ni) = graph.index(neighbor) else {
                continue;
            };
            if closed[ni] || tentative_g >= g_score[ni] {
                continue;
            }
            g_score[ni] = tentative_g;
            came_from[ni] = Some(ci);
            open.push(OpenEntry {
                index: ni,
                f_score: tentative_g + neighbor.manhattan_distance(to),
                g_score: tentative_g,
            });
        }
    }

    Vec::new()
}

fn reconstruct_path(
    graph: &NavGraph,
    came_from: &[Option<usize>],
    start: usize,
    goal: usize,
) -> Vec<TilePos> {
    let mut path = vec![graph.pos_of(goal)];
    let mut current = goal;
    while current != start {
        match came_from[current] {
            Some(prev) => {
                path.push(graph.pos_of(prev));
                current = prev;
            }
            None => return Vec::new(),
        }
    }
    path.reverse();
    path
}

/// Breadth-first search from `from` for the nearest tile satisfying
/// `predicate`. Expands only through walkable tiles; tests every visited
/// in-bounds tile, walkable or not. Tiles more than `max_distance` hops away
/// are never visited.
pub fn find_nearest_tile(
    graph: &NavGraph,
    grid: &TileGrid,
    from: TilePos,
    mut predicate: impl FnMut(TilePos) -> bool,
    max_distance: u32,
) -> Option<TilePos> {
    if !grid.in_bounds(from) {
        return None;
    }
    if predicate(from) {
        return Some(from);
    }
    let mut visited = FxHashSet::default();
    visited.insert(from);
    let mut frontier = VecDeque::new();
    frontier.push_back((from, 0u32));

    while let Some((pos, hops)) = frontier.pop_front() {
        if hops >= max_distance || !graph.has_node(pos) {
            continue;
        }
        for (_, next) in pos.neighbors() {
            if !grid.in_bounds(next) || !visited.insert(next) {
                continue;
            }
            if predicate(next) {
                return Some(next);
            }
            frontier.push_back((next, hops + 1));
        }
    }
    None
}

/// Uniformly pick a linked neighbor of `pos`, optionally restricted to
/// tiles owned by `faction`. `None` if no neighbor qualifies.
pub fn get_random_walkable_neighbor<R: Rng>(
    graph: &NavGraph,
    grid: &TileGrid,
    pos: TilePos,
    faction: Option<FactionId>,
    rng: &mut R,
) -> Option<TilePos> {
    let candidates: SmallVec<[TilePos; 4]> = graph
        .neighbors(pos)
        .into_iter()
        .filter(|&n| faction.is_none_or(|f| grid.owner(n) == Some(f)))
        .collect();
    if candidates.is_empty() {
        return None;
    }
    Some(candidates[rng.gen_range(0..candidates.len())])
}
