// Navigation graph for creature pathfinding.
//
// Nodes are exactly the walkable tiles of the grid; each node links to its
// walkable cardinal neighbors with uniform cost. Storage is two dense
// `Vec`s indexed like the grid (`x + y * width`): a node-presence flag and a
// 4-bit link mask (`Direction::bit`). Links are always symmetric: bit `d` of
// tile `p` is set iff both `p` and `p.step(d)` are nodes.
//
// The graph is built once from the grid with `rebuild_graph()` (O(tiles))
// and then maintained incrementally: `on_tile_type_changed()` adds or removes
// one node and patches at most four neighbor masks, so digging and claiming
// never trigger a full rebuild. Because the incremental path and the full
// rebuild write the same representation, the two can be compared directly
// with `==` (see `tests/nav_equivalence.rs`).
//
// See also: `grid.rs` for the tiles this graph mirrors, `pathfinding.rs` for
// the searches run over it, `world.rs` which forwards every tile-type change
// here.
//
// **Critical constraint: determinism.** `neighbors()` yields N, E, S, W.

use crate::grid::{TileChange, TileGrid};
use crate::types::{Direction, TilePos};
use smallvec::SmallVec;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NavGraph {
    width: u32,
    height: u32,
    nodes: Vec<bool>,
    /// Per-tile link mask. Always 0 for non-nodes.
    links: Vec<u8>,
}

impl NavGraph {
    /// Build the graph for a grid from scratch.
    pub fn build(grid: &TileGrid) -> Self {
        let mut graph = Self::default();
        graph.rebuild_graph(grid);
        graph
    }

    /// Full reconstruction from the grid. Used after map load.
    pub fn rebuild_graph(&mut self, grid: &TileGrid) {
        self.width = grid.width();
        self.height = grid.height();
        self.nodes = grid.iter().map(|(_, t)| t.kind.is_walkable()).collect();
        self.links = vec![0; self.nodes.len()];

        for i in 0..self.nodes.len() {
            if !self.nodes[i] {
                continue;
            }
            let pos = self.pos_of(i);
            let mut mask = 0u8;
            for (dir, n) in pos.neighbors() {
                if self.has_node(n) {
                    mask |= dir.bit();
                }
            }
            self.links[i] = mask;
        }
    }

    pub(crate) fn index(&self, pos: TilePos) -> Option<usize> {
        let in_bounds =
            pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height;
        in_bounds.then(|| pos.x as usize + pos.y as usize * self.width as usize)
    }

    pub(crate) fn pos_of(&self, index: usize) -> TilePos {
        let w = self.width as usize;
        TilePos::new((index % w) as i32, (index / w) as i32)
    }

    pub fn has_node(&self, pos: TilePos) -> bool {
        self.index(pos).is_some_and(|i| self.nodes[i])
    }

    pub fn is_linked(&self, pos: TilePos, dir: Direction) -> bool {
        self.index(pos)
            .is_some_and(|i| self.links[i] & dir.bit() != 0)
    }

    /// Linked neighbors of `pos`, in N, E, S, W order.
    pub fn neighbors(&self, pos: TilePos) -> SmallVec<[TilePos; 4]> {
        let Some(i) = self.index(pos) else {
            return SmallVec::new();
        };
        let mask = self.links[i];
        pos.neighbors()
            .into_iter()
            .filter(|(dir, _)| mask & dir.bit() != 0)
            .map(|(_, n)| n)
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|&&n| n).count()
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        let directed: u32 = self.links.iter().map(|m| m.count_ones()).sum();
        directed as usize / 2
    }

    /// Number of tiles the graph covers (nodes or not).
    pub fn tile_count(&self) -> usize {
        self.nodes.len()
    }

    /// Add a node and link it to every neighbor that is already a node.
    /// Returns `false` if the position is out of bounds or already a node.
    pub fn add_node(&mut self, pos: TilePos) -> bool {
        let Some(i) = self.index(pos) else {
            return false;
        };
        if self.nodes[i] {
            return false;
        }
        self.nodes[i] = true;
        let mut mask = 0u8;
        for (dir, n) in pos.neighbors() {
            if let Some(ni) = self.index(n) {
                if self.nodes[ni] {
                    mask |= dir.bit();
                    self.links[ni] |= dir.opposite().bit();
                }
            }
        }
        self.links[i] = mask;
        true
    }

    /// Remove a node and every link touching it. Returns `false` if there
    /// was no node.
    pub fn remove_node(&mut self, pos: TilePos) -> bool {
        let Some(i) = self.index(pos) else {
            return false;
        };
        if !self.nodes[i] {
            return false;
        }
        self.nodes[i] = false;
        self.links[i] = 0;
        for (dir, n) in pos.neighbors() {
            if let Some(ni) = self.index(n) {
                self.links[ni] &= !dir.opposite().bit();
            }
        }
        true
    }

    /// Apply a tile-type change. Only walkability transitions touch the
    /// graph.
    pub fn on_tile_type_changed(&mut self, change: &TileChange) {
        match (change.old.is_walkable(), change.new.is_walkable()) {
            (false, true) => {
                self.add_node(change.pos);
            }
            (true, false) => {
                self.remove_node(change.pos);
            }
            _ => {}
        }
    }
}
