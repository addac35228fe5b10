//! Boundary edge set with seam cancellation.
//!
//! Every filled pixel contributes one unit edge per side that borders
//! something outside the region. Edges run so that filled space lies on the
//! right-hand side of travel (y down), which makes the edge two neighbouring
//! filled pixels would put on their shared side exact reverses of each
//! other. Adding the second one removes the first, so once a region has
//! been fully processed only its true outline (outer boundary plus holes)
//! remains.

use std::collections::HashMap;

use crate::geometry::{Direction, VecI};

/// Directed segment between two lattice corners.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub start: VecI,
    pub end: VecI,
}

impl Edge {
    pub const fn new(start: VecI, end: VecI) -> Self {
        Self { start, end }
    }

    pub fn reversed(self) -> Self {
        Self::new(self.end, self.start)
    }

    /// Direction of travel, `None` unless the edge is one unit long and
    /// axis-aligned.
    pub fn direction(&self) -> Option<Direction> {
        Direction::from_unit(self.end - self.start)
    }

    /// Edge on side `side` of `pixel`, oriented with the pixel on its right.
    pub fn pixel_side(pixel: VecI, side: Direction) -> (Edge, Direction) {
        let VecI { x, y } = pixel;
        let edge = match side {
            Direction::Up => Edge::new(VecI::new(x, y), VecI::new(x + 1, y)),
            Direction::Right => Edge::new(VecI::new(x + 1, y), VecI::new(x + 1, y + 1)),
            Direction::Down => Edge::new(VecI::new(x + 1, y + 1), VecI::new(x, y + 1)),
            Direction::Left => Edge::new(VecI::new(x, y + 1), VecI::new(x, y)),
        };
        (edge, side.turn_right())
    }
}

/// Counters kept while edges are added.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EdgeSetStats {
    pub added: usize,
    pub cancelled: usize,
    /// Same-direction edges that replaced an identical stored edge.
    pub duplicates: usize,
}

/// Unit edges indexed per direction by start corner.
///
/// Insert, cancel and lookup are O(1). Each direction also keeps the order
/// in which starts were inserted so [`EdgeSet::pop`] is amortized O(1) and
/// deterministic; entries whose edge has since been removed are skipped.
#[derive(Clone, Debug, Default)]
pub struct EdgeSet {
    maps: [HashMap<VecI, VecI>; 4],
    order: [Vec<VecI>; 4],
    stats: EdgeSetStats,
}

impl EdgeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `edge`, which must be a unit edge parallel or anti-parallel to
    /// `direction`; anti-parallel edges are flipped before storing.
    ///
    /// Returns false when the edge cancelled a stored reverse edge.
    ///
    /// # Panics
    /// If the edge does not run along `direction`. Callers build edges from
    /// pixel sides, so this indicates a bug rather than bad input.
    pub fn add(&mut self, edge: Edge, direction: Direction) -> bool {
        let edge = match edge.direction() {
            Some(d) if d == direction => edge,
            Some(d) if d == direction.opposite() => edge.reversed(),
            _ => panic!("boundary edge {edge:?} does not run along {direction:?}"),
        };

        let opposite = &mut self.maps[direction.opposite().index()];
        if opposite.get(&edge.end) == Some(&edge.start) {
            opposite.remove(&edge.end);
            self.stats.cancelled += 1;
            return false;
        }

        let index = direction.index();
        if self.maps[index].insert(edge.start, edge.end).is_some() {
            self.stats.duplicates += 1;
        } else {
            self.order[index].push(edge.start);
        }
        self.stats.added += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.maps.iter().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.iter().all(HashMap::is_empty)
    }

    pub fn stats(&self) -> EdgeSetStats {
        self.stats
    }

    pub fn contains(&self, edge: Edge) -> bool {
        edge.direction()
            .and_then(|d| self.maps[d.index()].get(&edge.start))
            .is_some_and(|end| *end == edge.end)
    }

    /// Remove and return the edge starting at `start` travelling `direction`.
    pub fn remove_at(&mut self, start: VecI, direction: Direction) -> Option<Edge> {
        self.maps[direction.index()]
            .remove(&start)
            .map(|end| Edge::new(start, end))
    }

    /// Remove the first edge starting at `start`, trying directions in
    /// `preference` order.
    pub fn remove_any_at(&mut self, start: VecI, preference: &[Direction]) -> Option<(Edge, Direction)> {
        preference
            .iter()
            .find_map(|&d| self.remove_at(start, d).map(|edge| (edge, d)))
    }

    /// Remove some edge. Directions are drained in `Direction::ALL` order,
    /// most recently inserted first.
    pub fn pop(&mut self) -> Option<(Edge, Direction)> {
        for direction in Direction::ALL {
            let index = direction.index();
            while let Some(start) = self.order[index].pop() {
                if let Some(end) = self.maps[index].remove(&start) {
                    return Some((Edge::new(start, end), direction));
                }
            }
        }
        None
    }

    /// Stored edges with their direction, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (Edge, Direction)> + '_ {
        Direction::ALL.into_iter().flat_map(move |d| {
            self.maps[d.index()]
                .iter()
                .map(move |(start, end)| (Edge::new(*start, *end), d))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_pixel(set: &mut EdgeSet, x: i32, y: i32) {
        for side in Direction::ALL {
            let (edge, dir) = Edge::pixel_side(VecI::new(x, y), side);
            set.add(edge, dir);
        }
    }

    #[test]
    fn test_single_pixel_has_four_edges() {
        let mut set = EdgeSet::new();
        add_pixel(&mut set, 3, 4);
        assert_eq!(set.len(), 4);
        assert!(set.contains(Edge::new(VecI::new(3, 4), VecI::new(4, 4))));
        assert!(set.contains(Edge::new(VecI::new(3, 5), VecI::new(3, 4))));
    }

    #[test]
    fn test_adjacent_pixels_cancel_shared_side() {
        let mut set = EdgeSet::new();
        add_pixel(&mut set, 0, 0);
        add_pixel(&mut set, 1, 0);
        assert_eq!(set.len(), 6);
        assert_eq!(set.stats().cancelled, 1);
        // the shared side at x = 1 is gone in both directions
        assert!(!set.contains(Edge::new(VecI::new(1, 0), VecI::new(1, 1))));
        assert!(!set.contains(Edge::new(VecI::new(1, 1), VecI::new(1, 0))));
    }

    #[test]
    fn test_two_by_two_block_keeps_perimeter_only() {
        let mut set = EdgeSet::new();
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            add_pixel(&mut set, x, y);
        }
        assert_eq!(set.len(), 8);
        assert_eq!(set.stats().cancelled, 4);
        assert_eq!(set.stats().duplicates, 0);
        assert!(set.iter().all(|(edge, dir)| edge.direction() == Some(dir)));
    }

    #[test]
    fn test_collinear_neighbours_do_not_duplicate() {
        // a 3x1 row: top and bottom sides are collinear but distinct edges
        let mut set = EdgeSet::new();
        for x in 0..3 {
            add_pixel(&mut set, x, 0);
        }
        assert_eq!(set.len(), 8);
        assert_eq!(set.stats().duplicates, 0);
        let rightward = set.iter().filter(|(_, d)| *d == Direction::Right).count();
        assert_eq!(rightward, 3);
    }

    #[test]
    fn test_anti_parallel_edge_is_flipped() {
        let mut set = EdgeSet::new();
        let edge = Edge::new(VecI::new(1, 0), VecI::new(0, 0));
        assert!(set.add(edge, Direction::Right));
        assert!(set.contains(Edge::new(VecI::new(0, 0), VecI::new(1, 0))));
    }

    #[test]
    #[should_panic(expected = "does not run along")]
    fn test_perpendicular_edge_panics() {
        let mut set = EdgeSet::new();
        set.add(Edge::new(VecI::new(0, 0), VecI::new(0, 1)), Direction::Right);
    }

    #[test]
    #[should_panic(expected = "does not run along")]
    fn test_long_edge_panics() {
        let mut set = EdgeSet::new();
        set.add(Edge::new(VecI::new(0, 0), VecI::new(2, 0)), Direction::Right);
    }

    #[test]
    fn test_pop_drains_everything_once() {
        let mut set = EdgeSet::new();
        add_pixel(&mut set, 0, 0);
        add_pixel(&mut set, 5, 5);
        let mut popped = Vec::new();
        while let Some((edge, dir)) = set.pop() {
            assert_eq!(edge.direction(), Some(dir));
            popped.push(edge);
        }
        assert_eq!(popped.len(), 8);
        assert!(set.is_empty());
    }

    #[test]
    fn test_pop_skips_removed_entries() {
        let mut set = EdgeSet::new();
        add_pixel(&mut set, 0, 0);
        assert!(set.remove_at(VecI::new(0, 0), Direction::Right).is_some());
        // cancel the left side, then add it back
        set.add(Edge::new(VecI::new(0, 0), VecI::new(0, 1)), Direction::Down);
        set.add(Edge::new(VecI::new(0, 1), VecI::new(0, 0)), Direction::Up);
        let mut count = 0;
        while set.pop().is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn test_remove_any_at_respects_preference() {
        let mut set = EdgeSet::new();
        set.add(Edge::new(VecI::new(0, 0), VecI::new(1, 0)), Direction::Right);
        set.add(Edge::new(VecI::new(0, 0), VecI::new(0, 1)), Direction::Down);
        let (_, dir) = set
            .remove_any_at(VecI::ZERO, &[Direction::Down, Direction::Right])
            .unwrap();
        assert_eq!(dir, Direction::Down);
        assert_eq!(set.len(), 1);
    }
}
