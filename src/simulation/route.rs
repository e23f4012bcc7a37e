//! Fixed cyclic routes and the per-car path buffer

use std::collections::VecDeque;

use anyhow::{bail, Result};

use super::types::Coord;

/// An ordered, looping sequence of waypoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    waypoints: Vec<Coord>,
}

impl Route {
    /// Build a route. An empty route is a configuration error.
    pub fn new(waypoints: Vec<Coord>) -> Result<Self> {
        if waypoints.is_empty() {
            bail!("Route must contain at least one waypoint");
        }
        Ok(Self { waypoints })
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Always false, kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn start(&self) -> Coord {
        self.waypoints[0]
    }

    /// Waypoint at `index`, wrapping modulo the route length
    pub fn waypoint(&self, index: usize) -> Coord {
        self.waypoints[index % self.waypoints.len()]
    }

    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.waypoints.len()
    }

    pub fn waypoints(&self) -> &[Coord] {
        &self.waypoints
    }
}

/// Route progress of one car
///
/// `index` is the waypoint the car last reached. `remaining` holds the indices
/// still to visit on the current lap; its front is always the next waypoint.
#[derive(Debug, Clone)]
pub struct RouteProgress {
    index: usize,
    remaining: VecDeque<usize>,
}

impl RouteProgress {
    pub fn new(route: &Route) -> Self {
        let mut progress = Self {
            index: 0,
            remaining: VecDeque::new(),
        };
        progress.reset(route);
        progress
    }

    /// Back to the route start, e.g. after a recovery placement
    pub fn reset(&mut self, route: &Route) {
        self.index = 0;
        self.remaining = (1..route.len()).collect();
        self.refill_if_empty(route);
    }

    fn refill_if_empty(&mut self, route: &Route) {
        if self.remaining.is_empty() {
            self.remaining = (0..route.len()).collect();
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Index of the next waypoint not yet visited
    pub fn next_index(&self, route: &Route) -> usize {
        self.remaining
            .front()
            .copied()
            .unwrap_or_else(|| route.next_index(self.index))
    }

    pub fn next_cell(&self, route: &Route) -> Coord {
        route.waypoint(self.next_index(route))
    }

    /// Record arrival at the next waypoint
    pub fn advance(&mut self, route: &Route) {
        self.index = route.next_index(self.index);
        self.remaining.pop_front();
        self.refill_if_empty(route);
    }

    pub fn remaining(&self) -> Vec<usize> {
        self.remaining.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: i32) -> Route {
        Route::new((0..n).map(|y| Coord::new(0, y)).collect()).unwrap()
    }

    #[test]
    fn empty_route_is_rejected() {
        assert!(Route::new(Vec::new()).is_err());
    }

    #[test]
    fn index_wraps_after_last_waypoint() {
        let route = line(3);
        let mut progress = RouteProgress::new(&route);
        let mut seen = vec![progress.index()];
        for _ in 0..6 {
            assert_eq!(progress.next_index(&route), route.next_index(progress.index()));
            progress.advance(&route);
            seen.push(progress.index());
        }
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn remaining_buffer_tracks_the_lap() {
        let route = line(3);
        let mut progress = RouteProgress::new(&route);
        assert_eq!(progress.remaining(), vec![1, 2]);
        progress.advance(&route);
        assert_eq!(progress.remaining(), vec![2]);
        progress.advance(&route);
        assert_eq!(progress.remaining(), vec![0, 1, 2]);
        progress.advance(&route);
        assert_eq!(progress.remaining(), vec![1, 2]);
    }

    #[test]
    fn single_waypoint_route_points_at_itself() {
        let route = line(1);
        let mut progress = RouteProgress::new(&route);
        assert_eq!(progress.next_cell(&route), Coord::new(0, 0));
        progress.advance(&route);
        assert_eq!(progress.index(), 0);
        assert_eq!(progress.remaining(), vec![0]);
    }
}
