//! Core types for the traffic simulation
//!
//! Identifiers, grid coordinates and the tunable constants shared by every agent.

use serde::{Deserialize, Serialize};

/// A unique identifier for simulation entities
/// This is a simple wrapper around a usize for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SimId(pub usize);

/// A wrapper type for car IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CarId(pub SimId);

/// A wrapper type for traffic light IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightId(pub SimId);

/// A wrapper type for gas station IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationId(pub SimId);

/// An integer cell coordinate on the grid
///
/// Serialized as a two element array `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance between two cells
    pub fn manhattan(&self, other: &Coord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Chebyshev distance between two cells (king moves)
    pub fn chebyshev(&self, other: &Coord) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }
}

impl From<[i32; 2]> for Coord {
    fn from([x, y]: [i32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Coord> for [i32; 2] {
    fn from(coord: Coord) -> Self {
        [coord.x, coord.y]
    }
}

impl From<(i32, i32)> for Coord {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Maximum fuel a car can hold
pub const FUEL_CAPACITY: i32 = 100;

/// Fuel added by one successful refuel
pub const REFUEL_AMOUNT: i32 = 50;

/// Below this level a fixed-route car heads into the next station on its route
pub const LOW_FUEL_THRESHOLD: i32 = 20;

/// Fuel level boundary between MEDIUM and HIGH for learning cars
pub const MEDIUM_FUEL_THRESHOLD: i32 = 50;

/// Range used for cars whose starting fuel is not configured
pub const RANDOM_FUEL_RANGE: std::ops::Range<i32> = 50..100;

/// Consecutive invalid ticks tolerated before a car is excluded
pub const INVALID_STEP_THRESHOLD: u32 = 3;

/// Default number of ticks a timer light holds each color
pub const DEFAULT_LIGHT_PERIOD: u32 = 3;

/// Default capacity of a standalone gas station
pub const DEFAULT_STATION_CAPACITY: u32 = 2;

/// Capacity of the station on the default loop route
pub const ROUTE_STATION_CAPACITY: u32 = 1;
