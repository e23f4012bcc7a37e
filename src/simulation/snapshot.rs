//! Externally visible state returned after every step

use serde::{Deserialize, Serialize};

use super::car::{CarState, SimCar};
use super::types::Coord;

/// One car as reported to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarRecord {
    pub id: usize,
    /// `None` while the car is not placed on the grid
    pub position: Option<Coord>,
    pub state: CarState,
    pub fuel: i32,
    pub route_index: usize,
    pub remaining_route_indices: Vec<usize>,
}

impl CarRecord {
    pub fn from_car(car: &SimCar, position: Option<Coord>) -> Self {
        Self {
            id: car.id.0 .0,
            position,
            state: car.state,
            fuel: car.fuel,
            route_index: car.route_index(),
            remaining_route_indices: car.remaining_route_indices(),
        }
    }
}

/// Visible cars in ascending id order
///
/// Serializes as a plain JSON array. Cars that are not listed are simply not
/// visible right now.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(pub Vec<CarRecord>);

impl Snapshot {
    pub fn cars(&self) -> &[CarRecord] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&CarRecord> {
        self.0.iter().find(|record| record.id == id)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
