//! Gas station logic for the traffic simulation
//!
//! A station is a capacity-limited resource. A car acquires a slot when it
//! starts refueling, holds it on every following tick and releases it once
//! full. Slots nobody held during a tick drain away one per tick.

use log::debug;

use super::types::{Coord, StationId};

/// Availability of a station as seen by a learning car
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StationStatus {
    Free,
    Busy,
    NoStation,
}

/// A gas station in the simulation
#[derive(Debug, Clone)]
pub struct SimGasStation {
    pub id: StationId,
    pub position: Coord,
    capacity: u32,
    occupancy: u32,
    /// Slots acquired or held during the current tick
    claimed: u32,
}

impl SimGasStation {
    pub fn new(id: StationId, position: Coord, capacity: u32) -> Self {
        Self {
            id,
            position,
            capacity,
            occupancy: 0,
            claimed: 0,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn occupancy(&self) -> u32 {
        self.occupancy
    }

    pub fn status(&self) -> StationStatus {
        if self.occupancy < self.capacity {
            StationStatus::Free
        } else {
            StationStatus::Busy
        }
    }

    /// Take a refuel slot. Fails without side effect when full.
    pub fn acquire(&mut self) -> bool {
        if self.occupancy < self.capacity {
            self.occupancy += 1;
            self.claimed += 1;
            debug!(
                "Station {:?} slot acquired ({}/{})",
                self.id.0, self.occupancy, self.capacity
            );
            true
        } else {
            false
        }
    }

    /// Keep an already acquired slot for this tick
    pub fn hold(&mut self) {
        self.claimed = (self.claimed + 1).min(self.occupancy);
    }

    /// Give a slot back, never going below zero
    pub fn release(&mut self) {
        self.occupancy = self.occupancy.saturating_sub(1);
        self.claimed = self.claimed.min(self.occupancy);
        debug!(
            "Station {:?} slot released ({}/{})",
            self.id.0, self.occupancy, self.capacity
        );
    }

    /// Reclaim one slot that no car held this tick
    pub fn tick_decay(&mut self) {
        if self.occupancy > self.claimed {
            self.occupancy -= 1;
            debug!(
                "Station {:?} abandoned slot reclaimed ({}/{})",
                self.id.0, self.occupancy, self.capacity
            );
        }
        self.claimed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::types::SimId;

    #[test]
    fn acquire_respects_capacity() {
        let mut station = SimGasStation::new(StationId(SimId(0)), Coord::new(0, 0), 2);
        assert!(station.acquire());
        assert!(station.acquire());
        assert_eq!(station.status(), StationStatus::Busy);
        assert!(!station.acquire());
        assert_eq!(station.occupancy(), 2);
    }

    #[test]
    fn release_and_decay_floor_at_zero() {
        let mut station = SimGasStation::new(StationId(SimId(0)), Coord::new(0, 0), 1);
        station.release();
        station.tick_decay();
        assert_eq!(station.occupancy(), 0);
        assert!(station.acquire());
        station.tick_decay();
        assert_eq!(station.occupancy(), 1);
        // nobody holds the slot on the next tick
        station.tick_decay();
        assert_eq!(station.occupancy(), 0);
        assert_eq!(station.status(), StationStatus::Free);
    }

    #[test]
    fn held_slots_survive_decay() {
        let mut station = SimGasStation::new(StationId(SimId(0)), Coord::new(0, 0), 2);
        assert!(station.acquire());
        assert!(station.acquire());
        station.tick_decay();

        station.hold();
        station.tick_decay();
        assert_eq!(station.occupancy(), 1);

        station.hold();
        station.release();
        station.tick_decay();
        assert_eq!(station.occupancy(), 0);
    }
}
