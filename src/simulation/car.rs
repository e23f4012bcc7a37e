//! Car movement logic for the traffic simulation
//!
//! A car either follows its fixed route (obeying lights, queueing for fuel and
//! yielding to occupied cells) or is driven by its own Q-learning policy.
//! Both behaviors share the same lifecycle: placement, one unit of fuel per
//! tick, and permanent exclusion once the tank runs dry.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::gas_station::{SimGasStation, StationStatus};
use super::grid::SimGrid;
use super::policy::{PolicyParams, QPolicy};
use super::route::{Route, RouteProgress};
use super::traffic_light::SimTrafficLight;
use super::types::{
    CarId, Coord, LightId, StationId, FUEL_CAPACITY, LOW_FUEL_THRESHOLD, MEDIUM_FUEL_THRESHOLD,
    REFUEL_AMOUNT,
};

/// Lifecycle state of a car
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CarState {
    Waiting,
    Moving,
    Refueling,
    Inactive,
}

/// Discretized fuel level used as part of a learning car's state key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FuelLevel {
    Low,
    Medium,
    High,
}

impl FuelLevel {
    pub fn from_fuel(fuel: i32) -> Self {
        if fuel < LOW_FUEL_THRESHOLD {
            FuelLevel::Low
        } else if fuel < MEDIUM_FUEL_THRESHOLD {
            FuelLevel::Medium
        } else {
            FuelLevel::High
        }
    }
}

/// State key of the car policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CarStateKey {
    pub fuel: FuelLevel,
    pub station: StationStatus,
}

/// Actions available to a learning car
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CarAction {
    Wait,
    GoToNearest,
    FindAnother,
}

impl CarAction {
    pub const ALL: [CarAction; 3] = [CarAction::Wait, CarAction::GoToNearest, CarAction::FindAnother];

    /// Fuel burned on top of the per-tick unit
    pub fn extra_cost(self) -> i32 {
        match self {
            CarAction::Wait => 0,
            CarAction::GoToNearest => 4,
            CarAction::FindAnother => 2,
        }
    }
}

pub const REWARD_PRODUCTIVE: f64 = 3.0;
pub const REWARD_IDLE: f64 = -2.0;
pub const REWARD_EXHAUSTED: f64 = -5.0;

/// How a car picks its moves
#[derive(Debug, Clone)]
pub enum CarBehavior {
    FixedRoute,
    Learning(QPolicy<CarStateKey, CarAction>),
}

impl CarBehavior {
    pub fn learning(params: PolicyParams) -> Self {
        CarBehavior::Learning(QPolicy::new(params))
    }

    pub fn is_learning(&self) -> bool {
        matches!(self, CarBehavior::Learning(_))
    }
}

/// Result of a car update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarUpdateResult {
    /// Car is not active yet or already excluded
    Skipped,
    Continue,
    /// Fuel ran out this tick
    Exhausted,
    /// Too many consecutive invalid ticks
    Failed,
}

/// Everything a car may touch while updating
pub struct CarContext<'a, R: ?Sized> {
    pub grid: &'a mut SimGrid,
    pub lights: &'a BTreeMap<LightId, SimTrafficLight>,
    pub stations: &'a mut BTreeMap<StationId, SimGasStation>,
    pub rng: &'a mut R,
    pub invalid_step_threshold: u32,
}

/// A car in the traffic simulation
#[derive(Debug, Clone)]
pub struct SimCar {
    pub id: CarId,
    pub route: Route,
    progress: RouteProgress,
    pub fuel: i32,
    pub state: CarState,
    /// Set once the activation schedule lets the car in
    pub active: bool,
    invalid_steps: u32,
    placed_once: bool,
    /// Station slot kept from the first refuel until the tank is full
    held_station: Option<StationId>,
    behavior: CarBehavior,
}

fn set_state(id: CarId, state: &mut CarState, next: CarState) {
    if *state != next {
        debug!("Car {:?}: {:?} -> {:?}", id.0 .0, state, next);
        *state = next;
    }
}

fn release_slot(held: &mut Option<StationId>, stations: &mut BTreeMap<StationId, SimGasStation>) {
    if let Some(station) = held.take().and_then(|id| stations.get_mut(&id)) {
        station.release();
    }
}

/// Refuel one step at `station`, taking a slot first if the car holds none
///
/// Returns true when fuel went up. A full tank gives the slot back.
fn pump(id: CarId, fuel: &mut i32, held: &mut Option<StationId>, station: &mut SimGasStation) -> bool {
    if *fuel >= FUEL_CAPACITY {
        if *held == Some(station.id) {
            *held = None;
            station.release();
        }
        return false;
    }

    if *held == Some(station.id) {
        station.hold();
    } else if station.acquire() {
        *held = Some(station.id);
    } else {
        debug!("Car {:?} waiting for a free slot at station {:?}", id.0 .0, station.id.0);
        return false;
    }

    *fuel = (*fuel + REFUEL_AMOUNT).min(FUEL_CAPACITY);
    if *fuel >= FUEL_CAPACITY {
        *held = None;
        station.release();
    }
    true
}

/// Station a fixed-route car can pump at: the one under it, or the one its
/// route enters next when that cell is adjacent
fn pump_in_reach(
    stations: &mut BTreeMap<StationId, SimGasStation>,
    position: Coord,
    next_cell: Coord,
) -> Option<&mut SimGasStation> {
    let queued = next_cell.chebyshev(&position) <= 1;
    stations
        .values_mut()
        .find(|s| s.position == position || (queued && s.position == next_cell))
}

impl SimCar {
    pub fn new(id: CarId, route: Route, fuel: i32, behavior: CarBehavior) -> Self {
        let progress = RouteProgress::new(&route);
        Self {
            id,
            route,
            progress,
            fuel,
            state: CarState::Moving,
            active: false,
            invalid_steps: 0,
            placed_once: false,
            held_station: None,
            behavior,
        }
    }

    pub fn route_index(&self) -> usize {
        self.progress.index()
    }

    pub fn remaining_route_indices(&self) -> Vec<usize> {
        self.progress.remaining()
    }

    /// Next waypoint on the fixed route
    pub fn next_cell(&self) -> Coord {
        self.progress.next_cell(&self.route)
    }

    pub fn invalid_steps(&self) -> u32 {
        self.invalid_steps
    }

    pub fn behavior(&self) -> &CarBehavior {
        &self.behavior
    }

    /// Whether the car belongs in external snapshots
    pub fn is_visible(&self, invalid_step_threshold: u32) -> bool {
        self.active && self.state != CarState::Inactive && self.invalid_steps <= invalid_step_threshold
    }

    pub fn activate(&mut self) {
        if !self.active {
            self.active = true;
            info!("Car {:?} activated", self.id.0 .0);
        }
    }

    /// Station whose slot the car currently holds
    pub fn held_station(&self) -> Option<StationId> {
        self.held_station
    }

    fn exclude(&mut self, grid: &mut SimGrid, stations: &mut BTreeMap<StationId, SimGasStation>) {
        set_state(self.id, &mut self.state, CarState::Inactive);
        self.release_slot(stations);
        grid.remove(self.id);
    }

    fn release_slot(&mut self, stations: &mut BTreeMap<StationId, SimGasStation>) {
        release_slot(&mut self.held_station, stations);
    }

    /// Make sure the car is on the grid, re-placing it at the route start if needed
    ///
    /// Returns the car's cell, or `None` when it could not be placed this tick.
    fn ensure_placed(&mut self, grid: &mut SimGrid) -> Option<Coord> {
        if let Some(position) = grid.position_of(self.id) {
            self.invalid_steps = 0;
            return Some(position);
        }

        if self.placed_once {
            self.invalid_steps += 1;
            warn!(
                "Car {:?} missing from grid (invalid step {}), re-placing at route start",
                self.id.0 .0, self.invalid_steps
            );
        }

        let start = self.route.start();
        match grid.place(self.id, start) {
            Ok(()) => {
                self.placed_once = true;
                self.progress.reset(&self.route);
                Some(start)
            }
            Err(e) => {
                debug!("Car {:?} could not enter the grid: {}", self.id.0 .0, e);
                None
            }
        }
    }

    /// Advance the car by one tick
    pub fn update<R: Rng + ?Sized>(&mut self, ctx: &mut CarContext<'_, R>) -> CarUpdateResult {
        if !self.active || self.state == CarState::Inactive {
            return CarUpdateResult::Skipped;
        }

        if ctx.grid.position_of(self.id).is_none() {
            self.release_slot(ctx.stations);
        }
        let placed = self.ensure_placed(ctx.grid);
        if self.invalid_steps > ctx.invalid_step_threshold {
            warn!(
                "Car {:?} excluded after {} invalid steps",
                self.id.0 .0, self.invalid_steps
            );
            self.exclude(ctx.grid, ctx.stations);
            return CarUpdateResult::Failed;
        }
        let Some(position) = placed else {
            return CarUpdateResult::Continue;
        };

        self.fuel -= 1;
        if self.fuel <= 0 {
            info!("Car {:?} ran out of fuel at ({}, {})", self.id.0 .0, position.x, position.y);
            self.exclude(ctx.grid, ctx.stations);
            return CarUpdateResult::Exhausted;
        }

        if self.state == CarState::Waiting {
            set_state(self.id, &mut self.state, CarState::Moving);
        }

        if self.behavior.is_learning() {
            self.learning_step(position, ctx)
        } else {
            self.follow_route(position, ctx);
            CarUpdateResult::Continue
        }
    }

    fn follow_route<R: Rng + ?Sized>(&mut self, position: Coord, ctx: &mut CarContext<'_, R>) {
        let next_cell = self.next_cell();

        if self.state == CarState::Refueling {
            if let Some(station) = pump_in_reach(ctx.stations, position, next_cell) {
                pump(self.id, &mut self.fuel, &mut self.held_station, station);
                if self.fuel >= FUEL_CAPACITY {
                    set_state(self.id, &mut self.state, CarState::Moving);
                }
                // stays put until full, or until a slot frees up
                if self.state == CarState::Refueling {
                    return;
                }
            }
        }

        if ctx
            .lights
            .values()
            .any(|light| light.position == next_cell && light.is_red())
        {
            set_state(self.id, &mut self.state, CarState::Waiting);
            return;
        }

        if self.fuel < LOW_FUEL_THRESHOLD && ctx.stations.values().any(|s| s.position == next_cell) {
            set_state(self.id, &mut self.state, CarState::Refueling);
        }

        if let Some(other) = ctx.grid.occupant(next_cell) {
            if other != self.id {
                return;
            }
        }

        match ctx.grid.move_to(self.id, next_cell) {
            Ok(()) => self.progress.advance(&self.route),
            Err(e) => warn!("Car {:?} failed to move: {}", self.id.0 .0, e),
        }
    }

    fn learning_step<R: Rng + ?Sized>(&mut self, position: Coord, ctx: &mut CarContext<'_, R>) -> CarUpdateResult {
        let CarBehavior::Learning(policy) = &mut self.behavior else {
            return CarUpdateResult::Continue;
        };

        let key = observe(self.fuel, position, ctx.stations);
        let action = policy
            .choose_action(&key, &CarAction::ALL, ctx.rng)
            .unwrap_or(CarAction::Wait);
        self.fuel -= action.extra_cost();

        let target = match action {
            CarAction::Wait => None,
            CarAction::GoToNearest => nearest_station(position, ctx.stations),
            CarAction::FindAnother => alternate_station(position, ctx.stations),
        };

        let mut productive = false;
        let mut pumping = false;
        if self.fuel > 0 {
            if let Some(target_id) = target {
                productive = match ctx.stations.get_mut(&target_id) {
                    Some(station) if station.position == position => {
                        pumping = true;
                        let refueled = pump(self.id, &mut self.fuel, &mut self.held_station, station);
                        if refueled {
                            set_state(self.id, &mut self.state, CarState::Refueling);
                        }
                        refueled
                    }
                    Some(station) => {
                        let goal = station.position;
                        let moved = step_toward(self.id, position, goal, ctx.grid);
                        if moved {
                            set_state(self.id, &mut self.state, CarState::Moving);
                        }
                        moved
                    }
                    None => false,
                };
            } else {
                set_state(self.id, &mut self.state, CarState::Waiting);
            }
        }

        if !pumping {
            release_slot(&mut self.held_station, ctx.stations);
        }

        let reward = if self.fuel <= 0 {
            REWARD_EXHAUSTED
        } else if productive {
            REWARD_PRODUCTIVE
        } else {
            REWARD_IDLE
        };
        let new_position = ctx.grid.position_of(self.id).unwrap_or(position);
        let next_key = observe(self.fuel, new_position, ctx.stations);
        policy.update(&key, action, reward, &next_key, &CarAction::ALL);

        if self.fuel <= 0 {
            info!(
                "Car {:?} ran out of fuel after {:?}",
                self.id.0 .0, action
            );
            self.exclude(ctx.grid, ctx.stations);
            return CarUpdateResult::Exhausted;
        }
        CarUpdateResult::Continue
    }
}

/// Build the policy state key for a car at `position`
pub fn observe(fuel: i32, position: Coord, stations: &BTreeMap<StationId, SimGasStation>) -> CarStateKey {
    let station = stations
        .values()
        .find(|s| s.position.chebyshev(&position) <= 1)
        .map(SimGasStation::status)
        .unwrap_or(StationStatus::NoStation);
    CarStateKey {
        fuel: FuelLevel::from_fuel(fuel),
        station,
    }
}

fn stations_by_distance(position: Coord, stations: &BTreeMap<StationId, SimGasStation>) -> Vec<&SimGasStation> {
    let mut sorted: Vec<&SimGasStation> = stations.values().collect();
    sorted.sort_by_key(|s| s.position.manhattan(&position));
    sorted
}

pub fn nearest_station(position: Coord, stations: &BTreeMap<StationId, SimGasStation>) -> Option<StationId> {
    stations_by_distance(position, stations).first().map(|s| s.id)
}

/// The closest free station other than the nearest one, falling back to the nearest
pub fn alternate_station(position: Coord, stations: &BTreeMap<StationId, SimGasStation>) -> Option<StationId> {
    let sorted = stations_by_distance(position, stations);
    sorted
        .iter()
        .skip(1)
        .find(|s| s.status() == StationStatus::Free)
        .or_else(|| sorted.first())
        .map(|s| s.id)
}

/// Move one cell closer to `goal` if a free neighboring cell allows it
fn step_toward(id: CarId, position: Coord, goal: Coord, grid: &mut SimGrid) -> bool {
    let current = position.manhattan(&goal);
    let best = grid
        .neighbors(position, 1)
        .into_iter()
        .filter(|cell| !grid.occupied(*cell))
        .filter(|cell| cell.manhattan(&goal) < current)
        .min_by_key(|cell| cell.manhattan(&goal));

    match best {
        Some(cell) => match grid.move_to(id, cell) {
            Ok(()) => true,
            Err(e) => {
                warn!("Car {:?} failed to move: {}", id.0 .0, e);
                false
            }
        },
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::types::SimId;

    fn station(capacity: u32) -> SimGasStation {
        SimGasStation::new(StationId(SimId(9)), Coord::new(0, 0), capacity)
    }

    #[test]
    fn full_tank_does_not_count_as_refuel() {
        let mut station = station(1);
        let mut fuel = FUEL_CAPACITY;
        let mut held = None;
        assert!(!pump(CarId(SimId(0)), &mut fuel, &mut held, &mut station));
        assert_eq!(fuel, FUEL_CAPACITY);
        assert_eq!(held, None);
        assert_eq!(station.occupancy(), 0);
    }

    #[test]
    fn slot_is_held_until_tank_is_full() {
        let mut station = station(1);
        let mut fuel = 10;
        let mut held = None;
        assert!(pump(CarId(SimId(0)), &mut fuel, &mut held, &mut station));
        assert_eq!((fuel, held), (60, Some(station.id)));
        station.tick_decay();
        assert_eq!(station.occupancy(), 1);

        let mut other_fuel = 10;
        let mut other_held = None;
        assert!(!pump(CarId(SimId(1)), &mut other_fuel, &mut other_held, &mut station));
        assert_eq!(other_fuel, 10);

        assert!(pump(CarId(SimId(0)), &mut fuel, &mut held, &mut station));
        assert_eq!((fuel, held), (100, None));
        assert_eq!(station.occupancy(), 0);
    }
}
