//! Main simulation world that ties everything together
//!
//! `SimWorld` owns the grid and every agent, and advances them one tick at a
//! time in a fixed order: lights, then cars in ascending id order, then
//! stations. Cars earlier in that order win contested cells; nothing
//! compensates the cars that lose.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::car::{CarBehavior, CarContext, CarState, CarUpdateResult, SimCar};
use super::config::{CarBehaviorKind, LightControllerKind, SimConfig};
use super::gas_station::SimGasStation;
use super::grid::SimGrid;
use super::policy::PolicyParams;
use super::route::Route;
use super::snapshot::{CarRecord, Snapshot};
use super::traffic_light::{LightContext, LightController, LightState, SimTrafficLight};
use super::types::{
    CarId, Coord, LightId, SimId, StationId, INVALID_STEP_THRESHOLD, RANDOM_FUEL_RANGE,
};

/// Running totals kept across ticks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimStats {
    pub cars_activated: usize,
    pub cars_exhausted: usize,
    pub cars_failed: usize,
}

/// The main simulation world
pub struct SimWorld {
    /// Car occupancy
    pub grid: SimGrid,

    /// All cars, iterated in ascending id order
    pub cars: BTreeMap<CarId, SimCar>,

    /// All traffic lights
    pub traffic_lights: BTreeMap<LightId, SimTrafficLight>,

    /// All gas stations
    pub gas_stations: BTreeMap<StationId, SimGasStation>,

    /// Next ID to assign
    next_id: usize,

    /// Ticks completed so far
    tick: u64,

    /// Simulated seconds elapsed
    pub time: f32,

    tick_seconds: f32,
    activation_interval_secs: f32,
    invalid_step_threshold: u32,
    policy_params: PolicyParams,

    /// Seeded RNG, the only source of randomness in the world
    rng: StdRng,

    pub stats: SimStats,
}

impl SimWorld {
    /// Create an empty world. All cells are drivable until a mask is set.
    pub fn new(width: i32, height: i32, seed: u64) -> Self {
        Self {
            grid: SimGrid::new(width, height),
            cars: BTreeMap::new(),
            traffic_lights: BTreeMap::new(),
            gas_stations: BTreeMap::new(),
            next_id: 0,
            tick: 0,
            time: 0.0,
            tick_seconds: 1.0,
            activation_interval_secs: 0.0,
            invalid_step_threshold: INVALID_STEP_THRESHOLD,
            policy_params: PolicyParams::default(),
            rng: StdRng::seed_from_u64(seed),
            stats: SimStats::default(),
        }
    }

    /// Build a world from a configuration, validating every route and fixture
    pub fn from_config(config: &SimConfig) -> Result<Self> {
        if config.width <= 0 || config.height <= 0 {
            bail!(
                "Grid size must be positive, got {}x{}",
                config.width,
                config.height
            );
        }
        if config.tick_seconds <= 0.0 {
            bail!("tick_seconds must be positive, got {}", config.tick_seconds);
        }

        let mut world = SimWorld::new(config.width, config.height, config.seed);
        if let Some(cells) = config.drivable_cells() {
            world.set_drivable_cells(cells);
        }
        world.tick_seconds = config.tick_seconds;
        world.activation_interval_secs = config.activation_interval_secs.max(0.0);
        world.invalid_step_threshold = config.invalid_step_threshold;
        world.policy_params = config.policy;

        let routes = config
            .routes
            .iter()
            .enumerate()
            .map(|(i, waypoints)| {
                Route::new(waypoints.clone()).with_context(|| format!("Route {} is invalid", i))
            })
            .collect::<Result<Vec<Route>>>()?;

        for light in &config.traffic_lights {
            let controller = match light.controller {
                LightControllerKind::Timer => LightController::timer(light.period),
                LightControllerKind::Learning => LightController::learning(config.policy),
            };
            world.add_traffic_light(light.position, light.initial, controller)?;
        }

        for station in &config.gas_stations {
            world.add_gas_station(station.position, station.capacity)?;
        }

        for (i, car) in config.cars.iter().enumerate() {
            let route = routes
                .get(car.route)
                .with_context(|| format!("Car {} references missing route {}", i, car.route))?
                .clone();
            let behavior = match car.behavior {
                CarBehaviorKind::FixedRoute => CarBehavior::FixedRoute,
                CarBehaviorKind::Learning => CarBehavior::learning(config.policy),
            };
            world
                .add_car(route, car.fuel, behavior)
                .with_context(|| format!("Car {} could not be added", i))?;
        }

        Ok(world)
    }

    /// Create the default single-station loop world
    pub fn create_test_world() -> Result<Self> {
        Self::from_config(&SimConfig::default())
    }

    fn next_sim_id(&mut self) -> SimId {
        let id = SimId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Restrict cars to the given cells
    pub fn set_drivable_cells(&mut self, cells: Vec<Coord>) {
        let grid = SimGrid::new(self.grid.width(), self.grid.height());
        self.grid = grid.with_drivable_cells(cells);
    }

    pub fn set_tick_seconds(&mut self, seconds: f32) {
        if seconds > 0.0 {
            self.tick_seconds = seconds;
        }
    }

    /// Seconds between car activations, zero lets every car in on the first tick
    pub fn set_activation_interval(&mut self, seconds: f32) {
        self.activation_interval_secs = seconds.max(0.0);
    }

    pub fn set_invalid_step_threshold(&mut self, threshold: u32) {
        self.invalid_step_threshold = threshold;
    }

    pub fn policy_params(&self) -> PolicyParams {
        self.policy_params
    }

    fn check_fixture_cell(&self, position: Coord) -> Result<()> {
        self.grid
            .validate(position)
            .with_context(|| format!("Invalid fixture position ({}, {})", position.x, position.y))?;
        let taken = self.traffic_lights.values().any(|l| l.position == position)
            || self.gas_stations.values().any(|s| s.position == position);
        if taken {
            bail!(
                "Cell ({}, {}) already holds a light or station",
                position.x,
                position.y
            );
        }
        Ok(())
    }

    /// Add a traffic light at a drivable cell
    pub fn add_traffic_light(
        &mut self,
        position: Coord,
        initial: LightState,
        controller: LightController,
    ) -> Result<LightId> {
        self.check_fixture_cell(position)?;
        let id = LightId(self.next_sim_id());
        self.traffic_lights
            .insert(id, SimTrafficLight::new(id, position, initial, controller));
        Ok(id)
    }

    /// Add a gas station at a drivable cell
    pub fn add_gas_station(&mut self, position: Coord, capacity: u32) -> Result<StationId> {
        if capacity == 0 {
            bail!(
                "Gas station at ({}, {}) needs a capacity of at least 1",
                position.x,
                position.y
            );
        }
        self.check_fixture_cell(position)?;
        let id = StationId(self.next_sim_id());
        self.gas_stations
            .insert(id, SimGasStation::new(id, position, capacity));
        Ok(id)
    }

    /// Add a car on `route`. It enters the grid when the schedule activates it.
    ///
    /// Without an explicit `fuel` the car starts with a random amount in 50..100.
    pub fn add_car(&mut self, route: Route, fuel: Option<i32>, behavior: CarBehavior) -> Result<CarId> {
        for (i, waypoint) in route.waypoints().iter().enumerate() {
            self.grid
                .validate(*waypoint)
                .with_context(|| format!("Route waypoint {} is not usable", i))?;
        }
        let fuel = match fuel {
            Some(fuel) => fuel,
            None => self.rng.random_range(RANDOM_FUEL_RANGE),
        };
        let id = CarId(self.next_sim_id());
        self.cars.insert(id, SimCar::new(id, route, fuel, behavior));
        Ok(id)
    }

    /// Take a car off the grid without touching its state
    ///
    /// The car re-enters at its route start on its next update and the miss
    /// counts toward its invalid-step limit.
    pub fn evict_car(&mut self, car_id: CarId) -> Option<Coord> {
        self.grid.remove(car_id)
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn car(&self, car_id: CarId) -> Option<&SimCar> {
        self.cars.get(&car_id)
    }

    pub fn traffic_light(&self, light_id: LightId) -> Option<&SimTrafficLight> {
        self.traffic_lights.get(&light_id)
    }

    pub fn gas_station(&self, station_id: StationId) -> Option<&SimGasStation> {
        self.gas_stations.get(&station_id)
    }

    /// Tick on which the `n`-th car (0-based, ascending id) enters
    fn activation_tick(&self, n: usize) -> u64 {
        let interval_ticks = (self.activation_interval_secs / self.tick_seconds).round() as u64;
        (n as u64).saturating_mul(interval_ticks).saturating_add(1)
    }

    /// Let in every car whose slot in the schedule has come up
    fn activate_due_cars(&mut self) {
        let waiting: Vec<CarId> = self
            .cars
            .values()
            .filter(|car| !car.active && car.state != CarState::Inactive)
            .map(|car| car.id)
            .collect();

        for car_id in waiting {
            if self.tick < self.activation_tick(self.stats.cars_activated) {
                break;
            }
            if let Some(car) = self.cars.get_mut(&car_id) {
                car.activate();
                self.stats.cars_activated += 1;
            }
        }
    }

    /// Update all traffic lights
    fn update_traffic_lights(&mut self) {
        for light in self.traffic_lights.values_mut() {
            let waiting_cars = self
                .grid
                .neighbors(light.position, 1)
                .into_iter()
                .filter(|cell| self.grid.occupied(*cell))
                .count();
            light.update(LightContext { waiting_cars }, &mut self.rng);
        }
    }

    /// Update all cars in ascending id order
    fn update_cars(&mut self) {
        let mut ctx = CarContext {
            grid: &mut self.grid,
            lights: &self.traffic_lights,
            stations: &mut self.gas_stations,
            rng: &mut self.rng,
            invalid_step_threshold: self.invalid_step_threshold,
        };

        for car in self.cars.values_mut() {
            match car.update(&mut ctx) {
                CarUpdateResult::Exhausted => self.stats.cars_exhausted += 1,
                CarUpdateResult::Failed => self.stats.cars_failed += 1,
                CarUpdateResult::Continue | CarUpdateResult::Skipped => {}
            }
        }
    }

    /// Decay all gas stations
    fn update_gas_stations(&mut self) {
        for station in self.gas_stations.values_mut() {
            station.tick_decay();
        }
    }

    /// Main simulation tick
    ///
    /// Runs to completion and returns the visible cars afterwards.
    pub fn step(&mut self) -> Snapshot {
        self.tick += 1;
        self.time = self.tick as f32 * self.tick_seconds;

        self.activate_due_cars();
        self.update_traffic_lights();
        self.update_cars();
        self.update_gas_stations();

        let snapshot = self.snapshot();
        debug!("Tick {}: {} visible cars", self.tick, snapshot.len());
        snapshot
    }

    /// Visible cars as of the last completed tick
    pub fn snapshot(&self) -> Snapshot {
        Snapshot(
            self.cars
                .values()
                .filter(|car| car.is_visible(self.invalid_step_threshold))
                .map(|car| CarRecord::from_car(car, self.grid.position_of(car.id)))
                .collect(),
        )
    }

    /// Human readable summary of the world state
    pub fn summary(&self) -> String {
        let mut out = String::from("=== Traffic Simulation Summary ===\n");
        out.push_str(&format!("Tick: {} ({:.1}s)\n", self.tick, self.time));
        out.push_str(&format!(
            "Cars: {} total, {} activated, {} out of fuel, {} failed\n",
            self.cars.len(),
            self.stats.cars_activated,
            self.stats.cars_exhausted,
            self.stats.cars_failed
        ));

        out.push_str("--- Traffic Lights ---\n");
        for light in self.traffic_lights.values() {
            let kind = match light.controller {
                LightController::Timer { .. } => "timer",
                LightController::Learning { .. } => "learning",
            };
            out.push_str(&format!(
                "  Light {:?} ({}, {}) {}: {:?}\n",
                light.id.0 .0, light.position.x, light.position.y, kind, light.state
            ));
        }

        out.push_str("--- Gas Stations ---\n");
        for station in self.gas_stations.values() {
            out.push_str(&format!(
                "  Station {:?} ({}, {}): {}/{}\n",
                station.id.0 .0,
                station.position.x,
                station.position.y,
                station.occupancy(),
                station.capacity()
            ));
        }

        let visible = self.snapshot();
        if !visible.is_empty() {
            out.push_str("--- Active Cars ---\n");
            for record in visible.cars() {
                let position = record
                    .position
                    .map(|p| format!("({}, {})", p.x, p.y))
                    .unwrap_or_else(|| "unplaced".to_string());
                out.push_str(&format!(
                    "  Car {}: {:?} at {}, fuel={}, route_index={}\n",
                    record.id, record.state, position, record.fuel, record.route_index
                ));
            }
        }
        out
    }

    /// Draw the grid as text, top row first
    pub fn render_map(&self) -> String {
        let mut out =
            String::from("Legend: C=Car, R/g=Light (red/green), S=Gas station, .=Road, #=Blocked\n");
        for y in (0..self.grid.height()).rev() {
            for x in 0..self.grid.width() {
                let cell = Coord::new(x, y);
                let symbol = if self.grid.occupied(cell) {
                    'C'
                } else if let Some(light) = self.traffic_lights.values().find(|l| l.position == cell) {
                    if light.is_red() {
                        'R'
                    } else {
                        'g'
                    }
                } else if self.gas_stations.values().any(|s| s.position == cell) {
                    'S'
                } else if self.grid.is_drivable(cell) {
                    '.'
                } else {
                    '#'
                };
                out.push(symbol);
            }
            out.push('\n');
        }
        out
    }

    /// Log a one-line status at info level
    pub fn log_status(&self) {
        info!(
            "Tick {}: {} visible cars, {} exhausted, {} failed",
            self.tick,
            self.snapshot().len(),
            self.stats.cars_exhausted,
            self.stats.cars_failed
        );
    }
}
