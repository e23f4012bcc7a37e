//! Grid traffic simulation engine
//!
//! Cars loop fixed routes on a grid, stop at red lights, queue for gas and
//! never share a cell. Learning cars and learning lights pick actions from a
//! tabular Q-learning policy instead of fixed rules. Nothing here does I/O;
//! callers drive the world one tick at a time.

mod car;
mod config;
mod gas_station;
mod grid;
mod policy;
mod route;
mod shared;
mod snapshot;
mod traffic_light;
mod types;
mod world;

// Re-export public types for external use
#[allow(unused_imports)]
pub use car::{
    alternate_station, nearest_station, observe, CarAction, CarBehavior, CarContext, CarState,
    CarStateKey, CarUpdateResult, FuelLevel, SimCar, REWARD_EXHAUSTED, REWARD_IDLE,
    REWARD_PRODUCTIVE,
};
#[allow(unused_imports)]
pub use config::{
    rectangle_loop, CarBehaviorKind, CarConfig, LightConfig, LightControllerKind, RoadLayout,
    SimConfig, StationConfig,
};
#[allow(unused_imports)]
pub use gas_station::{SimGasStation, StationStatus};
pub use grid::{GridError, SimGrid};
pub use policy::{PolicyParams, QPolicy};
pub use route::{Route, RouteProgress};
pub use shared::SharedSim;
pub use snapshot::{CarRecord, Snapshot};
#[allow(unused_imports)]
pub use traffic_light::{
    light_reward, LightAction, LightContext, LightController, LightState, SimTrafficLight,
    CONGESTION_THRESHOLD,
};
#[allow(unused_imports)]
pub use types::{
    CarId, Coord, LightId, SimId, StationId, DEFAULT_LIGHT_PERIOD, DEFAULT_STATION_CAPACITY,
    FUEL_CAPACITY, INVALID_STEP_THRESHOLD, LOW_FUEL_THRESHOLD, MEDIUM_FUEL_THRESHOLD,
    RANDOM_FUEL_RANGE, REFUEL_AMOUNT, ROUTE_STATION_CAPACITY,
};
pub use world::{SimStats, SimWorld};
