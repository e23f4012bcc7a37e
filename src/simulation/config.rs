//! Construction-time configuration of a simulation
//!
//! Every field has a default, so a config file only needs to list what it
//! changes. `SimConfig::default()` is the single-station loop scenario.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::policy::PolicyParams;
use super::traffic_light::LightState;
use super::types::{
    Coord, DEFAULT_LIGHT_PERIOD, DEFAULT_STATION_CAPACITY, INVALID_STEP_THRESHOLD,
    ROUTE_STATION_CAPACITY,
};

/// Built-in drivable masks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadLayout {
    /// Every cell is drivable
    #[default]
    Open,
    /// One horizontal and one vertical road crossing near the center
    Cross,
}

impl RoadLayout {
    /// Drivable cells for a grid of the given size, `None` for no mask
    pub fn cells(self, width: i32, height: i32) -> Option<Vec<Coord>> {
        match self {
            RoadLayout::Open => None,
            RoadLayout::Cross => {
                let row = (height / 2 - 1).max(0);
                let col = (width / 2 - 1).max(0);
                let mut cells: Vec<Coord> = (0..width).map(|x| Coord::new(x, row)).collect();
                cells.extend((0..height).filter(|&y| y != row).map(|y| Coord::new(col, y)));
                Some(cells)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarBehaviorKind {
    #[default]
    FixedRoute,
    Learning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightControllerKind {
    #[default]
    Timer,
    Learning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarConfig {
    /// Index into `SimConfig::routes`
    #[serde(default)]
    pub route: usize,
    /// Starting fuel, random in 50..100 when absent
    #[serde(default)]
    pub fuel: Option<i32>,
    #[serde(default)]
    pub behavior: CarBehaviorKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightConfig {
    pub position: Coord,
    #[serde(default = "default_light_state")]
    pub initial: LightState,
    #[serde(default = "default_light_period")]
    pub period: u32,
    #[serde(default)]
    pub controller: LightControllerKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationConfig {
    pub position: Coord,
    #[serde(default = "default_station_capacity")]
    pub capacity: u32,
}

fn default_light_state() -> LightState {
    LightState::Red
}

fn default_light_period() -> u32 {
    DEFAULT_LIGHT_PERIOD
}

fn default_station_capacity() -> u32 {
    DEFAULT_STATION_CAPACITY
}

/// Full description of a simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub width: i32,
    pub height: i32,
    pub road_layout: RoadLayout,
    /// Explicit drivable cells, takes precedence over `road_layout`
    pub drivable: Option<Vec<Coord>>,
    pub seed: u64,
    /// Simulated seconds per tick
    pub tick_seconds: f32,
    /// Seconds between two car activations
    pub activation_interval_secs: f32,
    pub invalid_step_threshold: u32,
    pub policy: PolicyParams,
    pub routes: Vec<Vec<Coord>>,
    pub cars: Vec<CarConfig>,
    pub traffic_lights: Vec<LightConfig>,
    pub gas_stations: Vec<StationConfig>,
}

/// Waypoints around the rectangle `min..=max`, counter-clockwise from `min`
pub fn rectangle_loop(min: Coord, max: Coord) -> Vec<Coord> {
    let mut cells = Vec::new();
    cells.extend((min.y..max.y).map(|y| Coord::new(min.x, y)));
    cells.extend((min.x..max.x).map(|x| Coord::new(x, max.y)));
    cells.extend((min.y + 1..=max.y).rev().map(|y| Coord::new(max.x, y)));
    cells.extend((min.x + 1..=max.x).rev().map(|x| Coord::new(x, min.y)));
    cells
}

impl Default for SimConfig {
    fn default() -> Self {
        let loop_route = rectangle_loop(Coord::new(2, 2), Coord::new(17, 17));
        let mut cars: Vec<CarConfig> = (0..6)
            .map(|_| CarConfig {
                route: 0,
                fuel: None,
                behavior: CarBehaviorKind::FixedRoute,
            })
            .collect();
        cars.extend((0..2).map(|_| CarConfig {
            route: 1,
            fuel: None,
            behavior: CarBehaviorKind::Learning,
        }));

        Self {
            width: 20,
            height: 20,
            road_layout: RoadLayout::Open,
            drivable: None,
            seed: 42,
            tick_seconds: 1.0,
            activation_interval_secs: 2.0,
            invalid_step_threshold: INVALID_STEP_THRESHOLD,
            policy: PolicyParams::default(),
            routes: vec![loop_route, vec![Coord::new(10, 10)]],
            cars,
            traffic_lights: vec![
                LightConfig {
                    position: Coord::new(2, 10),
                    initial: LightState::Red,
                    period: DEFAULT_LIGHT_PERIOD,
                    controller: LightControllerKind::Timer,
                },
                LightConfig {
                    position: Coord::new(17, 10),
                    initial: LightState::Red,
                    period: DEFAULT_LIGHT_PERIOD,
                    controller: LightControllerKind::Learning,
                },
            ],
            gas_stations: vec![
                StationConfig {
                    position: Coord::new(10, 17),
                    capacity: ROUTE_STATION_CAPACITY,
                },
                StationConfig {
                    position: Coord::new(6, 12),
                    capacity: DEFAULT_STATION_CAPACITY,
                },
                StationConfig {
                    position: Coord::new(13, 7),
                    capacity: DEFAULT_STATION_CAPACITY,
                },
            ],
        }
    }
}

impl SimConfig {
    /// Read a JSON config file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse simulation config")
    }

    /// Drivable cells after applying `drivable` over `road_layout`
    pub fn drivable_cells(&self) -> Option<Vec<Coord>> {
        self.drivable
            .clone()
            .or_else(|| self.road_layout.cells(self.width, self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangle_loop_visits_each_border_cell_once() {
        let cells = rectangle_loop(Coord::new(0, 0), Coord::new(2, 2));
        assert_eq!(cells.len(), 8);
        assert_eq!(cells[0], Coord::new(0, 0));
        let mut sorted = cells.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 8);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = SimConfig::from_json_str(r#"{"seed": 7, "width": 30}"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.width, 30);
        assert_eq!(config.height, 20);
        assert_eq!(config.policy, PolicyParams::default());
    }

    #[test]
    fn cross_layout_marks_two_roads() {
        let cells = RoadLayout::Cross.cells(20, 20).unwrap();
        assert!(cells.contains(&Coord::new(0, 9)));
        assert!(cells.contains(&Coord::new(9, 0)));
        assert!(!cells.contains(&Coord::new(0, 0)));
        assert_eq!(cells.len(), 39);
    }
}
