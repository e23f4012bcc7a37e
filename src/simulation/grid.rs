//! Cell occupancy for the traffic simulation
//!
//! Keeps a two-way mapping between cars and the cells they occupy, plus the
//! optional drivable mask. Traffic lights and gas stations are fixtures that
//! cars drive onto, so they are not tracked here.

use std::collections::HashMap;

use super::types::{CarId, Coord};

/// Errors returned by placement and movement
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Coordinates ({x}, {y}) are out of bounds for grid size ({width}, {height})")]
    OutOfBounds {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    #[error("Cell ({x}, {y}) is not drivable")]
    NotDrivable { x: i32, y: i32 },
    #[error("Cell ({x}, {y}) is already occupied by car {occupant:?}")]
    Occupied { x: i32, y: i32, occupant: CarId },
}

/// The occupancy map of the simulation
#[derive(Debug, Clone)]
pub struct SimGrid {
    width: i32,
    height: i32,
    /// Row-major drivable flags, `None` means every cell is drivable
    drivable: Option<Vec<bool>>,
    positions: HashMap<CarId, Coord>,
    occupants: HashMap<Coord, CarId>,
}

impl SimGrid {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width: width.max(0),
            height: height.max(0),
            drivable: None,
            positions: HashMap::new(),
            occupants: HashMap::new(),
        }
    }

    /// Restrict movement to the given cells. Cells outside the grid are ignored.
    pub fn with_drivable_cells<I>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = Coord>,
    {
        let mut mask = vec![false; (self.width * self.height) as usize];
        for cell in cells {
            if let Some(index) = self.index_of(cell) {
                mask[index] = true;
            }
        }
        self.drivable = Some(mask);
        self
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    fn index_of(&self, coord: Coord) -> Option<usize> {
        if self.in_bounds(coord) {
            Some((coord.y * self.width + coord.x) as usize)
        } else {
            None
        }
    }

    #[inline]
    pub fn in_bounds(&self, coord: Coord) -> bool {
        coord.x >= 0 && coord.y >= 0 && coord.x < self.width && coord.y < self.height
    }

    /// True if the cell is in bounds and allowed by the mask
    pub fn is_drivable(&self, coord: Coord) -> bool {
        match (self.index_of(coord), &self.drivable) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(index), Some(mask)) => mask[index],
        }
    }

    /// Check bounds and mask for a target cell
    pub fn validate(&self, coord: Coord) -> Result<(), GridError> {
        if !self.in_bounds(coord) {
            return Err(GridError::OutOfBounds {
                x: coord.x,
                y: coord.y,
                width: self.width,
                height: self.height,
            });
        }
        if !self.is_drivable(coord) {
            return Err(GridError::NotDrivable {
                x: coord.x,
                y: coord.y,
            });
        }
        Ok(())
    }

    fn check_target(&self, car: CarId, coord: Coord) -> Result<(), GridError> {
        self.validate(coord)?;
        match self.occupants.get(&coord) {
            Some(&occupant) if occupant != car => Err(GridError::Occupied {
                x: coord.x,
                y: coord.y,
                occupant,
            }),
            _ => Ok(()),
        }
    }

    /// Put a car on the grid. A car that is already placed is moved instead.
    pub fn place(&mut self, car: CarId, coord: Coord) -> Result<(), GridError> {
        self.move_to(car, coord)
    }

    /// Move a car to a new cell
    ///
    /// Either both sides of the mapping are updated or neither is.
    pub fn move_to(&mut self, car: CarId, coord: Coord) -> Result<(), GridError> {
        self.check_target(car, coord)?;
        if let Some(previous) = self.positions.insert(car, coord) {
            self.occupants.remove(&previous);
        }
        self.occupants.insert(coord, car);
        Ok(())
    }

    /// Take a car off the grid, returning the cell it occupied
    pub fn remove(&mut self, car: CarId) -> Option<Coord> {
        let coord = self.positions.remove(&car)?;
        self.occupants.remove(&coord);
        Some(coord)
    }

    pub fn position_of(&self, car: CarId) -> Option<Coord> {
        self.positions.get(&car).copied()
    }

    pub fn occupant(&self, coord: Coord) -> Option<CarId> {
        self.occupants.get(&coord).copied()
    }

    pub fn occupied(&self, coord: Coord) -> bool {
        self.occupants.contains_key(&coord)
    }

    /// Number of cars currently on the grid
    pub fn car_count(&self) -> usize {
        self.positions.len()
    }

    /// Cells within `radius` (Chebyshev) of `center`, excluding the center
    ///
    /// Only in-bounds, drivable cells are returned, in row-major order.
    pub fn neighbors(&self, center: Coord, radius: u32) -> Vec<Coord> {
        let r = radius as i32;
        let mut cells = Vec::new();
        for y in (center.y - r)..=(center.y + r) {
            for x in (center.x - r)..=(center.x + r) {
                let cell = Coord::new(x, y);
                if cell != center && self.is_drivable(cell) {
                    cells.push(cell);
                }
            }
        }
        cells
    }

    /// Every drivable cell in row-major order
    pub fn drivable_cells(&self) -> Vec<Coord> {
        (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| Coord::new(x, y)))
            .filter(|cell| self.is_drivable(*cell))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::types::SimId;

    fn car(n: usize) -> CarId {
        CarId(SimId(n))
    }

    #[test]
    fn failed_move_leaves_mapping_untouched() {
        let mut grid = SimGrid::new(4, 4);
        grid.place(car(0), Coord::new(0, 0)).unwrap();
        grid.place(car(1), Coord::new(1, 0)).unwrap();

        let err = grid.move_to(car(0), Coord::new(1, 0)).unwrap_err();
        assert_eq!(
            err,
            GridError::Occupied {
                x: 1,
                y: 0,
                occupant: car(1)
            }
        );
        assert_eq!(grid.position_of(car(0)), Some(Coord::new(0, 0)));
        assert_eq!(grid.occupant(Coord::new(0, 0)), Some(car(0)));
        assert_eq!(grid.occupant(Coord::new(1, 0)), Some(car(1)));
    }

    #[test]
    fn move_frees_previous_cell() {
        let mut grid = SimGrid::new(4, 4);
        grid.place(car(0), Coord::new(0, 0)).unwrap();
        grid.move_to(car(0), Coord::new(0, 1)).unwrap();
        assert!(!grid.occupied(Coord::new(0, 0)));
        assert_eq!(grid.occupant(Coord::new(0, 1)), Some(car(0)));
        assert_eq!(grid.car_count(), 1);
    }

    #[test]
    fn moving_onto_own_cell_is_allowed() {
        let mut grid = SimGrid::new(2, 2);
        grid.place(car(3), Coord::new(1, 1)).unwrap();
        assert!(grid.move_to(car(3), Coord::new(1, 1)).is_ok());
        assert_eq!(grid.position_of(car(3)), Some(Coord::new(1, 1)));
    }
}
