//! Lock-guarded access to a world from several threads
//!
//! Request handlers each hold a clone of `SharedSim`. A step holds the lock
//! for the whole tick, so concurrent step requests run one after another.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};

use super::snapshot::Snapshot;
use super::world::SimWorld;

#[derive(Clone)]
pub struct SharedSim {
    inner: Arc<Mutex<SimWorld>>,
}

impl SharedSim {
    pub fn new(world: SimWorld) -> Self {
        Self {
            inner: Arc::new(Mutex::new(world)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, SimWorld>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("Simulation lock poisoned by a panicked step"))
    }

    /// Advance one tick and return the resulting snapshot
    pub fn step(&self) -> Result<Snapshot> {
        Ok(self.lock()?.step())
    }

    /// Advance one tick, returning the tick number along with the snapshot
    pub fn step_with_tick(&self) -> Result<(u64, Snapshot)> {
        let mut world = self.lock()?;
        let snapshot = world.step();
        Ok((world.current_tick(), snapshot))
    }

    /// Run a read-only closure against the world
    pub fn with_world<T>(&self, f: impl FnOnce(&SimWorld) -> T) -> Result<T> {
        let world = self.lock()?;
        Ok(f(&*world))
    }
}
