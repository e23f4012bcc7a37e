//! Traffic light logic for the traffic simulation
//!
//! A light is either driven by a fixed countdown or by a Q-learning policy
//! keyed on the number of cars waiting around it.

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::policy::{PolicyParams, QPolicy};
use super::types::{Coord, LightId};

/// Signal shown by a traffic light
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LightState {
    Red,
    Green,
}

impl LightState {
    pub fn flipped(self) -> Self {
        match self {
            LightState::Red => LightState::Green,
            LightState::Green => LightState::Red,
        }
    }
}

/// Actions available to a learning light
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightAction {
    KeepRed,
    ChangeToGreen,
}

impl LightAction {
    pub const ALL: [LightAction; 2] = [LightAction::KeepRed, LightAction::ChangeToGreen];
}

/// More waiting cars than this counts as congestion
pub const CONGESTION_THRESHOLD: usize = 3;

/// What a light observes when it updates
#[derive(Debug, Clone, Copy, Default)]
pub struct LightContext {
    /// Cars occupying cells adjacent to the light
    pub waiting_cars: usize,
}

/// How a light decides its next state
#[derive(Debug, Clone)]
pub enum LightController {
    Timer {
        period: u32,
        countdown: u32,
    },
    Learning {
        policy: QPolicy<usize, LightAction>,
        /// Decision of the previous tick, learned from once the next count is seen
        pending: Option<(usize, LightAction, f64)>,
    },
}

impl LightController {
    pub fn timer(period: u32) -> Self {
        let period = period.max(1);
        LightController::Timer {
            period,
            countdown: period,
        }
    }

    pub fn learning(params: PolicyParams) -> Self {
        LightController::Learning {
            policy: QPolicy::new(params),
            pending: None,
        }
    }
}

/// Reward for a learning light's decision
pub fn light_reward(action: LightAction, waiting_cars: usize) -> f64 {
    let congested = waiting_cars > CONGESTION_THRESHOLD;
    match (action, congested) {
        (LightAction::ChangeToGreen, true) => 5.0,
        (LightAction::ChangeToGreen, false) => -2.0,
        (LightAction::KeepRed, true) => -5.0,
        (LightAction::KeepRed, false) => 2.0,
    }
}

/// A traffic light in the simulation
#[derive(Debug, Clone)]
pub struct SimTrafficLight {
    pub id: LightId,
    pub position: Coord,
    pub state: LightState,
    pub controller: LightController,
}

impl SimTrafficLight {
    pub fn new(id: LightId, position: Coord, state: LightState, controller: LightController) -> Self {
        Self {
            id,
            position,
            state,
            controller,
        }
    }

    pub fn is_red(&self) -> bool {
        self.state == LightState::Red
    }

    /// Advance the light by one tick and return its new state
    pub fn update<R: Rng + ?Sized>(&mut self, context: LightContext, rng: &mut R) -> LightState {
        let previous = self.state;
        match &mut self.controller {
            LightController::Timer { period, countdown } => {
                *countdown = countdown.saturating_sub(1);
                if *countdown == 0 {
                    self.state = self.state.flipped();
                    *countdown = *period;
                }
            }
            LightController::Learning { policy, pending } => {
                let waiting = context.waiting_cars;
                if let Some((state, action, reward)) = pending.take() {
                    policy.update(&state, action, reward, &waiting, &LightAction::ALL);
                }
                let action = policy
                    .choose_action(&waiting, &LightAction::ALL, rng)
                    .unwrap_or(LightAction::KeepRed);
                self.state = match action {
                    LightAction::KeepRed => LightState::Red,
                    LightAction::ChangeToGreen => LightState::Green,
                };
                *pending = Some((waiting, action, light_reward(action, waiting)));
            }
        }

        if self.state != previous {
            debug!(
                "Light {:?} at ({}, {}) switched {:?} -> {:?}",
                self.id.0, self.position.x, self.position.y, previous, self.state
            );
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::types::SimId;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn timer_flips_every_period() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut light = SimTrafficLight::new(
            LightId(SimId(0)),
            Coord::new(0, 0),
            LightState::Red,
            LightController::timer(3),
        );
        let states: Vec<LightState> = (0..8)
            .map(|_| light.update(LightContext::default(), &mut rng))
            .collect();
        use LightState::*;
        assert_eq!(states, vec![Red, Red, Green, Green, Green, Red, Red, Red]);
    }

    #[test]
    fn congestion_rewards_going_green() {
        assert!(light_reward(LightAction::ChangeToGreen, 5) > 0.0);
        assert!(light_reward(LightAction::KeepRed, 5) < 0.0);
        assert!(light_reward(LightAction::ChangeToGreen, 1) < 0.0);
        assert!(light_reward(LightAction::KeepRed, 0) > 0.0);
    }
}
