//! Tabular Q-learning shared by learning cars and learning traffic lights
//!
//! The table maps a discrete state key to the value estimate of every action.
//! Unknown states are created on first use with every action at zero, and the
//! table is never pruned.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use ordered_float::OrderedFloat;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Hyperparameters of the epsilon-greedy learner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyParams {
    /// Exploration probability
    pub epsilon: f64,
    /// Learning rate
    pub alpha: f64,
    /// Discount factor
    pub gamma: f64,
}

impl Default for PolicyParams {
    fn default() -> Self {
        Self {
            epsilon: 0.2,
            alpha: 0.1,
            gamma: 0.9,
        }
    }
}

/// A Q-table over state keys `S` and actions `A`
///
/// Actions are stored in the order they were first offered so that ties
/// resolve to the earliest one.
#[derive(Debug, Clone)]
pub struct QPolicy<S, A> {
    params: PolicyParams,
    table: HashMap<S, Vec<(A, f64)>>,
}

impl<S, A> QPolicy<S, A>
where
    S: Clone + Eq + Hash + Debug,
    A: Copy + Eq + Debug,
{
    pub fn new(params: PolicyParams) -> Self {
        Self {
            params,
            table: HashMap::new(),
        }
    }

    pub fn params(&self) -> PolicyParams {
        self.params
    }

    /// Number of distinct states seen so far
    pub fn state_count(&self) -> usize {
        self.table.len()
    }

    fn entry(&mut self, state: &S, actions: &[A]) -> &mut Vec<(A, f64)> {
        let values = self
            .table
            .entry(state.clone())
            .or_insert_with(|| actions.iter().map(|&a| (a, 0.0)).collect());
        for &action in actions {
            if !values.iter().any(|(a, _)| *a == action) {
                values.push((action, 0.0));
            }
        }
        values
    }

    /// Stored value for a state/action pair, zero if never seen
    pub fn value(&self, state: &S, action: A) -> f64 {
        self.table
            .get(state)
            .and_then(|values| values.iter().find(|(a, _)| *a == action))
            .map(|(_, v)| *v)
            .unwrap_or(0.0)
    }

    /// Highest stored value for a state, zero if never seen
    pub fn max_value(&self, state: &S) -> f64 {
        self.table
            .get(state)
            .and_then(|values| values.iter().map(|(_, v)| OrderedFloat(*v)).max())
            .map(OrderedFloat::into_inner)
            .unwrap_or(0.0)
    }

    /// Epsilon-greedy action selection
    ///
    /// Returns `None` only when `actions` is empty.
    pub fn choose_action<R: Rng + ?Sized>(
        &mut self,
        state: &S,
        actions: &[A],
        rng: &mut R,
    ) -> Option<A> {
        if actions.is_empty() {
            return None;
        }
        let epsilon = self.params.epsilon;
        let values = self.entry(state, actions);

        if rng.random::<f64>() < epsilon {
            return actions.choose(rng).copied();
        }

        let mut best: Option<(A, f64)> = None;
        for (action, value) in values.iter() {
            if !actions.contains(action) {
                continue;
            }
            match best {
                Some((_, best_value)) if *value <= best_value => {}
                _ => best = Some((*action, *value)),
            }
        }
        best.map(|(action, _)| action)
    }

    /// Temporal-difference update
    ///
    /// `Q(s,a) += alpha * (reward + gamma * max Q(s',·) - Q(s,a))`
    pub fn update(&mut self, state: &S, action: A, reward: f64, next_state: &S, actions: &[A]) {
        let PolicyParams { alpha, gamma, .. } = self.params;
        self.entry(next_state, actions);
        let future = self.max_value(next_state);

        let values = self.entry(state, actions);
        if let Some((_, value)) = values.iter_mut().find(|(a, _)| *a == action) {
            *value += alpha * (reward + gamma * future - *value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Dir {
        Left,
        Right,
    }

    #[test]
    fn greedy_choice_prefers_first_on_ties() {
        let mut policy: QPolicy<u8, Dir> = QPolicy::new(PolicyParams {
            epsilon: 0.0,
            ..PolicyParams::default()
        });
        let mut rng = StdRng::seed_from_u64(1);
        let action = policy.choose_action(&0, &[Dir::Left, Dir::Right], &mut rng);
        assert_eq!(action, Some(Dir::Left));
        assert_eq!(policy.state_count(), 1);
    }

    #[test]
    fn update_uses_next_state_maximum() {
        let mut policy: QPolicy<u8, Dir> = QPolicy::new(PolicyParams {
            epsilon: 0.0,
            alpha: 0.5,
            gamma: 0.5,
        });
        let actions = [Dir::Left, Dir::Right];
        policy.update(&1, Dir::Right, 4.0, &1, &actions);
        assert!((policy.value(&1, Dir::Right) - 2.0).abs() < 1e-12);

        // next state 1 now has max 2.0
        policy.update(&0, Dir::Left, 0.0, &1, &actions);
        assert!((policy.value(&0, Dir::Left) - 0.5).abs() < 1e-12);
    }
}
