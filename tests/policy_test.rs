//! Behavior of the shared Q-learning policy

use grid_traffic::simulation::{PolicyParams, QPolicy};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Act {
    Stay,
    Go,
    Turn,
}

const ACTIONS: [Act; 3] = [Act::Stay, Act::Go, Act::Turn];

#[test]
fn test_repeated_update_approaches_discounted_return() {
    let params = PolicyParams::default();
    let mut policy: QPolicy<&str, Act> = QPolicy::new(params);
    let reward = 1.0;
    let target = reward / (1.0 - params.gamma);

    let mut last_error = (policy.value(&"s", Act::Go) - target).abs();
    for _ in 0..1000 {
        policy.update(&"s", Act::Go, reward, &"s", &ACTIONS);
        let error = (policy.value(&"s", Act::Go) - target).abs();
        assert!(error < last_error, "error grew from {} to {}", last_error, error);
        last_error = error;
    }
    assert!(last_error < 0.01);
}

#[test]
fn test_unknown_state_starts_at_zero() {
    let mut policy: QPolicy<u32, Act> = QPolicy::new(PolicyParams::default());
    assert_eq!(policy.value(&9, Act::Turn), 0.0);
    assert_eq!(policy.max_value(&9), 0.0);
    assert_eq!(policy.state_count(), 0);

    policy.update(&9, Act::Turn, -1.0, &10, &ACTIONS);
    assert_eq!(policy.state_count(), 2);
    assert!(policy.value(&9, Act::Turn) < 0.0);
    assert_eq!(policy.value(&10, Act::Stay), 0.0);
}

#[test]
fn test_greedy_choice_follows_learned_values() {
    let mut policy: QPolicy<u32, Act> = QPolicy::new(PolicyParams {
        epsilon: 0.0,
        ..PolicyParams::default()
    });
    let mut rng = StdRng::seed_from_u64(11);

    assert_eq!(policy.choose_action(&0, &ACTIONS, &mut rng), Some(Act::Stay));

    policy.update(&0, Act::Turn, 5.0, &1, &ACTIONS);
    for _ in 0..20 {
        assert_eq!(policy.choose_action(&0, &ACTIONS, &mut rng), Some(Act::Turn));
    }
}

#[test]
fn test_full_exploration_tries_every_action() {
    let mut policy: QPolicy<u32, Act> = QPolicy::new(PolicyParams {
        epsilon: 1.0,
        ..PolicyParams::default()
    });
    let mut rng = StdRng::seed_from_u64(5);
    policy.update(&0, Act::Go, 10.0, &0, &ACTIONS);

    let mut seen = Vec::new();
    for _ in 0..300 {
        let action = policy.choose_action(&0, &ACTIONS, &mut rng).unwrap();
        if !seen.contains(&action) {
            seen.push(action);
        }
    }
    assert_eq!(seen.len(), ACTIONS.len());
}

#[test]
fn test_empty_action_set_yields_nothing() {
    let mut policy: QPolicy<u32, Act> = QPolicy::new(PolicyParams::default());
    let mut rng = StdRng::seed_from_u64(0);
    assert_eq!(policy.choose_action(&0, &[], &mut rng), None);
}
