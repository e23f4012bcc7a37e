//! Concurrent step requests through the shared handle

use std::thread;

use grid_traffic::simulation::{SharedSim, SimWorld};

#[test]
fn test_concurrent_steps_are_serialized() {
    let sim = SharedSim::new(SimWorld::create_test_world().unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let sim = sim.clone();
            thread::spawn(move || {
                (0..25)
                    .map(|_| sim.step_with_tick().unwrap().0)
                    .collect::<Vec<u64>>()
            })
        })
        .collect();

    let mut ticks: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    ticks.sort_unstable();

    assert_eq!(ticks, (1..=100).collect::<Vec<u64>>());
    assert_eq!(sim.with_world(|w| w.current_tick()).unwrap(), 100);
}

#[test]
fn test_shared_run_matches_direct_run() {
    let sim = SharedSim::new(SimWorld::create_test_world().unwrap());
    let mut direct = SimWorld::create_test_world().unwrap();
    for _ in 0..50 {
        assert_eq!(sim.step().unwrap(), direct.step());
    }
}
