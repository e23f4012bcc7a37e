use std::io::Write;
use std::process::{Command, Stdio};

/// Test that the headless run finishes and reports its summary
#[test]
fn test_headless_simulation_runs() {
    let output = Command::new(env!("CARGO_BIN_EXE_grid_traffic"))
        .args(["--ticks", "30", "--map"])
        .env("RUST_LOG", "warn,grid_traffic=info")
        .output()
        .expect("Failed to execute simulation");

    assert!(
        output.status.success(),
        "Simulation failed to run in headless mode. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("SIMULATION COMPLETE"),
        "Simulation did not complete properly. stderr: {}",
        stderr
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Tick: 30"));
    assert!(stdout.contains("--- Gas Stations ---"));
    assert!(stdout.contains("Legend:"));
}

/// Test that --json prints one parsable snapshot per tick
#[test]
fn test_json_snapshots_per_tick() {
    let output = Command::new(env!("CARGO_BIN_EXE_grid_traffic"))
        .args(["--ticks", "12", "--json", "--seed", "9"])
        .output()
        .expect("Failed to execute simulation");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let snapshots: Vec<serde_json::Value> = stdout
        .lines()
        .take(12)
        .map(|line| serde_json::from_str(line).expect("snapshot line is not JSON"))
        .collect();
    assert_eq!(snapshots.len(), 12);
    assert!(snapshots.iter().all(|s| s.is_array()));
    assert!(!snapshots[11].as_array().unwrap().is_empty());
}

/// Test that every stdin line is answered with one snapshot
#[test]
fn test_stdin_requests_step_once_per_line() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_grid_traffic"))
        .arg("--stdin")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("Failed to start simulation");

    {
        let stdin = child.stdin.as_mut().expect("stdin not piped");
        stdin.write_all(b"step\nstep\nstep\n").unwrap();
    }
    drop(child.stdin.take());

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 3);
}

/// Test that a broken config file is reported as an error
#[test]
fn test_bad_config_fails() {
    let path = std::env::temp_dir().join("grid_traffic_bad_config.json");
    std::fs::write(&path, r#"{"routes": [[]], "cars": [{"route": 0}]}"#).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_grid_traffic"))
        .arg("--config")
        .arg(&path)
        .output()
        .expect("Failed to execute simulation");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Route 0 is invalid"), "stderr: {}", stderr);
}
