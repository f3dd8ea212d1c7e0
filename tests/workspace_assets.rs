//! ---
//! ah_section: "15-testing-qa-runbook"
//! ah_subsection: "integration-tests"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Integration and validation tests for the autoheal stack."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use autoheal_common::{AppConfig, DatasetKind, PolicyKind};
use autoheal_persistence::Table;

fn asset(path: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join(path)
}

fn read(path: &str) -> String {
    let full = asset(path);
    fs::read_to_string(&full)
        .unwrap_or_else(|err| panic!("failed to read {}: {}", full.display(), err))
}

#[test]
fn shipped_config_parses_and_validates() {
    let config: AppConfig = read("configs/autoheal.toml").parse().unwrap();
    assert_eq!(config.policy.kind, PolicyKind::Adaptive);
    assert_eq!(config.dataset.kind, DatasetKind::Scores);
    assert!(asset(&config.dataset.path.display().to_string()).exists());
    let thresholds = config.thresholds();
    assert_eq!(thresholds.latency_ms, 24_000.0);
    assert_eq!(thresholds.low_score_avg, 40.0);
}

#[test]
fn sample_datasets_are_healthy() {
    let scores = Table::read(&asset("dataset/student_scores.csv"))
        .unwrap()
        .expect("scores dataset present");
    let values = scores.numbers("score").unwrap();
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    assert!(mean >= 40.0, "sample scores should not trip the detector");

    let health = Table::read(&asset("dataset/patient_health.csv"))
        .unwrap()
        .expect("health dataset present");
    assert!(health.last_number("heart_rate").unwrap().unwrap() <= 120.0);
    assert!(health.last_number("oxygen_level").unwrap().unwrap() >= 95.0);
}

#[test]
fn manifests_carry_frontmatter() {
    for manifest in [
        "Cargo.toml",
        "crates/autoheal-common/Cargo.toml",
        "crates/autoheal-persistence/Cargo.toml",
        "crates/autoheal-bus/Cargo.toml",
        "crates/autoheal-resilience/Cargo.toml",
        "crates/autoheal-sim/Cargo.toml",
        "bin/autohealctl/Cargo.toml",
    ] {
        let content = read(manifest);
        assert!(content.starts_with("# ---"), "{manifest} must include frontmatter header");
        assert!(content.contains("ah_section:"), "{manifest} must name its section");
    }
}
