//! `spotd` wiring against files on disk.

use std::path::Path;

use spotd::{EvaluateArgs, SignalArg, check_config, evaluate};
use spotgrid_core::Decision;

const CATALOG: &str = r#"{
    "instance_types": {
        "c5.large":  { "vcpu": 2, "memory_gib": 4.0 },
        "m5.large":  { "vcpu": 2, "memory_gib": 8.0 },
        "c5.xlarge": { "vcpu": 4, "memory_gib": 8.0 }
    },
    "pools": [
        { "instance_type": "c5.large",  "zone": "ap-south-1a",
          "spot_price": 0.035, "on_demand_price": 0.085, "interruption_rate": 0.125 },
        { "instance_type": "m5.large",  "zone": "ap-south-1a",
          "spot_price": 0.04,  "on_demand_price": 0.096, "interruption_rate": 0.075 },
        { "instance_type": "c5.xlarge", "zone": "ap-south-1a",
          "spot_price": 0.06,  "on_demand_price": 0.17,  "rate_band": "low" }
    ]
}"#;

const SINGLE: &str = r#"{
    "mode": "single_instance",
    "region": "ap-south-1",
    "current": { "instance_id": "i-0abc", "instance_type": "c5.large", "zone": "ap-south-1a" },
    "requirements": { "vcpu": 2, "memory_gib": 4.0 }
}"#;

const POOL: &str = r#"{
    "mode": "pool_search",
    "region": "ap-south-1",
    "requirements": { "vcpu": 2, "memory_gib": 4.0, "vcpu_band": { "min": 2, "max": 8 } }
}"#;

const CONFIG: &str = r#"
[risk]
kind = "mock"
mock_probability = 0.0

[actuator]
kind = "recording"
"#;

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn args(dir: &Path, request: &str, signal: Option<SignalArg>) -> EvaluateArgs {
    EvaluateArgs {
        config: Some(write(dir, "spotd.toml", CONFIG)),
        request: write(dir, "request.json", request),
        mock: Some(write(dir, "catalog.json", CATALOG)),
        signal,
    }
}

#[tokio::test]
async fn single_instance_stays_without_signal() {
    let dir = tempfile::tempdir().unwrap();
    let output = evaluate(&args(dir.path(), SINGLE, None)).await.unwrap();

    assert_eq!(output.summary.final_decision, Decision::Stay);
    assert_eq!(output.summary.candidates_evaluated, 1);
    assert_eq!(output.report["actuation"]["actuator"], "recording");
    assert_eq!(output.report["trace"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn injected_rebalance_drains() {
    let dir = tempfile::tempdir().unwrap();
    let output = evaluate(&args(dir.path(), SINGLE, Some(SignalArg::Rebalance)))
        .await
        .unwrap();
    assert_eq!(output.summary.final_decision, Decision::Drain);
}

#[tokio::test]
async fn pool_search_switches_to_cheapest_safe_pool() {
    let dir = tempfile::tempdir().unwrap();
    let output = evaluate(&args(dir.path(), POOL, None)).await.unwrap();

    assert_eq!(output.summary.final_decision, Decision::Switch);
    assert_eq!(
        output.summary.selected_candidate.unwrap().instance_type,
        "c5.large"
    );
    assert_eq!(output.report["recommendations"][0], "c5.large@ap-south-1a");
}

#[tokio::test]
async fn malformed_request_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = evaluate(&args(dir.path(), "{ \"mode\": \"sideways\" }", None))
        .await
        .err()
        .unwrap();
    assert!(format!("{err:#}").contains("parsing request"));
}

#[test]
fn check_config_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let rendered = check_config(&write(dir.path(), "spotd.toml", CONFIG)).unwrap();
    assert!(rendered.contains("max_crash_probability = 0.85"));
    assert!(rendered.contains("kind = \"recording\""));
}

#[test]
fn check_config_rejects_disabled_safety_gate() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "spotd.toml", "[stages]\nsafety_gate = false\n");
    let err = check_config(&path).unwrap_err();
    assert!(format!("{err:#}").contains("safety_gate"));
}
