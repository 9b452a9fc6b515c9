//! Scenario file loading and validation.

use std::path::PathBuf;

use load_test::{ProductProfile, TestConfig};
use test_utils::{write_scenario, PRODUCT_SCENARIO_YAML, ZERO_WEIGHT_SCENARIO_YAML};

fn scenarios_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios")
}

#[test]
fn test_shipped_scenarios_are_valid() {
    let mut checked = 0;
    for entry in std::fs::read_dir(scenarios_dir()).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            continue;
        }
        let config = TestConfig::from_file(&path)
            .unwrap_or_else(|e| panic!("{}: {:#}", path.display(), e));
        config
            .validate()
            .unwrap_or_else(|e| panic!("{}: {}", path.display(), e));

        let profile = ProductProfile::from_config(&config);
        for class in &config.user_classes {
            profile.catalog(class).unwrap();
        }
        checked += 1;
    }
    assert!(checked >= 3);
}

#[test]
fn test_product_scenario_fixture() {
    let (_dir, path) = write_scenario(PRODUCT_SCENARIO_YAML);
    let config = TestConfig::from_file(&path).unwrap();
    config.validate().unwrap();

    assert_eq!(config.name, "product-mixed");
    assert_eq!(config.total_users(), 40);
    assert_eq!(config.weights.total(), 12);
    let fast = &config.user_classes[1];
    assert_eq!(fast.id_prefix, "fast_test_");
    assert_eq!(fast.invalid_id_prefix, "fast_invalid_");
    assert_eq!(fast.counter_base, 2000);

    let settings = config.user_settings().unwrap();
    assert_eq!(settings.request_timeout.as_secs(), 10);
    assert_eq!(config.scheduler_settings().unwrap().drain_timeout.as_secs(), 15);
}

#[test]
fn test_zero_weight_fixture_fails_validation() {
    let (_dir, path) = write_scenario(ZERO_WEIGHT_SCENARIO_YAML);
    let config = TestConfig::from_file(&path).unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("total action weight"));
}

#[test]
fn test_missing_file_reports_path() {
    let err = TestConfig::from_file("does/not/exist.yaml").unwrap_err();
    assert!(format!("{:#}", err).contains("does/not/exist.yaml"));
}

#[test]
fn test_malformed_yaml_rejected() {
    let (_dir, path) = write_scenario("name: [unterminated");
    assert!(TestConfig::from_file(&path).is_err());
}
