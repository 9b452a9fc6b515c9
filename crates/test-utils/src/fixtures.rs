//! Common test fixtures for loadgen tests.
//!
//! This module provides pre-built catalogs, user factories and scenario
//! files that represent common load profiles.

use loadgen_core::{
    ActionCatalog, Expectation, HttpRequest, RequestExecutor, RequestIntent, StdRng, ThinkTime,
    UserId, UserSettings, VirtualUser, VirtualUserState,
};
use rand::SeedableRng;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Seed identifiers shared by every user.
pub fn seed_ids() -> Vec<String> {
    vec!["1".to_string(), "2".to_string(), "3".to_string()]
}

/// The reference mix: GET 9, valid POST 2, invalid POST 1 (total weight 12).
pub fn mixed_catalog() -> ActionCatalog {
    ActionCatalog::builder()
        .action("get", 9, |state, rng| {
            let id = state.choose_existing(rng).unwrap_or("1").to_string();
            RequestIntent::new(
                "fetch_existing",
                HttpRequest::get(format!("/products/{}", id)),
                Expectation::Status(200),
            )
        })
        .action("post_valid", 2, |state, _| {
            let id = format!("test_{}", state.next_sequence());
            RequestIntent::new(
                "create_valid",
                HttpRequest::post_json(
                    "/products",
                    json!({ "id": id, "name": format!("Product {}", id), "price": 10.0, "stock": 1 }),
                ),
                Expectation::AnyOf(vec![201, 409]),
            )
            .creating(id)
        })
        .action("post_invalid", 1, |_, _| {
            RequestIntent::new(
                "create_invalid",
                HttpRequest::post_json("/products", json!({ "description": "missing fields", "stock": 10 })),
                Expectation::Status(400),
            )
        })
        .build()
        .unwrap_or_else(|e| panic!("fixture catalog must be valid: {}", e))
}

/// Factory producing users with no think time and a 5s request timeout.
pub fn user_factory(
    class: &'static str,
    catalog: Arc<ActionCatalog>,
    executor: Arc<dyn RequestExecutor>,
    think_time: ThinkTime,
    counter_base: u64,
) -> impl Fn(UserId) -> VirtualUser + Send + Sync + 'static {
    let seeds: Arc<[String]> = seed_ids().into();
    let settings = UserSettings::new(think_time, Duration::from_secs(5))
        .unwrap_or_else(|e| panic!("fixture settings must be valid: {}", e));
    move |id| {
        VirtualUser::new(
            id,
            class,
            Arc::clone(&catalog),
            Arc::clone(&executor),
            settings,
            VirtualUserState::new(&seeds, counter_base),
            seeded_rng(id),
        )
    }
}

fn seeded_rng(id: UserId) -> StdRng {
    StdRng::seed_from_u64(0x5EED ^ id)
}

/// A complete product scenario in the YAML format read by `load-test`.
pub const PRODUCT_SCENARIO_YAML: &str = r#"
name: product-mixed
description: Mixed reads, valid writes, invalid writes and conflicts
base_url: http://localhost:8080
duration_secs: 30
min_think_secs: 1.0
max_think_secs: 3.0
request_timeout_secs: 10
drain_timeout_secs: 15
known_ids: ["1", "2", "3"]
weights:
  get_products: 9
  create_valid_product: 2
  create_invalid_or_duplicate_product: 1
user_classes:
  - name: standard
    target_concurrency: 20
    spawn_rate_per_second: 5
    id_prefix: test_
    invalid_id_prefix: invalid_
    counter_base: 1000
  - name: fast
    target_concurrency: 20
    spawn_rate_per_second: 5
    id_prefix: fast_test_
    invalid_id_prefix: fast_invalid_
    counter_base: 2000
"#;

/// Scenario whose catalog weights sum to zero.
pub const ZERO_WEIGHT_SCENARIO_YAML: &str = r#"
name: broken
description: All weights zero
base_url: http://localhost:8080
duration_secs: 10
weights:
  get_products: 0
  create_valid_product: 0
  create_invalid_or_duplicate_product: 0
user_classes:
  - name: standard
    target_concurrency: 1
    spawn_rate_per_second: 1
"#;

/// Write `yaml` to a temporary scenario file. Keep the `TempDir` alive.
pub fn write_scenario(yaml: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {}", e));
    let path = dir.path().join("scenario.yaml");
    std::fs::write(&path, yaml).unwrap_or_else(|e| panic!("write scenario: {}", e));
    (dir, path)
}
