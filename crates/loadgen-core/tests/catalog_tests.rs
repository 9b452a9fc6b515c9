//! Integration tests for weighted selection and per-user state evolution.

use std::collections::HashMap;
use std::sync::Arc;

use loadgen_core::{
    ActionCatalog, Expectation, HttpRequest, LoadError, RequestExecutor, RequestIntent, StdRng,
    ThinkTime, VirtualUserState,
};
use rand::SeedableRng;
use test_utils::{assert_frequency, mixed_catalog, seed_ids, user_factory, ScriptedExecutor};

fn draw_counts(catalog: &ActionCatalog, draws: usize, seed: u64) -> HashMap<String, usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut counts = HashMap::new();
    for _ in 0..draws {
        *counts.entry(catalog.select(&mut rng).name().to_string()).or_insert(0) += 1;
    }
    counts
}

// ============================================================================
// Weighted selection
// ============================================================================

#[test]
fn test_mixed_catalog_thousand_draws() {
    let catalog = mixed_catalog();
    assert_eq!(catalog.total_weight(), 12);

    let counts = draw_counts(&catalog, 1000, 42);
    assert_frequency!(counts["get"], 1000, 9.0 / 12.0, 4.0);
    assert_frequency!(counts["post_valid"], 1000, 2.0 / 12.0, 4.0);
    assert_frequency!(counts["post_invalid"], 1000, 1.0 / 12.0, 4.0);
}

#[test]
fn test_convergence_is_independent_of_order() {
    let forward = ActionCatalog::builder()
        .action("a", 1, |_, _| fetch())
        .action("b", 3, |_, _| fetch())
        .action("c", 6, |_, _| fetch())
        .build()
        .unwrap();
    let reversed = ActionCatalog::builder()
        .action("c", 6, |_, _| fetch())
        .action("b", 3, |_, _| fetch())
        .action("a", 1, |_, _| fetch())
        .build()
        .unwrap();

    for catalog in [&forward, &reversed] {
        let counts = draw_counts(catalog, 20_000, 7);
        assert_frequency!(counts["a"], 20_000, 0.1, 5.0);
        assert_frequency!(counts["b"], 20_000, 0.3, 5.0);
        assert_frequency!(counts["c"], 20_000, 0.6, 5.0);
    }
}

#[test]
fn test_single_action_always_selected() {
    let catalog = ActionCatalog::builder()
        .action("only", 5, |_, _| fetch())
        .build()
        .unwrap();
    let counts = draw_counts(&catalog, 500, 1);
    assert_eq!(counts["only"], 500);
    assert_eq!(catalog.probability("only"), Some(1.0));
}

#[test]
fn test_zero_total_weight_fails_fast() {
    let err = ActionCatalog::builder()
        .action("get", 0, |_, _| fetch())
        .action("post", 0, |_, _| fetch())
        .build()
        .unwrap_err();
    assert!(matches!(err, LoadError::ZeroTotalWeight));
    assert!(err.is_configuration());
}

fn fetch() -> RequestIntent {
    RequestIntent::new("fetch", HttpRequest::get("/products"), Expectation::Status(200))
}

// ============================================================================
// Per-user state
// ============================================================================

#[tokio::test]
async fn test_users_start_with_isolated_state() {
    let exec: Arc<dyn RequestExecutor> = Arc::new(ScriptedExecutor::with_status(201));
    let factory = user_factory("standard", Arc::new(mixed_catalog()), exec, ThinkTime::none(), 1000);

    let mut first = factory(0);
    let second = factory(1);
    for _ in 0..100 {
        first.step().await;
    }

    assert!(!first.state().created_ids().is_empty());
    assert!(first.state().sequence_counter() > 1000);
    assert!(second.state().created_ids().is_empty());
    assert_eq!(second.state().sequence_counter(), 1000);
    assert_eq!(second.state().known_ids(), seed_ids().as_slice());
}

#[tokio::test]
async fn test_created_ids_feed_later_fetches() {
    let scripted = Arc::new(ScriptedExecutor::with_status(201));
    let exec: Arc<dyn RequestExecutor> = scripted.clone();
    let factory = user_factory("standard", Arc::new(mixed_catalog()), exec, ThinkTime::none(), 1000);
    let mut user = factory(3);

    for _ in 0..200 {
        user.step().await;
    }

    let created = user.state().created_ids().to_vec();
    assert!(!created.is_empty());
    let fetched_created = scripted
        .requests()
        .iter()
        .filter_map(|r| r.path.strip_prefix("/products/").map(str::to_string))
        .any(|id| created.contains(&id));
    assert!(fetched_created, "no fetch ever targeted a created id");
}

#[test]
fn test_fresh_state_has_no_created_ids() {
    let state = VirtualUserState::new(&seed_ids(), 2000);
    assert!(state.created_ids().is_empty());
    assert_eq!(state.sequence_counter(), 2000);
}
