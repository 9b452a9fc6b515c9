//! Product API behavior profile.
//!
//! Three weighted actions exercise the happy path and the rejection paths of
//! the product service:
//!
//! | Action | Branches | Expected |
//! |--------|----------|----------|
//! | `get_products` | list all / fetch existing / fetch missing | 200 + `products` / 200 / 404 |
//! | `create_valid_product` | fresh id from the user's counter | 201 or 409 |
//! | `create_invalid_or_duplicate_product` | invalid payload / seed id again | 400 / 409 |

use loadgen_core::{
    ActionCatalog, Expectation, HttpRequest, LoadResult, RequestIntent, StdRng, VirtualUserState,
};
use rand::Rng;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::{ActionWeights, BranchMix, TestConfig, UserClassConfig};

pub const GET_PRODUCTS: &str = "get_products";
pub const CREATE_VALID_PRODUCT: &str = "create_valid_product";
pub const CREATE_INVALID_OR_DUPLICATE_PRODUCT: &str = "create_invalid_or_duplicate_product";

const PRODUCTS_PATH: &str = "/products";

/// Everything a class-specific catalog needs from the scenario.
#[derive(Debug, Clone)]
pub struct ProductProfile {
    weights: ActionWeights,
    mix: BranchMix,
}

/// Per-class naming used inside generated payloads.
#[derive(Debug, Clone)]
struct Naming {
    id_prefix: String,
    invalid_id_prefix: String,
    label: String,
}

impl ProductProfile {
    pub fn new(weights: ActionWeights, mix: BranchMix) -> Self {
        Self { weights, mix }
    }

    pub fn from_config(config: &TestConfig) -> Self {
        Self::new(config.weights, config.mix)
    }

    /// Build the catalog for one user class. Classes differ only in the ids
    /// and names they generate.
    pub fn catalog(&self, class: &UserClassConfig) -> LoadResult<ActionCatalog> {
        let naming = Arc::new(Naming {
            id_prefix: class.id_prefix.clone(),
            invalid_id_prefix: class.invalid_id_prefix.clone(),
            label: class.product_label.clone(),
        });
        let mix = self.mix;

        let create_naming = Arc::clone(&naming);
        let invalid_naming = naming;

        ActionCatalog::builder()
            .action(GET_PRODUCTS, self.weights.get_products, move |state, rng| {
                get_products(state, rng, &mix)
            })
            .action(CREATE_VALID_PRODUCT, self.weights.create_valid_product, move |state, rng| {
                create_valid_product(state, rng, &create_naming)
            })
            .action(
                CREATE_INVALID_OR_DUPLICATE_PRODUCT,
                self.weights.create_invalid_or_duplicate_product,
                move |state, rng| create_invalid_or_duplicate(state, rng, &mix, &invalid_naming),
            )
            .build()
    }
}

fn get_products(state: &mut VirtualUserState, rng: &mut StdRng, mix: &BranchMix) -> RequestIntent {
    if rng.gen_bool(mix.list_all) {
        return RequestIntent::new(
            "list_all",
            HttpRequest::get(PRODUCTS_PATH),
            Expectation::custom("200 with a 'products' field", |status, body| {
                status == 200 && body.map_or(false, |b| b.get("products").is_some())
            }),
        )
        .with_failure_template("Got status code {status}")
        .with_status_template(200, "Response missing 'products' field");
    }

    let existing = if rng.gen_bool(mix.valid_fetch) {
        state.choose_existing(rng).map(str::to_string)
    } else {
        None
    };

    match existing {
        Some(id) => RequestIntent::new(
            "fetch_existing",
            HttpRequest::get(format!("{}/{}", PRODUCTS_PATH, id)),
            Expectation::Status(200),
        )
        .with_failure_template("Expected {expected} for existing product, got {status}"),
        None => {
            let id = format!("nonexistent_{}", rng.gen_range(1..=100));
            RequestIntent::new(
                "fetch_missing",
                HttpRequest::get(format!("{}/{}", PRODUCTS_PATH, id)),
                Expectation::Status(404),
            )
            .with_failure_template("Expected {expected} for non-existent product, got {status}")
        }
    }
}

fn create_valid_product(
    state: &mut VirtualUserState,
    rng: &mut StdRng,
    naming: &Naming,
) -> RequestIntent {
    let id = format!("{}{}", naming.id_prefix, state.next_sequence());
    // Rounded to cents like a real price.
    let price = (rng.gen_range(10.0..=1000.0_f64) * 100.0).round() / 100.0;
    let stock: u32 = rng.gen_range(0..=100);

    let body = json!({
        "id": id,
        "name": format!("{} {}", naming.label, id),
        "description": format!("Description for {} {}", naming.label.to_lowercase(), id),
        "price": price,
        "stock": stock,
    });

    RequestIntent::new(
        "create_valid",
        HttpRequest::post_json(PRODUCTS_PATH, body),
        Expectation::AnyOf(vec![201, 409]),
    )
    .with_failure_template("Got unexpected status code {status}")
    .creating(id)
}

fn create_invalid_or_duplicate(
    state: &mut VirtualUserState,
    rng: &mut StdRng,
    mix: &BranchMix,
    naming: &Naming,
) -> RequestIntent {
    let duplicate = if rng.gen_bool(mix.invalid_payload) {
        None
    } else {
        state.choose_known(rng).map(str::to_string)
    };

    match duplicate {
        Some(id) => RequestIntent::new(
            "create_duplicate",
            HttpRequest::post_json(
                PRODUCTS_PATH,
                json!({
                    "id": id,
                    "name": format!("Duplicate {}", naming.label),
                    "description": "This should fail with 409",
                    "price": 99.99,
                    "stock": 10,
                }),
            ),
            Expectation::Status(409),
        )
        .with_failure_template("Expected {expected} for duplicate ID, got {status}"),
        None => RequestIntent::new(
            "create_invalid",
            HttpRequest::post_json(PRODUCTS_PATH, invalid_payload(rng, &naming.invalid_id_prefix)),
            Expectation::Status(400),
        )
        .with_failure_template("Expected {expected} for invalid data, got {status}"),
    }
}

/// One of five payloads the service must reject.
fn invalid_payload(rng: &mut StdRng, prefix: &str) -> Value {
    let id = format!("{}{}", prefix, rng.gen_range(1..=1000));
    match rng.gen_range(0..5) {
        0 => json!({ "description": "Product without ID, name, or price", "stock": 10 }),
        1 => json!({ "id": id, "name": "Free Product", "price": 0, "stock": 5 }),
        2 => json!({ "id": id, "name": "Negative Price Product", "price": -10.99, "stock": 5 }),
        3 => json!({ "id": id, "name": "Negative Stock Product", "price": 50.0, "stock": -5 }),
        _ => json!({ "id": id, "name": "", "price": 100.0, "stock": 10 }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_user_classes;
    use loadgen_core::HttpMethod;
    use rand::SeedableRng;

    fn profile() -> ProductProfile {
        ProductProfile::new(ActionWeights::default(), BranchMix::default())
    }

    fn state(class: &UserClassConfig) -> VirtualUserState {
        VirtualUserState::new(
            &["1".to_string(), "2".to_string(), "3".to_string()],
            class.counter_base,
        )
    }

    fn generate(
        catalog: &ActionCatalog,
        class: &UserClassConfig,
        action: &str,
        n: usize,
    ) -> Vec<RequestIntent> {
        let spec = catalog.get(action).unwrap();
        let mut state = state(class);
        let mut rng = StdRng::seed_from_u64(11);
        (0..n).map(|_| spec.generate(&mut state, &mut rng)).collect()
    }

    #[test]
    fn test_catalog_uses_configured_weights() {
        let catalog = profile().catalog(&default_user_classes()[0]).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.total_weight(), 12);
        assert_eq!(catalog.get(GET_PRODUCTS).unwrap().weight(), 9);
    }

    #[test]
    fn test_zero_weight_rejected() {
        let weights = ActionWeights {
            create_invalid_or_duplicate_product: 0,
            ..ActionWeights::default()
        };
        let result = ProductProfile::new(weights, BranchMix::default())
            .catalog(&default_user_classes()[0]);
        assert!(result.is_err());
    }

    #[test]
    fn test_get_products_branches() {
        let standard = &default_user_classes()[0];
        let catalog = profile().catalog(standard).unwrap();
        let intents = generate(&catalog, standard, GET_PRODUCTS, 400);

        for intent in &intents {
            assert_eq!(intent.request.method, HttpMethod::Get);
            match intent.scenario.as_str() {
                "list_all" => {
                    assert_eq!(intent.request.path, "/products");
                    assert!(intent.expectation.matches(200, Some(&json!({"products": []}))));
                    assert!(!intent.expectation.matches(200, Some(&json!({"count": 0}))));
                    assert_eq!(intent.failure_message(200), "Response missing 'products' field");
                    assert_eq!(intent.failure_message(503), "Got status code 503");
                }
                "fetch_existing" => {
                    let id = intent.request.path.trim_start_matches("/products/");
                    assert!(["1", "2", "3"].contains(&id));
                    assert!(intent.expectation.matches(200, None));
                }
                "fetch_missing" => {
                    assert!(intent.request.path.starts_with("/products/nonexistent_"));
                    assert!(intent.expectation.matches(404, None));
                }
                other => panic!("unexpected scenario {}", other),
            }
        }
        let lists = intents.iter().filter(|i| i.scenario == "list_all").count();
        assert!((140..=260).contains(&lists), "list_all drawn {} times", lists);
        assert!(intents.iter().any(|i| i.scenario == "fetch_missing"));
    }

    #[test]
    fn test_create_valid_payload() {
        let fast = &default_user_classes()[1];
        let catalog = profile().catalog(fast).unwrap();
        let intents = generate(&catalog, fast, CREATE_VALID_PRODUCT, 50);

        for (i, intent) in intents.iter().enumerate() {
            let expected_id = format!("fast_test_{}", 2000 + i);
            assert_eq!(intent.creates.as_deref(), Some(expected_id.as_str()));

            let body = intent.request.body.as_ref().unwrap();
            assert_eq!(body["id"], expected_id);
            assert_eq!(body["name"], format!("Fast Product {}", expected_id));
            let price = body["price"].as_f64().unwrap();
            assert!((10.0..=1000.0).contains(&price));
            assert_eq!((price * 100.0).round() / 100.0, price);
            assert!((0..=100).contains(&body["stock"].as_i64().unwrap()));

            assert!(intent.expectation.matches(201, None));
            assert!(intent.expectation.matches(409, None));
            assert!(!intent.expectation.matches(400, None));
        }
    }

    #[test]
    fn test_invalid_or_duplicate_branches() {
        let standard = &default_user_classes()[0];
        let catalog = profile().catalog(standard).unwrap();
        let intents = generate(&catalog, standard, CREATE_INVALID_OR_DUPLICATE_PRODUCT, 300);

        for intent in &intents {
            assert!(intent.creates.is_none());
            let body = intent.request.body.as_ref().unwrap();
            match intent.scenario.as_str() {
                "create_invalid" => {
                    if let Some(id) = body.get("id").and_then(Value::as_str) {
                        assert!(id.starts_with("invalid_"));
                    }
                    assert!(intent.expectation.matches(400, None));
                }
                "create_duplicate" => {
                    assert!(["1", "2", "3"].contains(&body["id"].as_str().unwrap()));
                    assert!(intent.expectation.matches(409, None));
                    assert!(!intent.expectation.matches(201, None));
                }
                other => panic!("unexpected scenario {}", other),
            }
        }
        let duplicates = intents.iter().filter(|i| i.scenario == "create_duplicate").count();
        assert!((50..=130).contains(&duplicates), "duplicates drawn {} times", duplicates);
    }
}
