//! In-memory stand-in for the product API used in end-to-end tests.
//!
//! Mirrors the observable contract of the target service:
//! - `GET /products` → 200 with `count` and `products`
//! - `GET /products/{id}` → 200 or 404
//! - `POST /products` → 400 on invalid payload, 409 on an existing id, else 201
//!
//! The store is shared by every caller, so concurrent users see each
//! other's creations exactly as they would against a real server.

use async_trait::async_trait;
use loadgen_core::{
    ExecutorResponse, HttpMethod, HttpRequest, RequestExecutor, TransportError,
};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Seed products the real service starts with.
pub const SEED_PRODUCT_IDS: [&str; 3] = ["1", "2", "3"];

pub struct ProductApiSim {
    products: Mutex<BTreeMap<String, Value>>,
    latency: Duration,
}

impl ProductApiSim {
    pub fn new() -> Self {
        let mut products = BTreeMap::new();
        for (id, name, price, stock) in [
            ("1", "Laptop", 999.99, 10),
            ("2", "Mouse", 29.99, 50),
            ("3", "Keyboard", 89.99, 25),
        ] {
            products.insert(
                id.to_string(),
                json!({ "id": id, "name": name, "description": "", "price": price, "stock": stock }),
            );
        }
        Self {
            products: Mutex::new(products),
            latency: Duration::from_millis(2),
        }
    }

    pub fn product_count(&self) -> usize {
        self.store().len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.store().contains_key(id)
    }

    fn store(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Value>> {
        self.products.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn respond(&self, status: u16, body: Value) -> ExecutorResponse {
        ExecutorResponse::new(status, body.to_string().into_bytes(), self.latency)
    }

    fn handle(&self, request: &HttpRequest) -> ExecutorResponse {
        let path = request.path.trim_end_matches('/');
        match (request.method, path) {
            (HttpMethod::Get, "/products") => {
                let products: Vec<Value> = self.store().values().cloned().collect();
                self.respond(200, json!({ "count": products.len(), "products": products }))
            }
            (HttpMethod::Get, p) if p.starts_with("/products/") => {
                let id = &p["/products/".len()..];
                match self.store().get(id) {
                    Some(product) => self.respond(200, product.clone()),
                    None => self.respond(404, json!({ "error": "Product not found", "id": id })),
                }
            }
            (HttpMethod::Post, "/products") => self.create(request.body.as_ref()),
            _ => self.respond(404, json!({ "error": "Not found" })),
        }
    }

    fn create(&self, body: Option<&Value>) -> ExecutorResponse {
        let Some(product) = body.and_then(Value::as_object) else {
            return self.respond(400, json!({ "error": "Invalid product data" }));
        };
        if let Err(details) = validate(product) {
            return self.respond(400, json!({ "error": "Invalid product data", "details": details }));
        }

        let id = product["id"].as_str().unwrap_or_default().to_string();
        let mut store = self.store();
        if store.contains_key(&id) {
            return self.respond(409, json!({ "error": "Product with this ID already exists", "id": id }));
        }
        store.insert(id, Value::Object(product.clone()));
        drop(store);
        self.respond(201, json!({ "message": "Product created successfully", "product": product }))
    }
}

impl Default for ProductApiSim {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(product: &Map<String, Value>) -> Result<(), String> {
    match product.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => {}
        _ => return Err("id is required".into()),
    }
    match product.get("name").and_then(Value::as_str) {
        Some(name) if !name.is_empty() => {}
        _ => return Err("name is required".into()),
    }
    match product.get("price").and_then(Value::as_f64) {
        Some(price) if price > 0.0 => {}
        Some(_) => return Err("price must be greater than 0".into()),
        None => return Err("price is required".into()),
    }
    if let Some(stock) = product.get("stock").and_then(Value::as_i64) {
        if stock < 0 {
            return Err("stock cannot be negative".into());
        }
    }
    Ok(())
}

#[async_trait]
impl RequestExecutor for ProductApiSim {
    async fn execute(
        &self,
        request: &HttpRequest,
        _timeout: Duration,
    ) -> Result<ExecutorResponse, TransportError> {
        Ok(self.handle(request))
    }
}
