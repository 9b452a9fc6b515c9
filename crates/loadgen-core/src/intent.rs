//! Planned requests and the expectations they are judged against.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Template used when an intent does not supply its own failure message.
pub const DEFAULT_FAILURE_TEMPLATE: &str = "Expected {expected}, got {status}";

/// HTTP verbs the engine can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport-level description of one request, relative to the target base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// POST with a JSON body and the matching content type.
    pub fn post_json(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Post, path)
            .with_header("Content-Type", "application/json")
            .with_body(body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Predicate over (status code, parsed JSON body).
pub type ResponsePredicate = Arc<dyn Fn(u16, Option<&Value>) -> bool + Send + Sync>;

/// The rule deciding whether a transport response is a logical success.
#[derive(Clone)]
pub enum Expectation {
    /// Success iff the status equals the code.
    Status(u16),
    /// Success iff the status is one of the codes.
    AnyOf(Vec<u16>),
    /// Success decided by an arbitrary predicate; `description` names it in diagnostics.
    Custom {
        description: String,
        predicate: ResponsePredicate,
    },
}

impl Expectation {
    pub fn custom<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(u16, Option<&Value>) -> bool + Send + Sync + 'static,
    {
        Expectation::Custom {
            description: description.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn matches(&self, status: u16, body: Option<&Value>) -> bool {
        match self {
            Expectation::Status(code) => status == *code,
            Expectation::AnyOf(codes) => codes.contains(&status),
            Expectation::Custom { predicate, .. } => predicate(status, body),
        }
    }

    /// Only custom predicates look at the body.
    pub fn inspects_body(&self) -> bool {
        matches!(self, Expectation::Custom { .. })
    }

    /// Human-readable form of the expected outcome.
    pub fn describe(&self) -> String {
        match self {
            Expectation::Status(code) => code.to_string(),
            Expectation::AnyOf(codes) => codes
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(" or "),
            Expectation::Custom { description, .. } => description.clone(),
        }
    }
}

impl fmt::Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Status(code) => f.debug_tuple("Status").field(code).finish(),
            Expectation::AnyOf(codes) => f.debug_tuple("AnyOf").field(codes).finish(),
            Expectation::Custom { description, .. } => {
                f.debug_struct("Custom").field("description", description).finish()
            }
        }
    }
}

/// One planned request together with its expected outcome.
///
/// Built fresh for every action invocation and dropped after classification.
#[derive(Debug, Clone)]
pub struct RequestIntent {
    /// Concrete branch the generator took, e.g. `fetch_missing`.
    pub scenario: String,
    pub request: HttpRequest,
    pub expectation: Expectation,
    /// Failure message with `{expected}` and `{status}` placeholders.
    pub failure_template: String,
    /// Templates that replace `failure_template` for one observed status.
    pub status_templates: Vec<(u16, String)>,
    /// Identifier recorded into the user's created ids on a 201.
    pub creates: Option<String>,
}

impl RequestIntent {
    pub fn new(scenario: impl Into<String>, request: HttpRequest, expectation: Expectation) -> Self {
        Self {
            scenario: scenario.into(),
            request,
            expectation,
            failure_template: DEFAULT_FAILURE_TEMPLATE.to_string(),
            status_templates: Vec::new(),
            creates: None,
        }
    }

    pub fn with_failure_template(mut self, template: impl Into<String>) -> Self {
        self.failure_template = template.into();
        self
    }

    /// Use `template` instead of the general one when the response status is
    /// `status`. Lets body-checking expectations explain a right status with a
    /// wrong body.
    pub fn with_status_template(mut self, status: u16, template: impl Into<String>) -> Self {
        self.status_templates.push((status, template.into()));
        self
    }

    pub fn creating(mut self, id: impl Into<String>) -> Self {
        self.creates = Some(id.into());
        self
    }

    /// Render the failure template for an observed status.
    pub fn failure_message(&self, status: u16) -> String {
        let template = self
            .status_templates
            .iter()
            .find(|(s, _)| *s == status)
            .map_or(self.failure_template.as_str(), |(_, t)| t.as_str());
        template
            .replace("{expected}", &self.expectation.describe())
            .replace("{status}", &status.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_expectation() {
        let exp = Expectation::Status(404);
        assert!(exp.matches(404, None));
        assert!(!exp.matches(200, None));
        assert_eq!(exp.describe(), "404");
    }

    #[test]
    fn test_any_of_expectation() {
        let exp = Expectation::AnyOf(vec![201, 409]);
        assert!(exp.matches(201, None));
        assert!(exp.matches(409, None));
        assert!(!exp.matches(400, None));
        assert_eq!(exp.describe(), "201 or 409");
    }

    #[test]
    fn test_custom_expectation_reads_body() {
        let exp = Expectation::custom("200 with products", |status, body| {
            status == 200 && body.map_or(false, |b| b.get("products").is_some())
        });
        assert!(exp.inspects_body());
        assert!(exp.matches(200, Some(&json!({"products": []}))));
        assert!(!exp.matches(200, Some(&json!({"count": 0}))));
        assert!(!exp.matches(200, None));
    }

    #[test]
    fn test_failure_message_template() {
        let intent = RequestIntent::new(
            "fetch_missing",
            HttpRequest::get("/products/nonexistent_7"),
            Expectation::Status(404),
        )
        .with_failure_template("Expected {expected} for non-existent product, got {status}");

        assert_eq!(
            intent.failure_message(200),
            "Expected 404 for non-existent product, got 200"
        );
    }

    #[test]
    fn test_status_template_overrides_general_one() {
        let intent = RequestIntent::new(
            "list_all",
            HttpRequest::get("/products"),
            Expectation::custom("200 with a 'products' field", |status, body| {
                status == 200 && body.map_or(false, |b| b.get("products").is_some())
            }),
        )
        .with_failure_template("Got status code {status}")
        .with_status_template(200, "Response missing 'products' field");

        assert_eq!(intent.failure_message(200), "Response missing 'products' field");
        assert_eq!(intent.failure_message(500), "Got status code 500");
    }

    #[test]
    fn test_default_failure_message() {
        let intent = RequestIntent::new(
            "create_valid",
            HttpRequest::post_json("/products", json!({"id": "test_1000"})),
            Expectation::AnyOf(vec![201, 409]),
        );
        assert_eq!(intent.failure_message(500), "Expected 201 or 409, got 500");
    }

    #[test]
    fn test_post_json_sets_content_type() {
        let req = HttpRequest::post_json("/products", json!({"id": "1"}));
        assert_eq!(req.method, HttpMethod::Post);
        assert!(req
            .headers
            .iter()
            .any(|(k, v)| k == "Content-Type" && v == "application/json"));
        assert!(req.body.is_some());
    }
}
