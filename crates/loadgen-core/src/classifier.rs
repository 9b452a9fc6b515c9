//! Response classification.
//!
//! A response is judged against the expectation its intent carries, not
//! against a blanket "2xx is success" rule. Negative-path scenarios (404,
//! 400, 409) pass when the target rejects the request the way it should.

use crate::executor::{ExecutorResponse, TransportError};
use crate::intent::RequestIntent;
use crate::outcome::Outcome;

/// Decide pass/fail for one executed intent.
///
/// Transport errors always fail, whatever the expectation says.
pub fn classify(
    intent: &RequestIntent,
    result: &Result<ExecutorResponse, TransportError>,
) -> Outcome {
    let response = match result {
        Ok(response) => response,
        Err(err) => return Outcome::transport(err),
    };

    let body = if intent.expectation.inspects_body() {
        response.json()
    } else {
        None
    };

    if intent.expectation.matches(response.status, body.as_ref()) {
        Outcome::passed(response.status, response.latency)
    } else {
        Outcome::mismatch(
            intent.expectation.describe(),
            response.status,
            intent.failure_message(response.status),
            response.latency,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::TransportErrorKind;
    use crate::intent::{Expectation, HttpRequest};
    use crate::outcome::OutcomeKind;
    use serde_json::json;
    use std::time::Duration;

    fn respond(status: u16) -> Result<ExecutorResponse, TransportError> {
        Ok(ExecutorResponse::new(status, Vec::new(), Duration::from_millis(5)))
    }

    fn fetch_missing() -> RequestIntent {
        RequestIntent::new(
            "fetch_missing",
            HttpRequest::get("/products/nonexistent_42"),
            Expectation::Status(404),
        )
        .with_failure_template("Expected {expected} for non-existent product, got {status}")
    }

    fn create_valid() -> RequestIntent {
        RequestIntent::new(
            "create_valid",
            HttpRequest::post_json("/products", json!({"id": "test_1000"})),
            Expectation::AnyOf(vec![201, 409]),
        )
        .creating("test_1000")
    }

    fn create_invalid() -> RequestIntent {
        RequestIntent::new(
            "create_invalid",
            HttpRequest::post_json("/products", json!({"stock": 10})),
            Expectation::Status(400),
        )
    }

    #[test]
    fn test_missing_resource_404_passes() {
        let outcome = classify(&fetch_missing(), &respond(404));
        assert!(outcome.success());
        assert_eq!(outcome.status, Some(404));
    }

    #[test]
    fn test_missing_resource_200_fails() {
        let outcome = classify(&fetch_missing(), &respond(200));
        assert!(!outcome.success());
        assert_eq!(
            outcome.kind,
            OutcomeKind::ExpectationMismatch {
                expected: "404".into(),
                actual: 200
            }
        );
        assert_eq!(
            outcome.message.as_deref(),
            Some("Expected 404 for non-existent product, got 200")
        );
    }

    #[test]
    fn test_valid_create_accepts_created_and_conflict() {
        assert!(classify(&create_valid(), &respond(201)).success());
        assert!(classify(&create_valid(), &respond(409)).success());
        for status in [200, 400, 404, 500, 503] {
            assert!(!classify(&create_valid(), &respond(status)).success());
        }
    }

    #[test]
    fn test_invalid_create_only_400_passes() {
        assert!(classify(&create_invalid(), &respond(400)).success());
        let accepted = classify(&create_invalid(), &respond(201));
        assert!(!accepted.success());
        assert_eq!(accepted.status, Some(201));
    }

    #[test]
    fn test_transport_error_fails_regardless_of_expectation() {
        let intent = RequestIntent::new(
            "anything",
            HttpRequest::get("/products"),
            Expectation::custom("always", |_, _| true),
        );
        let err = TransportError::new(TransportErrorKind::Timeout, "deadline elapsed", Duration::from_secs(10));
        let outcome = classify(&intent, &Err(err));

        assert!(!outcome.success());
        assert!(outcome.status.is_none());
        assert_eq!(
            outcome.kind,
            OutcomeKind::TransportError {
                error: TransportErrorKind::Timeout
            }
        );
        assert_eq!(outcome.message.as_deref(), Some("timeout: deadline elapsed"));
    }

    #[test]
    fn test_custom_predicate_sees_parsed_body() {
        let intent = RequestIntent::new(
            "list_products",
            HttpRequest::get("/products"),
            Expectation::custom("200 with 'products' field", |status, body| {
                status == 200 && body.map_or(false, |b| b.get("products").is_some())
            }),
        )
        .with_failure_template("Response missing 'products' field (status {status})");

        let good = Ok(ExecutorResponse::new(
            200,
            br#"{"count": 0, "products": []}"#.to_vec(),
            Duration::ZERO,
        ));
        assert!(classify(&intent, &good).success());

        let bad = Ok(ExecutorResponse::new(200, br#"{"count": 0}"#.to_vec(), Duration::ZERO));
        let outcome = classify(&intent, &bad);
        assert!(!outcome.success());
        assert_eq!(
            outcome.message.as_deref(),
            Some("Response missing 'products' field (status 200)")
        );
    }
}
