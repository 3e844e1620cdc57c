//! Exception translation.
//!
//! Converts protocol errors and handler failures into HTTP responses whose
//! body is always an `OperationOutcome` document. Internal errors are
//! logged with their source chain and leave the wire with a generic text.

use bytes::Bytes;
use http::{header, Response, StatusCode};
use http_body_util::Full;
use serde_json::Value;

use galen_core::{FhirError, OperationOutcome};

/// Response body type.
pub type ResponseBody = Full<Bytes>;

/// HTTP response type.
pub type HttpResponse = Response<ResponseBody>;

/// The FHIR JSON media type.
pub const FHIR_JSON: &str = "application/fhir+json";

/// Emitted when even outcome serialization fails.
const FALLBACK_BODY: &str = concat!(
    r#"{"resourceType":"OperationOutcome","issue":[{"severity":"error","#,
    r#""code":"exception","details":{"text":"An internal error occurred"}}]}"#
);

/// Converts a protocol error into an HTTP response.
///
/// Internal errors are logged here with their full source chain; the wire
/// body never carries internal detail.
#[must_use]
pub fn error_response(error: &FhirError, pretty: bool) -> HttpResponse {
    if let FhirError::Internal { message, source } = error {
        match source {
            Some(source) => {
                tracing::error!(error = %message, source = ?source, "internal error");
            }
            None => tracing::error!(error = %message, "internal error"),
        }
    }

    outcome_response(error.status_code(), &error.operation_outcome(), pretty)
}

/// Serializes an `OperationOutcome` as the response body.
#[must_use]
pub fn outcome_response(
    status: StatusCode,
    outcome: &OperationOutcome,
    pretty: bool,
) -> HttpResponse {
    let body = serialize(outcome, pretty).unwrap_or_else(|| FALLBACK_BODY.to_string());
    with_fhir_body(status, body, None)
}

/// Serializes a resource value as the response body.
#[must_use]
pub fn resource_response(
    status: StatusCode,
    value: &Value,
    pretty: bool,
    location: Option<&str>,
) -> HttpResponse {
    match serialize(value, pretty) {
        Some(body) => with_fhir_body(status, body, location),
        None => outcome_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &FhirError::internal("failed to serialize response resource").operation_outcome(),
            pretty,
        ),
    }
}

/// Builds an empty-body response, for delete.
#[must_use]
pub fn empty_response(status: StatusCode) -> HttpResponse {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

fn serialize<T: serde::Serialize>(value: &T, pretty: bool) -> Option<String> {
    let result = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match result {
        Ok(body) => Some(body),
        Err(e) => {
            tracing::error!(error = %e, "response serialization failed");
            None
        }
    }
}

fn with_fhir_body(status: StatusCode, body: String, location: Option<&str>) -> HttpResponse {
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, FHIR_JSON);
    if let Some(location) = location {
        builder = builder.header(header::LOCATION, location);
    }
    builder
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from(FALLBACK_BODY))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use galen_core::{IssueCode, IssueSeverity};
    use http_body_util::BodyExt;

    async fn body_json(response: HttpResponse) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_translates_to_404_outcome() {
        let error = FhirError::not_found("Patient", Some("p1"));
        let response = error_response(&error, false);

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            FHIR_JSON
        );

        let body = body_json(response).await;
        assert_eq!(body["resourceType"], "OperationOutcome");
        assert_eq!(body["issue"].as_array().unwrap().len(), 1);
        assert_eq!(body["issue"][0]["code"], "not-found");
        assert_eq!(body["issue"][0]["severity"], "error");
    }

    #[tokio::test]
    async fn test_internal_error_detail_not_leaked() {
        let error = FhirError::internal_with_source(
            "database exploded at 10.0.0.5",
            std::io::Error::new(std::io::ErrorKind::Other, "secret detail"),
        );
        let response = error_response(&error, false);

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        let text = body["issue"][0]["details"]["text"].as_str().unwrap();
        assert!(!text.contains("database"));
        assert!(!text.contains("secret"));
        assert_eq!(body["issue"][0]["code"], "exception");
    }

    #[tokio::test]
    async fn test_pretty_serialization() {
        let outcome =
            OperationOutcome::single(IssueSeverity::Error, IssueCode::Invalid, "bad input");
        let compact = outcome_response(StatusCode::BAD_REQUEST, &outcome, false);
        let pretty = outcome_response(StatusCode::BAD_REQUEST, &outcome, true);

        let compact_bytes = compact.into_body().collect().await.unwrap().to_bytes();
        let pretty_bytes = pretty.into_body().collect().await.unwrap().to_bytes();
        assert!(!compact_bytes.iter().any(|b| *b == b'\n'));
        assert!(pretty_bytes.iter().any(|b| *b == b'\n'));
    }

    #[tokio::test]
    async fn test_location_header_attached() {
        let value = serde_json::json!({"resourceType": "Patient", "id": "p1"});
        let response = resource_response(
            StatusCode::CREATED,
            &value,
            false,
            Some("http://localhost:8080/Patient/p1/_history/1"),
        );

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "http://localhost:8080/Patient/p1/_history/1"
        );
    }

    #[test]
    fn test_fallback_body_is_valid_json() {
        let parsed: Value = serde_json::from_str(FALLBACK_BODY).unwrap();
        assert_eq!(parsed["resourceType"], "OperationOutcome");
    }
}
