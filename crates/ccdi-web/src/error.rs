//! HTTP error envelope.
//!
//! Every failure is rendered as `{"errors": [ { "kind": ..., ... } ]}` with
//! a status code chosen by the error kind.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use ccdi_common::FederationError;

/// Placeholder reported instead of the rejected field name.
const WRONG_FIELD: &str = "wrong field";

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct ErrorDetail {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorsResponse {
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug)]
pub enum ApiError {
    Federation(FederationError),
    InvalidRoute { method: String, route: String },
}

impl From<FederationError> for ApiError {
    fn from(e: FederationError) -> Self {
        ApiError::Federation(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRoute { .. } => StatusCode::NOT_FOUND,
            ApiError::Federation(e) => match e {
                FederationError::UnsupportedField { .. }
                | FederationError::InvalidParameters { .. } => StatusCode::BAD_REQUEST,
                FederationError::NotFound { .. } => StatusCode::NOT_FOUND,
                FederationError::DataUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                FederationError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn detail(&self) -> ErrorDetail {
        let e = match self {
            ApiError::InvalidRoute { method, route } => {
                return ErrorDetail {
                    kind: "InvalidRoute",
                    message: Some(format!("Invalid route: {method} {route}")),
                    method: Some(method.clone()),
                    route: Some(route.clone()),
                    ..ErrorDetail::default()
                }
            }
            ApiError::Federation(e) => e,
        };
        match e {
            FederationError::UnsupportedField { entity, .. } => ErrorDetail {
                kind: "UnsupportedField",
                message: Some(format!(
                    "Field is not supported: a field is not present for {}.",
                    entity.display_name()
                )),
                field: Some(WRONG_FIELD.to_string()),
                reason: Some("The requested field is not found.".to_string()),
                ..ErrorDetail::default()
            },
            FederationError::InvalidParameters { parameters, reason } => ErrorDetail {
                kind: "InvalidParameters",
                message: Some("Invalid query parameter(s) provided.".to_string()),
                parameters: Some(parameters.clone()),
                reason: Some(reason.clone()),
                ..ErrorDetail::default()
            },
            FederationError::NotFound { entity, .. } => ErrorDetail {
                kind: "NotFound",
                message: Some(format!("{} not found.", entity.display_name())),
                entity: Some(entity.display_name().to_string()),
                reason: Some("The requested resource does not exist.".to_string()),
                ..ErrorDetail::default()
            },
            FederationError::DataUnavailable(_) => ErrorDetail {
                kind: "ServiceUnavailable",
                message: Some(e.to_string()),
                reason: Some("The data source is currently unavailable.".to_string()),
                ..ErrorDetail::default()
            },
            FederationError::Timeout(_) => ErrorDetail {
                kind: "InternalServerError",
                message: Some(e.to_string()),
                ..ErrorDetail::default()
            },
            // Internal details stay in the logs.
            _ => ErrorDetail {
                kind: "InternalServerError",
                message: Some("An error occurred.".to_string()),
                ..ErrorDetail::default()
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Federation(e) if status.is_server_error() => {
                error!(status = status.as_u16(), error = %e, "request failed")
            }
            ApiError::Federation(e) => warn!(status = status.as_u16(), error = %e, "request rejected"),
            ApiError::InvalidRoute { method, route } => warn!(%method, %route, "invalid route"),
        }
        let body = ErrorsResponse { errors: vec![self.detail()] };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use ccdi_common::{EntityType, FieldUse};
    use serde_json::json;

    #[test]
    fn test_status_codes() {
        let cases = [
            (FederationError::invalid_parameter("page", "bad"), 400),
            (FederationError::NotFound { entity: EntityType::File, identifier: "x".into() }, 404),
            (FederationError::DataUnavailable("refused".into()), 503),
            (FederationError::Timeout(Duration::from_secs(60)), 504),
            (FederationError::InternalConsistency("sum".into()), 500),
            (FederationError::Database("syntax".into()), 500),
        ];
        for (e, code) in cases {
            assert_eq!(ApiError::from(e).status().as_u16(), code);
        }
    }

    #[test]
    fn test_unavailable_kind_matches_status() {
        let e = ApiError::from(FederationError::DataUnavailable("refused".into()));
        assert_eq!(e.status(), StatusCode::SERVICE_UNAVAILABLE);
        let v = serde_json::to_value(e.detail()).unwrap();
        assert_eq!(v["kind"], json!("ServiceUnavailable"));
    }

    #[test]
    fn test_unsupported_field_hides_the_field() {
        let e = ApiError::from(FederationError::UnsupportedField {
            entity: EntityType::Sample,
            field: "secret_column".into(),
            usage: FieldUse::Count,
        });
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
        let v = serde_json::to_value(e.detail()).unwrap();
        assert_eq!(v["kind"], json!("UnsupportedField"));
        assert_eq!(v["field"], json!("wrong field"));
        assert!(!v.to_string().contains("secret_column"));
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let v = serde_json::to_value(
            ApiError::from(FederationError::invalid_parameter("per_page", "must be at least 1"))
                .detail(),
        )
        .unwrap();
        assert_eq!(
            v,
            json!({
                "kind": "InvalidParameters",
                "message": "Invalid query parameter(s) provided.",
                "parameters": ["per_page"],
                "reason": "must be at least 1"
            })
        );
    }

    #[test]
    fn test_internal_details_not_exposed() {
        let e = ApiError::from(FederationError::Database("MATCH (p) secret".into()));
        assert_eq!(e.detail().message.as_deref(), Some("An error occurred."));
    }
}
