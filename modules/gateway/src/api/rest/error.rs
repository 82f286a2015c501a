//! Domain-error to RFC 9457 Problem mapping.

use axum::response::{IntoResponse, Response};
use http::{header, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::domain::error::DomainError;

/// Content type for Problem Details as per RFC 9457.
pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

/// RFC 9457 Problem Details body, reduced to the fields this surface emits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[must_use]
pub struct Problem {
    /// A URI reference that identifies the problem type.
    #[serde(rename = "type")]
    pub type_url: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    /// The request path this occurrence belongs to.
    pub instance: String,
    /// Machine-readable error code.
    pub code: String,
    pub trace_id: Option<String>,
}

impl Problem {
    pub fn new(
        status: StatusCode,
        code: impl Into<String>,
        title: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            type_url: "about:blank".to_owned(),
            title: title.into(),
            status: status.as_u16(),
            detail: detail.into(),
            instance: String::new(),
            code: code.into(),
            trace_id: None,
        }
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = instance.into();
        self
    }

    fn with_trace(mut self, trace_id: Option<String>) -> Self {
        self.trace_id = trace_id;
        self
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::to_vec(&self).unwrap_or_default();
        (
            status,
            [(header::CONTENT_TYPE, APPLICATION_PROBLEM_JSON)],
            body,
        )
            .into_response()
    }
}

/// Map a domain error to its wire representation at `instance`.
pub fn domain_error_to_problem(e: &DomainError, instance: &str) -> Problem {
    let trace_id = tracing::Span::current()
        .id()
        .map(|id| id.into_u64().to_string());

    let problem = match e {
        DomainError::NotFound(handle) => Problem::new(
            StatusCode::NOT_FOUND,
            "GATEWAY_NOT_FOUND",
            "Unknown handle",
            format!("no session or resource with handle '{handle}'"),
        ),
        DomainError::TypeMismatch { id, expected } => Problem::new(
            StatusCode::CONFLICT,
            "GATEWAY_TYPE_MISMATCH",
            "Resource kind mismatch",
            format!("resource '{id}' is not a {expected}"),
        ),
        DomainError::Connection(msg) => Problem::new(
            StatusCode::BAD_GATEWAY,
            "GATEWAY_CONNECTION",
            "Coordination connection failed",
            msg.clone(),
        ),
        DomainError::Discovery(msg) => Problem::new(
            StatusCode::BAD_GATEWAY,
            "GATEWAY_DISCOVERY",
            "Discovery operation failed",
            msg.clone(),
        ),
        DomainError::NoInstancesAvailable(service) => Problem::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "GATEWAY_NO_INSTANCES",
            "No instances available",
            format!("no instances available for service '{service}'"),
        ),
        DomainError::Cancelled => Problem::new(
            StatusCode::BAD_REQUEST,
            "GATEWAY_CANCELLED",
            "Operation cancelled",
            "the operation was cancelled before it completed",
        ),
        DomainError::Internal(err) => {
            error!(error = ?err, "internal error reached the wire");
            Problem::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "GATEWAY_INTERNAL",
                "Internal error",
                "an internal error occurred",
            )
        }
    };
    problem.with_instance(instance).with_trace(trace_id)
}

/// So `?` works in handlers.
impl From<DomainError> for Problem {
    fn from(e: DomainError) -> Self {
        domain_error_to_problem(&e, "/")
    }
}
