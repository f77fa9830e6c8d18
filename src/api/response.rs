//! Response types for the salary grading API.
//!
//! This module defines the error response structures and the mapping from
//! [`EngineError`] onto HTTP status codes.

use std::collections::BTreeMap;

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::calculation::ScenarioMetrics;
use crate::error::EngineError;
use crate::models::DisplayGradeRow;

/// API error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional details about the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Every validation problem, when there is more than a single message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            errors: Vec::new(),
        }
    }

    /// Creates a new API error with details.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            details: Some(details.into()),
            ..Self::new(code, message)
        }
    }

    /// Creates a validation error response.
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// Creates a malformed JSON error response.
    pub fn malformed_json(message: impl Into<String>) -> Self {
        Self::new("MALFORMED_JSON", message)
    }

    /// Creates an unknown grading system error response.
    pub fn unknown_grading_system(id: &str) -> Self {
        Self::with_details(
            "UNKNOWN_GRADING_SYSTEM",
            format!("Grading system not found: {}", id),
            format!("The grading system '{}' is not configured for this service", id),
        )
    }
}

/// API error with HTTP status code.
#[derive(Debug)]
pub struct ApiErrorResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The error body.
    pub error: ApiError,
}

impl ApiErrorResponse {
    /// A 400 response carrying `error`.
    pub fn bad_request(error: ApiError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error,
        }
    }

    /// A 404 response carrying `error`.
    pub fn not_found(error: ApiError) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error,
        }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "application/json")],
            Json(self.error),
        )
            .into_response()
    }
}

impl From<EngineError> for ApiErrorResponse {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::ConfigNotFound { path } => ApiErrorResponse {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: ApiError::with_details(
                    "CONFIG_ERROR",
                    "Configuration error",
                    format!("Configuration file not found: {}", path),
                ),
            },
            EngineError::ConfigParseError { path, message } => ApiErrorResponse {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: ApiError::with_details(
                    "CONFIG_ERROR",
                    "Configuration parse error",
                    format!("Failed to parse {}: {}", path, message),
                ),
            },
            EngineError::Configuration { message } => ApiErrorResponse::not_found(
                ApiError::with_details(
                    "NOT_CONFIGURED",
                    "No position levels are configured",
                    message,
                ),
            ),
            EngineError::InvalidInput { field, message } => {
                ApiErrorResponse::bad_request(ApiError::with_details(
                    "INVALID_INPUT",
                    format!("Invalid value for '{}': {}", field, message),
                    field,
                ))
            }
            EngineError::Validation { errors } => ApiErrorResponse::bad_request(ApiError {
                errors,
                ..ApiError::validation_error("Validation failed")
            }),
            EngineError::InvalidState {
                scenario_id,
                message,
            } => ApiErrorResponse::bad_request(ApiError::with_details(
                "INVALID_STATE",
                message,
                format!("Scenario {} cannot make this transition", scenario_id),
            )),
            EngineError::Conflict {
                grading_system,
                message,
            } => ApiErrorResponse {
                status: StatusCode::CONFLICT,
                error: ApiError::with_details(
                    "CONFLICT",
                    format!("Grading system '{}' {}", grading_system, message),
                    "Reload the scenario and retry",
                ),
            },
            EngineError::ScenarioNotFound { id } => ApiErrorResponse::not_found(ApiError::new(
                "SCENARIO_NOT_FOUND",
                format!("Scenario not found: {}", id),
            )),
            EngineError::GradingSystemNotFound { id } => {
                ApiErrorResponse::not_found(ApiError::unknown_grading_system(&id))
            }
            EngineError::Persistence { message } => ApiErrorResponse {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: ApiError::with_details("PERSISTENCE_ERROR", "Storage failure", message),
            },
        }
    }
}

/// Successful `calculate` response.
#[derive(Debug, Clone, Serialize)]
pub struct CalculateResponse {
    /// Grades keyed by level name; zero points render as `""`.
    pub calculated_outputs: BTreeMap<String, DisplayGradeRow>,
    /// Level names, highest authority first.
    pub level_order: Vec<String>,
    /// Averages and scores of the submitted rates.
    pub metrics: ScenarioMetrics,
    /// Always `true`.
    pub success: bool,
}

/// Failed `calculate` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateFailure {
    /// Every validation problem.
    pub errors: Vec<String>,
    /// Always `false`.
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_api_error_serialization() {
        let error = ApiError::new("TEST_ERROR", "Test message");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"code\":\"TEST_ERROR\""));
        assert!(json.contains("\"message\":\"Test message\""));
        assert!(!json.contains("details"));
        assert!(!json.contains("errors"));
    }

    #[test]
    fn test_validation_errors_are_listed() {
        let api_error: ApiErrorResponse = EngineError::Validation {
            errors: vec!["first".to_string(), "second".to_string()],
        }
        .into();
        assert_eq!(api_error.status, StatusCode::BAD_REQUEST);
        assert_eq!(api_error.error.code, "VALIDATION_ERROR");
        assert_eq!(api_error.error.errors, vec!["first", "second"]);
    }

    #[test]
    fn test_status_mapping() {
        let id = Uuid::new_v4();
        let cases = vec![
            (
                EngineError::Configuration {
                    message: "none".to_string(),
                },
                StatusCode::NOT_FOUND,
            ),
            (EngineError::ScenarioNotFound { id }, StatusCode::NOT_FOUND),
            (
                EngineError::GradingSystemNotFound {
                    id: "x".to_string(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                EngineError::InvalidState {
                    scenario_id: id,
                    message: "not a draft".to_string(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                EngineError::Conflict {
                    grading_system: "standard".to_string(),
                    message: "raced".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (
                EngineError::Persistence {
                    message: "disk".to_string(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            let response: ApiErrorResponse = error.into();
            assert_eq!(response.status, status, "{:?}", response.error);
        }
    }

    #[test]
    fn test_unknown_grading_system_code() {
        let response: ApiErrorResponse = EngineError::GradingSystemNotFound {
            id: "nope".to_string(),
        }
        .into();
        assert_eq!(response.error.code, "UNKNOWN_GRADING_SYSTEM");
        assert!(response.error.message.contains("nope"));
    }
}
