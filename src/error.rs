//! # Error Handling
//!
//! Repository-level error kinds returned by every data-access operation, and the
//! problem+json `ApiError` the HTTP collaborator renders them as. Database
//! details are logged, never exposed in a response body.

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, RuntimeErr, SqlErr};
use serde::Serialize;
use thiserror::Error;

use crate::telemetry;

/// Prefix carried by `DbErr::Custom` messages raised by a completed or
/// read-only unit of work.
pub(crate) const UNIT_OF_WORK_ERROR_PREFIX: &str = "unit of work: ";

/// Coarse classification of a [`RepositoryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    ConstraintViolation,
    ValidationError,
    InvalidUnitOfWorkState,
    InternalError,
}

impl ErrorKind {
    /// Stable label used for metrics and error codes
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::ConstraintViolation => "constraint_violation",
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::InvalidUnitOfWorkState => "invalid_unit_of_work_state",
            ErrorKind::InternalError => "internal_error",
        }
    }
}

/// Errors returned by repositories, units of work and services.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0}")]
    NotFound(String),
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid unit of work state: {0}")]
    InvalidUnitOfWorkState(String),
    #[error("database error: {0}")]
    Database(DbErr),
}

impl RepositoryError {
    /// Classify a driver error. Not-found, unique and foreign-key failures get
    /// their own kinds; everything else stays an internal database error.
    pub fn database_error(error: DbErr) -> Self {
        let classified = match error {
            DbErr::RecordNotFound(record) => Self::NotFound(record),
            DbErr::RecordNotUpdated => Self::not_found(),
            DbErr::Custom(message) if message.starts_with(UNIT_OF_WORK_ERROR_PREFIX) => {
                Self::InvalidUnitOfWorkState(
                    message[UNIT_OF_WORK_ERROR_PREFIX.len()..].to_string(),
                )
            }
            error => match error.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(detail))
                | Some(SqlErr::ForeignKeyConstraintViolation(detail)) => {
                    Self::ConstraintViolation(detail)
                }
                _ if is_unique_violation(&error) || is_foreign_key_violation(&error) => {
                    Self::ConstraintViolation(error.to_string())
                }
                _ => Self::Database(error),
            },
        };

        metrics::counter!("repository_errors_total", "kind" => classified.kind().as_str())
            .increment(1);
        classified
    }

    /// Build a validation error from a message
    pub fn validation_error<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Build the canonical "record not found" error
    pub fn not_found() -> Self {
        Self::NotFound("record not found".to_string())
    }

    /// The kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            RepositoryError::NotFound(_) => ErrorKind::NotFound,
            RepositoryError::ConstraintViolation(_) => ErrorKind::ConstraintViolation,
            RepositoryError::Validation(_) => ErrorKind::ValidationError,
            RepositoryError::InvalidUnitOfWorkState(_) => ErrorKind::InvalidUnitOfWorkState,
            RepositoryError::Database(_) => ErrorKind::InternalError,
        }
    }
}

fn database_error_code(error: &DbErr) -> Option<String> {
    let runtime_err = match error {
        DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return None,
    };

    runtime_err
        .as_database_error()
        .and_then(|db_error| db_error.code().map(|code| code.into_owned()))
}

fn is_unique_violation(error: &DbErr) -> bool {
    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    database_error_code(error)
        .is_some_and(|code| code == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code.as_str()))
}

fn is_foreign_key_violation(error: &DbErr) -> bool {
    const PG_FOREIGN_KEY: &str = "23503";
    const SQLITE_FOREIGN_KEY: &str = "787";

    database_error_code(error).is_some_and(|code| code == PG_FOREIGN_KEY || code == SQLITE_FOREIGN_KEY)
}

/// Unified API error response structure
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new<S: Into<String>>(status: StatusCode, code: S, message: S) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            trace_id: Self::current_trace_id(),
        }
    }

    /// Extract current trace ID from the active trace context (falls back to a generated correlation ID)
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                Some(format!("corr-{}", &uuid::Uuid::new_v4().to_string()[..8]).into_boxed_str())
            })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        match &error {
            RepositoryError::NotFound(message) => {
                Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message.as_str())
            }
            RepositoryError::Validation(message) => {
                Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message.as_str())
            }
            RepositoryError::ConstraintViolation(_) => {
                tracing::debug!(?error, "Constraint violation detected");
                Self::new(StatusCode::CONFLICT, "CONFLICT", "Resource already exists")
            }
            RepositoryError::InvalidUnitOfWorkState(_) | RepositoryError::Database(_) => {
                tracing::error!(?error, "Internal repository error");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "An internal error occurred",
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_not_found_maps_to_not_found() {
        let error = RepositoryError::database_error(DbErr::RecordNotFound("campus drive".into()));
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(error.to_string(), "campus drive");
    }

    #[test]
    fn test_record_not_updated_maps_to_not_found() {
        let error = RepositoryError::database_error(DbErr::RecordNotUpdated);
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_unit_of_work_custom_error_is_classified() {
        let error = RepositoryError::database_error(DbErr::Custom(format!(
            "{UNIT_OF_WORK_ERROR_PREFIX}already committed"
        )));
        assert_eq!(error.kind(), ErrorKind::InvalidUnitOfWorkState);
        assert!(error.to_string().contains("already committed"));
    }

    #[test]
    fn test_other_errors_are_internal() {
        let error = RepositoryError::database_error(DbErr::Custom("boom".into()));
        assert_eq!(error.kind(), ErrorKind::InternalError);
    }

    #[test]
    fn test_api_error_status_mapping() {
        let cases = [
            (RepositoryError::not_found(), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (
                RepositoryError::validation_error("name is required"),
                StatusCode::BAD_REQUEST,
                "VALIDATION_FAILED",
            ),
            (
                RepositoryError::ConstraintViolation("duplicate code".into()),
                StatusCode::CONFLICT,
                "CONFLICT",
            ),
            (
                RepositoryError::InvalidUnitOfWorkState("committed".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
            ),
            (
                RepositoryError::Database(DbErr::Custom("secret detail".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
            ),
        ];

        for (error, status, code) in cases {
            let api_error = ApiError::from(error);
            assert_eq!(api_error.status, status);
            assert_eq!(api_error.code.as_ref(), code);
            assert!(!api_error.message.contains("secret"));
        }
    }

    #[test]
    fn test_content_type_header() {
        let error: ApiError = RepositoryError::not_found().into();
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/problem+json"
        );
    }

    #[tokio::test]
    async fn test_trace_id_comes_from_active_context() {
        let context = telemetry::TraceContext {
            trace_id: "trace-abc".to_string(),
        };
        let error = telemetry::with_trace_context(context, async {
            ApiError::from(RepositoryError::not_found())
        })
        .await;
        assert_eq!(error.trace_id.as_deref(), Some("trace-abc"));
    }

    #[test]
    fn test_trace_id_generation() {
        let error = ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", "bad");
        let trace_id = error.trace_id.unwrap();
        assert!(trace_id.starts_with("corr-"));
        assert_eq!(trace_id.len(), 13);
    }
}
