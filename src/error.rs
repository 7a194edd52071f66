//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Fatal setup-time errors: model registration and route binding refuse to
/// proceed rather than mis-route at serve time.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("model '{model}': operations {first} and {second} both use {method}")]
    MethodConflict {
        model: String,
        first: &'static str,
        second: &'static str,
        method: String,
    },
    #[error("model '{model}': duplicate field code '{code}'")]
    DuplicateField { model: String, code: String },
    #[error("model '{model}' declares no fields")]
    EmptyModel { model: String },
    #[error("invalid http method '{method}' for {operation} on model '{model}'")]
    InvalidMethod {
        model: String,
        operation: &'static str,
        method: String,
    },
}

/// Per-request errors. Every variant surfaces as a failure envelope; the
/// transaction for the request is rolled back before the handler returns.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("condition: {0}")]
    Compile(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Validation(_) | AppError::Compile(_) | AppError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::Db(e) => {
                // Internal cause goes to the log, not the caller.
                tracing::error!(error = %e, "store failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal storage error".to_string())
            }
        };
        (status, Json(crate::response::Envelope::fail(msg))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_conflict_names_both_operations() {
        let e = ConfigError::MethodConflict {
            model: "Order".into(),
            first: "create",
            second: "update",
            method: "POST".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("create"));
        assert!(msg.contains("update"));
        assert!(msg.contains("POST"));
    }

    #[test]
    fn db_errors_hide_internal_detail() {
        let resp = AppError::Db(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
