use std::io::Error as IoError;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

pub mod config;
pub mod repository;
pub mod service;

pub use config::ConfigError;
pub use repository::RepositoryError;
pub use service::ServiceError;

use crate::db::DatabaseError;
use crate::supervisor::Fault;

/// Message sent to clients in place of internal error details.
pub const REDACTED_MESSAGE: &str = "Internal server error";

/// Stable classification of every failure that can reach a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    PayloadTooLarge,
    Timeout,
    Internal,
}

impl ErrorKind {
    #[cfg(test)]
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::BadRequest,
        ErrorKind::Unauthorized,
        ErrorKind::Forbidden,
        ErrorKind::NotFound,
        ErrorKind::Conflict,
        ErrorKind::PayloadTooLarge,
        ErrorKind::Timeout,
        ErrorKind::Internal,
    ];

    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorKind::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Classify a status produced by a foreign error. Anything unrecognised is `Internal`.
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::BAD_REQUEST
            | StatusCode::UNSUPPORTED_MEDIA_TYPE
            | StatusCode::UNPROCESSABLE_ENTITY
            | StatusCode::METHOD_NOT_ALLOWED => ErrorKind::BadRequest,
            StatusCode::UNAUTHORIZED => ErrorKind::Unauthorized,
            StatusCode::FORBIDDEN => ErrorKind::Forbidden,
            StatusCode::NOT_FOUND => ErrorKind::NotFound,
            StatusCode::CONFLICT => ErrorKind::Conflict,
            StatusCode::PAYLOAD_TOO_LARGE => ErrorKind::PayloadTooLarge,
            StatusCode::REQUEST_TIMEOUT
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => ErrorKind::Timeout,
            _ => ErrorKind::Internal,
        }
    }
}

/// The normalized error every handler and middleware returns.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    /// Structured context for the server log; never sent to clients.
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PayloadTooLarge, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Normalize any error travelling through the actix pipeline.
    pub fn from_actix(err: &actix_web::Error) -> Self {
        if let Some(api_error) = err.as_error::<ApiError>() {
            return api_error.clone();
        }
        let status = err.as_response_error().status_code();
        Self::new(ErrorKind::from_status(status), err.to_string())
    }

    /// Client-facing message; internal details are only exposed when `expose_internal` is set.
    pub fn public_message(&self, expose_internal: bool) -> &str {
        if self.kind == ErrorKind::Internal && !expose_internal {
            REDACTED_MESSAGE
        } else if self.message.is_empty() {
            "An error occurred"
        } else {
            &self.message
        }
    }

    pub fn to_response(&self, expose_internal: bool) -> HttpResponse {
        HttpResponse::build(self.kind.status_code()).json(json!({
            "success": false,
            "message": self.public_message(expose_internal),
        }))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.kind.status_code()
    }

    fn error_response(&self) -> HttpResponse {
        self.to_response(false)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => ApiError::bad_request(msg),
            ServiceError::InvalidFields { message, fields } => {
                ApiError::bad_request(message).with_details(fields)
            }
            ServiceError::Unauthorized(msg) => ApiError::unauthorized(msg),
            ServiceError::Conflict(msg) => ApiError::conflict(msg),
            ServiceError::NotFound(msg) => ApiError::not_found(msg),
            ServiceError::Internal(msg) => ApiError::internal(msg),
            ServiceError::Repository(e) => ApiError::internal(e.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::from(ServiceError::from(errors))
    }
}

/// Failures that abort the process rather than a single request.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Server error: {0}")]
    Server(#[from] IoError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Logger error: {0}")]
    Logger(String),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Shutting down after fault: {0}")]
    Fault(Fault),
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

impl AppError {
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Server(_) | AppError::Fault(_) | AppError::Lifecycle(_) => 1,
            AppError::Config(_) => 2,
            AppError::Logger(_) => 3,
            AppError::Database(_) => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::body::to_bytes;

    use super::*;

    #[test]
    fn every_kind_maps_to_one_fixed_status() {
        let expected = [
            (ErrorKind::BadRequest, 400),
            (ErrorKind::Unauthorized, 401),
            (ErrorKind::Forbidden, 403),
            (ErrorKind::NotFound, 404),
            (ErrorKind::Conflict, 409),
            (ErrorKind::PayloadTooLarge, 413),
            (ErrorKind::Timeout, 503),
            (ErrorKind::Internal, 500),
        ];
        assert_eq!(expected.len(), ErrorKind::ALL.len());
        for (kind, status) in expected {
            assert_eq!(kind.status_code().as_u16(), status, "{kind:?}");
            assert_eq!(kind.status_code(), kind.status_code());
        }
    }

    #[test]
    fn known_statuses_round_trip_through_classification() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_status(kind.status_code()), kind);
        }
    }

    #[test]
    fn unrecognised_statuses_are_internal() {
        assert_eq!(ErrorKind::from_status(StatusCode::IM_A_TEAPOT), ErrorKind::Internal);
        assert_eq!(ErrorKind::from_status(StatusCode::BAD_GATEWAY), ErrorKind::Internal);
    }

    #[test]
    fn from_actix_preserves_api_errors() {
        let err: actix_web::Error = ApiError::conflict("taken").into();
        let normalized = ApiError::from_actix(&err);
        assert_eq!(normalized.kind, ErrorKind::Conflict);
        assert_eq!(normalized.message, "taken");
    }

    #[test]
    fn from_actix_classifies_foreign_errors() {
        let err = actix_web::error::ErrorPayloadTooLarge("too big");
        assert_eq!(ApiError::from_actix(&err).kind, ErrorKind::PayloadTooLarge);

        let err = actix_web::error::ErrorBadGateway("upstream");
        assert_eq!(ApiError::from_actix(&err).kind, ErrorKind::Internal);
    }

    #[test]
    fn internal_messages_are_redacted_unless_exposed() {
        let err = ApiError::internal("connection refused at 10.0.0.3");
        assert_eq!(err.public_message(false), REDACTED_MESSAGE);
        assert_eq!(err.public_message(true), "connection refused at 10.0.0.3");

        let err = ApiError::bad_request("bad email");
        assert_eq!(err.public_message(false), "bad email");
    }

    #[actix_web::test]
    async fn error_response_uses_envelope() {
        let response = ApiError::not_found("User not found").error_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body()).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({ "success": false, "message": "User not found" }));
    }

    #[test]
    fn service_errors_map_to_kinds() {
        let cases = [
            (ServiceError::Validation("x".into()), ErrorKind::BadRequest),
            (ServiceError::Unauthorized("x".into()), ErrorKind::Unauthorized),
            (ServiceError::Conflict("x".into()), ErrorKind::Conflict),
            (ServiceError::NotFound("x".into()), ErrorKind::NotFound),
            (ServiceError::Internal("x".into()), ErrorKind::Internal),
        ];
        for (err, kind) in cases {
            assert_eq!(ApiError::from(err).kind, kind);
        }
    }

    #[actix_web::test]
    async fn validation_details_stay_out_of_the_envelope() {
        let mut errors = validator::ValidationErrors::new();
        let mut email = validator::ValidationError::new("email");
        email.message = Some("Please enter a valid email address".into());
        errors.add("email", email);

        let err = ApiError::from(errors);
        assert_eq!(err.kind, ErrorKind::BadRequest);
        assert_eq!(err.message, "email: Please enter a valid email address");
        assert_eq!(
            err.details,
            Some(json!({ "email": ["Please enter a valid email address"] }))
        );

        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            value,
            json!({ "success": false, "message": "email: Please enter a valid email address" })
        );
    }

    #[test]
    fn exit_codes_are_non_zero() {
        assert_eq!(AppError::Server(IoError::other("bind")).exit_code(), 1);
        assert_eq!(AppError::Config("x".into()).exit_code(), 2);
        assert_eq!(AppError::Logger("x".into()).exit_code(), 3);
        assert_eq!(
            AppError::Database(DatabaseError::MigrationError("checksum".into())).exit_code(),
            4
        );
        assert_eq!(AppError::Fault(Fault::panic("boom")).exit_code(), 1);
        assert_eq!(AppError::Lifecycle("x".into()).exit_code(), 1);
    }
}
