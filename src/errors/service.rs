use serde_json::{Map, Value};
use thiserror::Error;

use super::RepositoryError;

/// Error type for service operations
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Field-level validation failures; `fields` maps each field to its reasons
    #[error("Validation error: {message}")]
    InvalidFields { message: String, fields: Value },

    /// Credentials missing, wrong, or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource already exists or conflict occurred
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Resource was not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unrecoverable internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Wrapped repository error
    #[error("Repository error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => Self::NotFound(msg),
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            RepositoryError::InvalidData(msg) => Self::Validation(msg),
            err @ RepositoryError::Database(_) => Self::Repository(err),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let reasons = errs
                    .iter()
                    .map(|e| match &e.message {
                        Some(message) => message.to_string(),
                        None => "invalid".to_string(),
                    })
                    .collect::<Vec<String>>();
                (field.to_string(), reasons)
            })
            .collect::<Vec<_>>();
        fields.sort();

        // Clients get one summary line; the per-field map is kept for the logs
        let message = fields
            .iter()
            .map(|(field, reasons)| format!("{}: {}", field, reasons.join(", ")))
            .collect::<Vec<_>>()
            .join("; ");
        let details = fields
            .into_iter()
            .map(|(field, reasons)| (field, Value::from(reasons)))
            .collect::<Map<String, Value>>();

        Self::InvalidFields {
            message,
            fields: Value::Object(details),
        }
    }
}
