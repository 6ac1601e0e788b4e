//! Error types for the deal engine.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DealflowError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    /// A lifecycle action the deal's current status does not allow.
    #[error("Cannot {action} a deal that is {status}")]
    InvalidTransition { action: String, status: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DealflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

pub type DealflowResult<T> = Result<T, DealflowError>;
