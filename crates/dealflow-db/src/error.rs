//! Database-specific error types and conversions.

use dealflow_core::error::DealflowError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Record already exists: {entity}")]
    AlreadyExists { entity: String },

    /// A stored row that cannot be mapped back to a domain value.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl From<DbError> for DealflowError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => DealflowError::NotFound { entity, id },
            DbError::AlreadyExists { entity } => DealflowError::AlreadyExists { entity },
            other => DealflowError::Database(other.to_string()),
        }
    }
}
