//! SurrealDB repository implementations.

mod activity;
mod deal;
mod stage;

pub use activity::SurrealActivityRepository;
pub use deal::SurrealDealRepository;
pub use stage::SurrealPipelineStageRepository;

use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::InvalidRecord(format!("invalid {what} UUID: {e}")))
}

fn parse_optional_uuid(raw: Option<String>, what: &str) -> Result<Option<Uuid>, DbError> {
    raw.as_deref().map(|s| parse_uuid(s, what)).transpose()
}

fn probability_from_row(raw: i64, what: &str) -> Result<u8, DbError> {
    u8::try_from(raw)
        .ok()
        .filter(|p| *p <= 100)
        .ok_or_else(|| DbError::InvalidRecord(format!("{what} out of range: {raw}")))
}
