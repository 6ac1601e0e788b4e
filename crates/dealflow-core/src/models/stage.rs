//! Pipeline stage domain model.
//!
//! Stages are tenant-configurable. A tenant with no stages of its own
//! falls back to a built-in set which is never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted, tenant-defined pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStage {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Unique within the tenant.
    pub name: String,
    /// Display order; the lowest order is the fallback bucket.
    pub order: i32,
    /// Default probability offered when a deal enters this stage.
    pub probability_hint: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePipelineStage {
    pub tenant_id: Uuid,
    pub name: String,
    pub order: i32,
    pub probability_hint: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdatePipelineStage {
    pub name: Option<String>,
    pub order: Option<i32>,
    pub probability_hint: Option<u8>,
}

/// A stage as seen by the engine, whether tenant-defined or built in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageDefinition {
    pub name: String,
    pub order: i32,
    pub probability_hint: u8,
}

impl StageDefinition {
    pub fn new(name: impl Into<String>, order: i32, probability_hint: u8) -> Self {
        Self {
            name: name.into(),
            order,
            probability_hint,
        }
    }
}

impl From<PipelineStage> for StageDefinition {
    fn from(stage: PipelineStage) -> Self {
        Self {
            name: stage.name,
            order: stage.order,
            probability_hint: stage.probability_hint,
        }
    }
}
