//! Deal domain model.
//!
//! A deal is a sales opportunity owned by a tenant. Its lifecycle status
//! is a single tagged value, so a deal is always in exactly one of
//! `open`, `archived` or `lost`. The flag-and-timestamp view used by
//! listings and the store is derived from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_PROBABILITY: u8 = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DealPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl DealPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealPriority::Low => "low",
            DealPriority::Medium => "medium",
            DealPriority::High => "high",
            DealPriority::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(DealPriority::Low),
            "medium" => Some(DealPriority::Medium),
            "high" => Some(DealPriority::High),
            "urgent" => Some(DealPriority::Urgent),
            _ => None,
        }
    }
}

/// Lifecycle status of a deal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DealStatus {
    #[default]
    Open,
    Archived {
        reason: Option<String>,
        at: DateTime<Utc>,
    },
    Lost {
        reason: String,
        at: DateTime<Utc>,
        /// Stage the deal was in when it was lost. Frozen at that moment.
        stage_at_loss: String,
    },
}

impl DealStatus {
    /// Lower-case label (`open`, `archived`, `lost`) as persisted.
    pub fn label(&self) -> &'static str {
        match self {
            DealStatus::Open => "open",
            DealStatus::Archived { .. } => "archived",
            DealStatus::Lost { .. } => "lost",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, DealStatus::Open)
    }

    pub fn is_archived(&self) -> bool {
        matches!(self, DealStatus::Archived { .. })
    }

    pub fn is_lost(&self) -> bool {
        matches!(self, DealStatus::Lost { .. })
    }

    pub fn archived_at(&self) -> Option<DateTime<Utc>> {
        match self {
            DealStatus::Archived { at, .. } => Some(*at),
            _ => None,
        }
    }

    pub fn archive_reason(&self) -> Option<&str> {
        match self {
            DealStatus::Archived { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }

    pub fn lost_at(&self) -> Option<DateTime<Utc>> {
        match self {
            DealStatus::Lost { at, .. } => Some(*at),
            _ => None,
        }
    }

    pub fn loss_reason(&self) -> Option<&str> {
        match self {
            DealStatus::Lost { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub fn stage_at_loss(&self) -> Option<&str> {
        match self {
            DealStatus::Lost { stage_at_loss, .. } => Some(stage_at_loss),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    /// Monetary value, never negative.
    pub value: f64,
    /// Raw stage label as stored. Not necessarily canonical.
    pub stage: String,
    pub priority: DealPriority,
    /// Win probability in percent, 0..=100.
    pub probability: u8,
    #[serde(flatten)]
    pub status: DealStatus,
    /// Weak reference to a contact; the deal does not own it.
    pub contact_id: Option<Uuid>,
    /// User the deal is assigned to.
    pub owner_id: Option<Uuid>,
    pub expected_close_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deal {
    /// Neither archived nor lost.
    pub fn is_active(&self) -> bool {
        self.status.is_open()
    }

    pub fn is_archived(&self) -> bool {
        self.status.is_archived()
    }

    pub fn is_lost(&self) -> bool {
        self.status.is_lost()
    }
}

/// Fields required to persist a new deal.
///
/// Values here are already normalised: the stage is resolved and the
/// probability clamped. New deals always start `open`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeal {
    pub tenant_id: Uuid,
    pub name: String,
    pub value: f64,
    pub stage: String,
    pub priority: DealPriority,
    pub probability: u8,
    pub contact_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
    pub expected_close_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Fields that can be updated on an existing deal.
///
/// Lifecycle status is deliberately absent; it changes only through
/// [`DealRepository::update_status`](crate::repository::DealRepository::update_status).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateDeal {
    pub name: Option<String>,
    pub value: Option<f64>,
    pub stage: Option<String>,
    pub priority: Option<DealPriority>,
    pub probability: Option<u8>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub contact_id: Option<Option<Uuid>>,
    pub owner_id: Option<Option<Uuid>>,
    pub expected_close_at: Option<Option<DateTime<Utc>>>,
    pub description: Option<Option<String>>,
    pub metadata: Option<serde_json::Value>,
}

impl UpdateDeal {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.value.is_none()
            && self.stage.is_none()
            && self.priority.is_none()
            && self.probability.is_none()
            && self.contact_id.is_none()
            && self.owner_id.is_none()
            && self.expected_close_at.is_none()
            && self.description.is_none()
            && self.metadata.is_none()
    }
}

/// Clamp a raw probability into `0..=100`.
pub fn clamp_probability(raw: i64) -> u8 {
    raw.clamp(0, i64::from(MAX_PROBABILITY)) as u8
}
