//! Activity log domain model.
//!
//! Activities are the audit trail of deal lifecycle changes. They are
//! append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    StageChange,
    DealArchived,
    DealLost,
    DealRestored,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::StageChange => "stage_change",
            ActivityType::DealArchived => "deal_archived",
            ActivityType::DealLost => "deal_lost",
            ActivityType::DealRestored => "deal_restored",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stage_change" => Some(ActivityType::StageChange),
            "deal_archived" => Some(ActivityType::DealArchived),
            "deal_lost" => Some(ActivityType::DealLost),
            "deal_restored" => Some(ActivityType::DealRestored),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub activity_type: ActivityType,
    pub subject: String,
    pub description: String,
    pub deal_id: Uuid,
    /// Acting user, if known.
    pub user_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

/// Fields required to append an activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateActivity {
    pub tenant_id: Uuid,
    pub activity_type: ActivityType,
    pub subject: String,
    pub description: String,
    pub deal_id: Uuid,
    pub user_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}
