//! Deal lifecycle state machine.
//!
//! A deal is in exactly one of three states:
//!
//! | action    | from               | to         |
//! |-----------|--------------------|------------|
//! | archive   | open               | archived   |
//! | mark lost | open, archived     | lost       |
//! | restore   | archived, lost     | open       |
//!
//! Any other combination is an [`EngineError::InvalidTransition`], except
//! restoring an open deal, which is a no-op. Stage moves are allowed in
//! every state and never touch the frozen `stage_at_loss`.
//!
//! Each persisted change appends one activity when an acting user is
//! known.

use chrono::{DateTime, Utc};
use dealflow_core::error::DealflowResult;
use dealflow_core::models::activity::{ActivityType, CreateActivity};
use dealflow_core::models::deal::{Deal, DealStatus, UpdateDeal};
use dealflow_core::repository::{ActivityRepository, DealRepository, PipelineStageRepository};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::service::{DealService, validate_stage};

fn non_blank(reason: Option<&str>) -> Option<String> {
    reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
}

/// Status after archiving.
pub fn archive_status(
    current: &DealStatus,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<DealStatus, EngineError> {
    match current {
        DealStatus::Open => Ok(DealStatus::Archived {
            reason: non_blank(reason),
            at: now,
        }),
        other => Err(EngineError::InvalidTransition {
            action: "archive",
            status: other.label(),
        }),
    }
}

/// Status after marking lost at `stage`. The reason is mandatory.
pub fn lost_status(
    current: &DealStatus,
    stage: &str,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<DealStatus, EngineError> {
    let reason = non_blank(Some(reason)).ok_or(EngineError::MissingLossReason)?;
    match current {
        DealStatus::Open | DealStatus::Archived { .. } => Ok(DealStatus::Lost {
            reason,
            at: now,
            stage_at_loss: stage.to_string(),
        }),
        DealStatus::Lost { .. } => Err(EngineError::InvalidTransition {
            action: "mark lost",
            status: "lost",
        }),
    }
}

/// Status after restoring, or `None` if the deal is already open.
pub fn restored_status(current: &DealStatus) -> Option<DealStatus> {
    match current {
        DealStatus::Open => None,
        DealStatus::Archived { .. } | DealStatus::Lost { .. } => Some(DealStatus::Open),
    }
}

impl<D, S, A> DealService<D, S, A>
where
    D: DealRepository,
    S: PipelineStageRepository,
    A: ActivityRepository,
{
    /// Move a deal to another stage. Moving to the current stage does
    /// nothing.
    pub async fn move_stage(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        new_stage: &str,
        user_id: Option<Uuid>,
    ) -> DealflowResult<Deal> {
        let new_stage = validate_stage(new_stage)?;
        let current = self.deals.get_by_id(tenant_id, id).await?;

        if current.stage == new_stage {
            debug!(tenant_id = %tenant_id, deal_id = %id, stage = %new_stage, "Stage unchanged");
            return Ok(current);
        }

        let deal = self
            .deals
            .update(
                tenant_id,
                id,
                UpdateDeal {
                    stage: Some(new_stage),
                    ..Default::default()
                },
            )
            .await?;

        info!(
            tenant_id = %tenant_id,
            deal_id = %id,
            from = %current.stage,
            to = %deal.stage,
            "Deal stage changed"
        );
        self.record_activity(
            &deal,
            user_id,
            ActivityType::StageChange,
            "Stage changed",
            format!(
                "{} moved from {} to {}",
                deal.name, current.stage, deal.stage
            ),
        )
        .await?;

        Ok(deal)
    }

    /// Archive an open deal.
    pub async fn archive(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        reason: Option<&str>,
        user_id: Option<Uuid>,
    ) -> DealflowResult<Deal> {
        let current = self.deals.get_by_id(tenant_id, id).await?;
        let status = archive_status(&current.status, reason, Utc::now())?;

        let deal = self.deals.update_status(tenant_id, id, status).await?;

        info!(tenant_id = %tenant_id, deal_id = %id, "Deal archived");
        let description = match deal.status.archive_reason() {
            Some(reason) => format!("{} archived: {reason}", deal.name),
            None => format!("{} archived", deal.name),
        };
        self.record_activity(
            &deal,
            user_id,
            ActivityType::DealArchived,
            "Deal archived",
            description,
        )
        .await?;

        Ok(deal)
    }

    /// Mark a deal as lost, freezing its current stage as `stage_at_loss`.
    pub async fn mark_lost(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        reason: &str,
        user_id: Option<Uuid>,
    ) -> DealflowResult<Deal> {
        if non_blank(Some(reason)).is_none() {
            return Err(EngineError::MissingLossReason.into());
        }
        let current = self.deals.get_by_id(tenant_id, id).await?;
        let status = lost_status(&current.status, &current.stage, reason, Utc::now())?;

        let deal = self.deals.update_status(tenant_id, id, status).await?;

        info!(
            tenant_id = %tenant_id,
            deal_id = %id,
            stage = %current.stage,
            "Deal marked lost"
        );
        self.record_activity(
            &deal,
            user_id,
            ActivityType::DealLost,
            "Deal lost",
            format!(
                "{} lost at {}: {}",
                deal.name,
                current.stage,
                deal.status.loss_reason().unwrap_or(reason)
            ),
        )
        .await?;

        Ok(deal)
    }

    /// Reopen an archived or lost deal, clearing all archive and loss
    /// metadata.
    pub async fn restore(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        user_id: Option<Uuid>,
    ) -> DealflowResult<Deal> {
        let current = self.deals.get_by_id(tenant_id, id).await?;
        let Some(status) = restored_status(&current.status) else {
            debug!(tenant_id = %tenant_id, deal_id = %id, "Deal already open");
            return Ok(current);
        };

        let deal = self.deals.update_status(tenant_id, id, status).await?;

        info!(
            tenant_id = %tenant_id,
            deal_id = %id,
            from = current.status.label(),
            "Deal restored"
        );
        self.record_activity(
            &deal,
            user_id,
            ActivityType::DealRestored,
            "Deal restored",
            format!("{} restored from {}", deal.name, current.status.label()),
        )
        .await?;

        Ok(deal)
    }

    /// Append a lifecycle activity. Skipped when no acting user is known.
    async fn record_activity(
        &self,
        deal: &Deal,
        user_id: Option<Uuid>,
        activity_type: ActivityType,
        subject: &str,
        description: String,
    ) -> DealflowResult<()> {
        let Some(user_id) = user_id else {
            debug!(deal_id = %deal.id, kind = activity_type.as_str(), "No acting user, activity skipped");
            return Ok(());
        };

        self.activities
            .append(CreateActivity {
                tenant_id: deal.tenant_id,
                activity_type,
                subject: subject.to_string(),
                description,
                deal_id: deal.id,
                user_id: Some(user_id),
                timestamp: Utc::now(),
            })
            .await
            .inspect_err(|e| {
                warn!(
                    deal_id = %deal.id,
                    kind = activity_type.as_str(),
                    error = %e,
                    "Failed to record activity"
                );
            })?;
        Ok(())
    }
}
