//! Deal service: the engine's surface towards the transport layer.
//!
//! Lifecycle transitions live in [`crate::lifecycle`], read-only views in
//! [`crate::pipeline`] and [`crate::metrics`], and bulk import in
//! [`crate::import`]. This module holds construction and plain CRUD.

use chrono::{DateTime, Utc};
use dealflow_core::error::DealflowResult;
use dealflow_core::models::activity::Activity;
use dealflow_core::models::deal::{
    CreateDeal, Deal, DealPriority, MAX_PROBABILITY, UpdateDeal, clamp_probability,
};
use dealflow_core::repository::{
    ActivityFilter, ActivityRepository, DealFilter, DealRepository, DealSort,
    PaginatedResult, Pagination, PipelineStageRepository,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::registry::{ResolvedStages, StageRegistry};

/// Input for creating a deal, as supplied by callers and import items.
///
/// `name` and `value` are required; everything else has a default.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NewDeal {
    pub name: String,
    pub value: f64,
    /// Raw stage label. Defaults to the tenant's first stage.
    pub stage: Option<String>,
    pub priority: Option<DealPriority>,
    /// Clamped to `0..=100`. Defaults to the stage's probability hint.
    pub probability: Option<i64>,
    pub contact_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
    pub expected_close_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

pub(crate) fn validate_name(name: &str) -> Result<String, EngineError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidDeal("name must not be blank".into()));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn validate_value(value: f64) -> Result<f64, EngineError> {
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::InvalidDeal(format!(
            "value must be a non-negative number, got {value}"
        )));
    }
    Ok(value)
}

pub(crate) fn validate_stage(stage: &str) -> Result<String, EngineError> {
    let trimmed = stage.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidDeal("stage must not be blank".into()));
    }
    Ok(trimmed.to_string())
}

/// Deal lifecycle and pipeline service.
///
/// Generic over repository implementations so that the engine has no
/// dependency on the database crate.
pub struct DealService<D, S, A>
where
    D: DealRepository,
    S: PipelineStageRepository,
    A: ActivityRepository,
{
    pub(crate) deals: D,
    pub(crate) activities: A,
    pub(crate) registry: StageRegistry<S>,
    pub(crate) config: EngineConfig,
}

impl<D, S, A> DealService<D, S, A>
where
    D: DealRepository,
    S: PipelineStageRepository,
    A: ActivityRepository,
{
    /// Build a service. Fails if the configured stage catalog is invalid.
    pub fn new(deals: D, stages: S, activities: A, config: EngineConfig) -> DealflowResult<Self> {
        let registry = StageRegistry::new(stages, config.catalog.clone())?;
        Ok(Self {
            deals,
            activities,
            registry,
            config,
        })
    }

    pub fn registry(&self) -> &StageRegistry<S> {
        &self.registry
    }

    /// The tenant's ordered stages (its own, or the built-in defaults).
    pub async fn resolve_stages(&self, tenant_id: Uuid) -> DealflowResult<ResolvedStages> {
        self.registry.resolve(tenant_id).await
    }

    /// Create a new, open deal.
    pub async fn create(&self, tenant_id: Uuid, input: NewDeal) -> DealflowResult<Deal> {
        let stages = self.registry.resolve(tenant_id).await?;
        self.create_with_stages(tenant_id, input, &stages).await
    }

    pub(crate) async fn create_with_stages(
        &self,
        tenant_id: Uuid,
        input: NewDeal,
        stages: &ResolvedStages,
    ) -> DealflowResult<Deal> {
        let name = validate_name(&input.name)?;
        let value = validate_value(input.value)?;
        let stage = match input.stage.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => stages.first().name.clone(),
        };
        let probability = input
            .probability
            .map(clamp_probability)
            .unwrap_or_else(|| stages.resolve(&stage).probability_hint);

        let deal = self
            .deals
            .create(CreateDeal {
                tenant_id,
                name,
                value,
                stage,
                priority: input.priority.unwrap_or_default(),
                probability,
                contact_id: input.contact_id,
                owner_id: input.owner_id,
                expected_close_at: input.expected_close_at,
                description: input.description,
                metadata: input.metadata,
            })
            .await?;

        info!(
            tenant_id = %tenant_id,
            deal_id = %deal.id,
            stage = %deal.stage,
            value = deal.value,
            "Deal created"
        );
        Ok(deal)
    }

    pub async fn get(&self, tenant_id: Uuid, id: Uuid) -> DealflowResult<Deal> {
        self.deals.get_by_id(tenant_id, id).await
    }

    /// Update non-lifecycle fields.
    ///
    /// A stage change in `changes` goes through [`move_stage`](Self::move_stage),
    /// so it is audited like any other move. All input is validated before
    /// the first write.
    pub async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        mut changes: UpdateDeal,
        user_id: Option<Uuid>,
    ) -> DealflowResult<Deal> {
        let mut deal = self.deals.get_by_id(tenant_id, id).await?;

        if let Some(name) = changes.name.as_deref() {
            changes.name = Some(validate_name(name)?);
        }
        if let Some(value) = changes.value {
            validate_value(value)?;
        }
        if let Some(probability) = changes.probability {
            changes.probability = Some(probability.min(MAX_PROBABILITY));
        }
        let stage = changes.stage.take().map(|s| validate_stage(&s)).transpose()?;

        if !changes.is_empty() {
            deal = self.deals.update(tenant_id, id, changes).await?;
            info!(tenant_id = %tenant_id, deal_id = %id, "Deal updated");
        }
        if let Some(stage) = stage {
            deal = self.move_stage(tenant_id, id, &stage, user_id).await?;
        }
        Ok(deal)
    }

    /// Delete a deal. Its activity history is kept.
    pub async fn delete(&self, tenant_id: Uuid, id: Uuid) -> DealflowResult<()> {
        self.deals.get_by_id(tenant_id, id).await?;
        self.deals.delete(tenant_id, id).await?;
        info!(tenant_id = %tenant_id, deal_id = %id, "Deal deleted");
        Ok(())
    }

    pub async fn list(
        &self,
        tenant_id: Uuid,
        filter: DealFilter,
        sort: DealSort,
        pagination: Pagination,
    ) -> DealflowResult<PaginatedResult<Deal>> {
        debug!(tenant_id = %tenant_id, ?filter, "Listing deals");
        self.deals.list(tenant_id, filter, sort, pagination).await
    }

    /// Lifecycle activity of one deal, newest first.
    pub async fn activities(
        &self,
        tenant_id: Uuid,
        deal_id: Uuid,
        pagination: Pagination,
    ) -> DealflowResult<PaginatedResult<Activity>> {
        self.activities
            .list(
                tenant_id,
                ActivityFilter {
                    deal_id: Some(deal_id),
                    ..Default::default()
                },
                pagination,
            )
            .await
    }

    /// Every deal matching `filter`, read page by page.
    pub(crate) async fn fetch_all(
        &self,
        tenant_id: Uuid,
        filter: DealFilter,
    ) -> DealflowResult<Vec<Deal>> {
        let limit = self.config.page_size.max(1);
        let mut deals = Vec::new();
        let mut offset = 0;

        loop {
            let page = self
                .deals
                .list(
                    tenant_id,
                    filter.clone(),
                    DealSort::default(),
                    Pagination { offset, limit },
                )
                .await?;
            let fetched = page.items.len() as u64;
            deals.extend(page.items);
            offset += fetched;
            if fetched == 0 || offset >= page.total {
                break;
            }
        }

        Ok(deals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_names_are_rejected() {
        assert!(validate_name("   ").is_err());
        assert_eq!(validate_name("  Acme  ").unwrap(), "Acme");
    }

    #[test]
    fn negative_and_non_finite_values_are_rejected() {
        assert!(validate_value(-0.01).is_err());
        assert!(validate_value(f64::NAN).is_err());
        assert!(validate_value(f64::INFINITY).is_err());
        assert_eq!(validate_value(0.0).unwrap(), 0.0);
    }

    #[test]
    fn new_deal_requires_name_and_value() {
        let ok: Result<NewDeal, _> =
            serde_json::from_value(serde_json::json!({"name": "Acme", "value": 10}));
        assert!(ok.is_ok());

        let missing_value: Result<NewDeal, _> =
            serde_json::from_value(serde_json::json!({"name": "Acme"}));
        assert!(missing_value.is_err());
    }
}
