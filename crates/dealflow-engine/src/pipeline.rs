//! Pipeline aggregation: a tenant's active deals grouped by canonical
//! stage.

use dealflow_core::error::DealflowResult;
use dealflow_core::models::deal::Deal;
use dealflow_core::models::stage::StageDefinition;
use dealflow_core::repository::{
    ActivityRepository, DealFilter, DealRepository, PipelineStageRepository,
};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::registry::ResolvedStages;
use crate::service::DealService;

/// Active deals in one stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageBucket {
    pub stage: StageDefinition,
    pub deals: Vec<Deal>,
    /// Sum of `deals[..].value`.
    pub value: f64,
}

/// Board view of a tenant's pipeline. Buckets are in stage order and every
/// resolved stage has one, possibly empty.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineView {
    pub buckets: Vec<StageBucket>,
    pub total_value: f64,
    pub total_deals: u64,
}

impl PipelineView {
    pub fn bucket(&self, stage: &str) -> Option<&StageBucket> {
        self.buckets.iter().find(|b| b.stage.name == stage)
    }

    /// `(stage, value)` pairs in stage order.
    pub fn stage_values(&self) -> impl Iterator<Item = (&str, f64)> {
        self.buckets
            .iter()
            .map(|b| (b.stage.name.as_str(), b.value))
    }
}

/// Group `deals` into the buckets of `stages`. Deals that are not active
/// are skipped.
pub fn build_pipeline(stages: &ResolvedStages, deals: Vec<Deal>) -> PipelineView {
    let mut buckets: Vec<StageBucket> = stages
        .stages()
        .iter()
        .map(|stage| StageBucket {
            stage: stage.clone(),
            deals: Vec::new(),
            value: 0.0,
        })
        .collect();

    let mut total_deals = 0;
    for deal in deals.into_iter().filter(Deal::is_active) {
        let bucket = &mut buckets[stages.position(&deal.stage)];
        bucket.value += deal.value;
        bucket.deals.push(deal);
        total_deals += 1;
    }

    let total_value = buckets.iter().map(|b| b.value).sum();
    PipelineView {
        buckets,
        total_value,
        total_deals,
    }
}

impl<D, S, A> DealService<D, S, A>
where
    D: DealRepository,
    S: PipelineStageRepository,
    A: ActivityRepository,
{
    /// The tenant's active deals grouped by canonical stage.
    pub async fn get_pipeline(&self, tenant_id: Uuid) -> DealflowResult<PipelineView> {
        let stages = self.registry.resolve(tenant_id).await?;
        let deals = self.fetch_all(tenant_id, DealFilter::active()).await?;

        let view = build_pipeline(&stages, deals);
        debug!(
            tenant_id = %tenant_id,
            deals = view.total_deals,
            total_value = view.total_value,
            "Built pipeline view"
        );
        Ok(view)
    }
}
