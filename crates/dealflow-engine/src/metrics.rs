//! Pipeline KPIs over a tenant's full deal set, archived and lost deals
//! included.

use dealflow_core::error::DealflowResult;
use dealflow_core::models::deal::Deal;
use dealflow_core::repository::{
    ActivityRepository, DealFilter, DealRepository, PipelineStageRepository,
};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::registry::ResolvedStages;
use crate::service::DealService;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageCount {
    pub stage: String,
    pub count: u64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineMetrics {
    pub total_pipeline_value: f64,
    /// One entry per resolved stage, in stage order.
    pub deal_count_by_stage: Vec<StageCount>,
    pub average_deal_size: f64,
    /// Percentage of deals in a closed-won stage, 0 to 100.
    pub win_rate: f64,
    pub total_deals: u64,
    pub won_deals: u64,
    pub active_deals: u64,
    pub archived_deals: u64,
    pub lost_deals: u64,
}

impl PipelineMetrics {
    pub fn count_for(&self, stage: &str) -> u64 {
        self.deal_count_by_stage
            .iter()
            .find(|c| c.stage == stage)
            .map_or(0, |c| c.count)
    }
}

pub fn compute_metrics(stages: &ResolvedStages, deals: &[Deal]) -> PipelineMetrics {
    let mut by_stage: Vec<StageCount> = stages
        .stages()
        .iter()
        .map(|s| StageCount {
            stage: s.name.clone(),
            count: 0,
            value: 0.0,
        })
        .collect();

    let mut metrics = PipelineMetrics {
        total_pipeline_value: 0.0,
        deal_count_by_stage: Vec::new(),
        average_deal_size: 0.0,
        win_rate: 0.0,
        total_deals: deals.len() as u64,
        won_deals: 0,
        active_deals: 0,
        archived_deals: 0,
        lost_deals: 0,
    };

    for deal in deals {
        let position = stages.position(&deal.stage);
        let entry = &mut by_stage[position];
        entry.count += 1;
        entry.value += deal.value;
        metrics.total_pipeline_value += deal.value;

        if stages.catalog().is_won(&stages.stages()[position].name) {
            metrics.won_deals += 1;
        }
        if deal.is_lost() {
            metrics.lost_deals += 1;
        } else if deal.is_archived() {
            metrics.archived_deals += 1;
        } else {
            metrics.active_deals += 1;
        }
    }

    if metrics.total_deals > 0 {
        let total = metrics.total_deals as f64;
        metrics.average_deal_size = metrics.total_pipeline_value / total;
        metrics.win_rate = metrics.won_deals as f64 / total * 100.0;
    }
    metrics.deal_count_by_stage = by_stage;
    metrics
}

impl<D, S, A> DealService<D, S, A>
where
    D: DealRepository,
    S: PipelineStageRepository,
    A: ActivityRepository,
{
    pub async fn calculate_pipeline_metrics(
        &self,
        tenant_id: Uuid,
    ) -> DealflowResult<PipelineMetrics> {
        let stages = self.registry.resolve(tenant_id).await?;
        let deals = self.fetch_all(tenant_id, DealFilter::default()).await?;

        let metrics = compute_metrics(&stages, &deals);
        debug!(
            tenant_id = %tenant_id,
            deals = metrics.total_deals,
            win_rate = metrics.win_rate,
            "Computed pipeline metrics"
        );
        Ok(metrics)
    }
}
