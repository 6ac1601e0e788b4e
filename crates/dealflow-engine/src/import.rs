//! Bulk import of raw deal items.
//!
//! Items are processed one at a time in input order. A failing item is
//! reported with its original JSON and never stops the rest; deals created
//! before it stay created.

use dealflow_core::error::{DealflowError, DealflowResult};
use dealflow_core::models::deal::Deal;
use dealflow_core::repository::{ActivityRepository, DealRepository, PipelineStageRepository};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::registry::ResolvedStages;
use crate::service::{DealService, NewDeal};

#[derive(Debug, Clone, Serialize)]
pub struct ImportFailure {
    /// Position of the item in the input.
    pub index: usize,
    /// The item exactly as supplied.
    pub item: Value,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ImportOutcome {
    Created(Deal),
    Failed(ImportFailure),
}

/// Per-item outcomes, in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub outcomes: Vec<ImportOutcome>,
}

impl ImportReport {
    pub fn created(&self) -> impl Iterator<Item = &Deal> {
        self.outcomes.iter().filter_map(|o| match o {
            ImportOutcome::Created(deal) => Some(deal),
            ImportOutcome::Failed(_) => None,
        })
    }

    pub fn errors(&self) -> impl Iterator<Item = &ImportFailure> {
        self.outcomes.iter().filter_map(|o| match o {
            ImportOutcome::Failed(failure) => Some(failure),
            ImportOutcome::Created(_) => None,
        })
    }

    pub fn created_count(&self) -> usize {
        self.created().count()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    /// Split into `(created, errors)`.
    pub fn into_parts(self) -> (Vec<Deal>, Vec<ImportFailure>) {
        let mut created = Vec::new();
        let mut errors = Vec::new();
        for outcome in self.outcomes {
            match outcome {
                ImportOutcome::Created(deal) => created.push(deal),
                ImportOutcome::Failed(failure) => errors.push(failure),
            }
        }
        (created, errors)
    }
}

fn parse_item(item: &Value) -> Result<NewDeal, EngineError> {
    serde_json::from_value(item.clone())
        .map_err(|e| EngineError::InvalidDeal(format!("malformed item: {e}")))
}

impl<D, S, A> DealService<D, S, A>
where
    D: DealRepository,
    S: PipelineStageRepository,
    A: ActivityRepository,
{
    /// Create a deal from each item. Infallible as a whole: every failure
    /// is reported in the returned [`ImportReport`].
    pub async fn bulk_import(&self, tenant_id: Uuid, items: Vec<Value>) -> ImportReport {
        let stages = self.registry.resolve(tenant_id).await;
        let mut report = ImportReport {
            outcomes: Vec::with_capacity(items.len()),
        };

        for (index, item) in items.into_iter().enumerate() {
            let result = match &stages {
                Ok(stages) => self.import_one(tenant_id, &item, stages).await,
                Err(e) => Err(e.clone()),
            };

            let outcome = match result {
                Ok(deal) => ImportOutcome::Created(deal),
                Err(e) => {
                    warn!(tenant_id = %tenant_id, index, error = %e, "Import item failed");
                    ImportOutcome::Failed(ImportFailure {
                        index,
                        item,
                        error: e.to_string(),
                    })
                }
            };
            report.outcomes.push(outcome);
        }

        info!(
            tenant_id = %tenant_id,
            created = report.created_count(),
            failed = report.error_count(),
            "Bulk import finished"
        );
        report
    }

    async fn import_one(
        &self,
        tenant_id: Uuid,
        item: &Value,
        stages: &ResolvedStages,
    ) -> DealflowResult<Deal> {
        let input = parse_item(item).map_err(DealflowError::from)?;
        self.create_with_stages(tenant_id, input, stages).await
    }
}
