//! Pipeline, metrics and bulk import against in-memory SurrealDB.

use dealflow_core::error::{DealflowError, DealflowResult};
use dealflow_core::models::deal::{CreateDeal, Deal, DealStatus, UpdateDeal};
use dealflow_core::models::stage::CreatePipelineStage;
use dealflow_core::repository::{
    DealFilter, DealRepository, DealSort, PaginatedResult, Pagination, PipelineStageRepository,
};
use dealflow_db::repository::{
    SurrealActivityRepository, SurrealDealRepository, SurrealPipelineStageRepository,
};
use dealflow_engine::{DealService, EngineConfig, NewDeal, StageCatalog, StageSource};
use serde_json::json;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

type Service = DealService<
    SurrealDealRepository<Db>,
    SurrealPipelineStageRepository<Db>,
    SurrealActivityRepository<Db>,
>;

async fn setup_with(config: EngineConfig) -> Service {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    dealflow_db::run_migrations(&db).await.unwrap();
    DealService::new(
        SurrealDealRepository::new(db.clone()),
        SurrealPipelineStageRepository::new(db.clone()),
        SurrealActivityRepository::new(db),
        config,
    )
    .unwrap()
}

async fn setup() -> Service {
    // Small pages so aggregate reads span several of them.
    setup_with(EngineConfig {
        page_size: 2,
        ..EngineConfig::default()
    })
    .await
}

async fn add_stage(service: &Service, tenant_id: Uuid, name: &str, order: i32) {
    service
        .registry()
        .repository()
        .create(CreatePipelineStage {
            tenant_id,
            name: name.into(),
            order,
            probability_hint: 0,
        })
        .await
        .unwrap();
}

fn new_deal(name: &str, value: f64, stage: &str) -> NewDeal {
    NewDeal {
        name: name.into(),
        value,
        stage: Some(stage.into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn tenant_without_stages_gets_builtin_set() {
    let service = setup().await;
    let stages = service.resolve_stages(Uuid::new_v4()).await.unwrap();
    assert_eq!(stages.source(), StageSource::Builtin);
    assert_eq!(stages.stages().len(), 9);
    assert_eq!(stages.first().name, "Lead");
}

#[tokio::test]
async fn pipeline_groups_by_tenant_stages() {
    let service = setup().await;
    let tenant_id = Uuid::new_v4();
    add_stage(&service, tenant_id, "Proposal", 2).await;
    add_stage(&service, tenant_id, "Lead", 1).await;

    let prospect = service
        .create(tenant_id, new_deal("Prospect", 100.0, "PROSPECT"))
        .await
        .unwrap();
    let proposal = service
        .create(tenant_id, new_deal("Quote", 50.0, "Proposal"))
        .await
        .unwrap();

    let view = service.get_pipeline(tenant_id).await.unwrap();

    let names: Vec<_> = view.buckets.iter().map(|b| b.stage.name.as_str()).collect();
    assert_eq!(names, ["Lead", "Proposal"]);
    let lead = view.bucket("Lead").unwrap();
    assert_eq!(lead.deals.len(), 1);
    assert_eq!(lead.deals[0].id, prospect.id);
    assert_eq!(lead.value, 100.0);
    let bucket = view.bucket("Proposal").unwrap();
    assert_eq!(bucket.deals[0].id, proposal.id);
    assert_eq!(bucket.value, 50.0);
    assert_eq!(view.total_value, 150.0);
    assert_eq!(view.total_deals, 2);
}

#[tokio::test]
async fn pipeline_skips_archived_and_lost_deals() {
    let service = setup().await;
    let tenant_id = Uuid::new_v4();

    let mut ids = Vec::new();
    for i in 0..5 {
        let deal = service
            .create(tenant_id, new_deal(&format!("Deal {i}"), 10.0, "Proposal"))
            .await
            .unwrap();
        ids.push(deal.id);
    }
    service.archive(tenant_id, ids[0], None, None).await.unwrap();
    service
        .mark_lost(tenant_id, ids[1], "no budget", None)
        .await
        .unwrap();

    let view = service.get_pipeline(tenant_id).await.unwrap();
    assert_eq!(view.total_deals, 3);
    assert_eq!(view.total_value, 30.0);
    assert_eq!(view.bucket("Proposal").unwrap().deals.len(), 3);
    let count: usize = view.buckets.iter().map(|b| b.deals.len()).sum();
    assert_eq!(count, 3);
}

#[tokio::test]
async fn metrics_cover_all_deals() {
    let service = setup().await;
    let tenant_id = Uuid::new_v4();

    service
        .create(tenant_id, new_deal("Won", 300.0, "CLOSED_WON"))
        .await
        .unwrap();
    service
        .create(tenant_id, new_deal("Open", 100.0, "Lead"))
        .await
        .unwrap();
    let lost = service
        .create(tenant_id, new_deal("Lost", 200.0, "Negotiation"))
        .await
        .unwrap();
    service
        .mark_lost(tenant_id, lost.id, "timing", None)
        .await
        .unwrap();
    let archived = service
        .create(tenant_id, new_deal("Archived", 400.0, "Complete"))
        .await
        .unwrap();
    service
        .archive(tenant_id, archived.id, None, None)
        .await
        .unwrap();

    let metrics = service.calculate_pipeline_metrics(tenant_id).await.unwrap();
    assert_eq!(metrics.total_deals, 4);
    assert_eq!(metrics.total_pipeline_value, 1000.0);
    assert_eq!(metrics.average_deal_size, 250.0);
    assert_eq!(metrics.won_deals, 2);
    assert_eq!(metrics.win_rate, 50.0);
    assert_eq!(metrics.active_deals, 2);
    assert_eq!(metrics.lost_deals, 1);
    assert_eq!(metrics.archived_deals, 1);
    assert_eq!(metrics.count_for("Complete"), 2);
    assert_eq!(metrics.deal_count_by_stage.len(), 9);
}

#[tokio::test]
async fn metrics_for_empty_tenant_are_zero() {
    let service = setup().await;
    let metrics = service
        .calculate_pipeline_metrics(Uuid::new_v4())
        .await
        .unwrap();
    assert_eq!(metrics.total_pipeline_value, 0.0);
    assert_eq!(metrics.average_deal_size, 0.0);
    assert_eq!(metrics.win_rate, 0.0);
}

#[tokio::test]
async fn bulk_import_reports_each_item() {
    let service = setup().await;
    let tenant_id = Uuid::new_v4();
    let invalid = json!({"name": "   ", "value": 10});

    let report = service
        .bulk_import(
            tenant_id,
            vec![
                json!({"name": "Imported", "value": 500, "stage": "QUALIFIED"}),
                invalid.clone(),
            ],
        )
        .await;

    assert_eq!(report.created_count(), 1);
    assert_eq!(report.error_count(), 1);
    let failure = report.errors().next().unwrap();
    assert_eq!(failure.index, 1);
    assert_eq!(failure.item, invalid);
    assert!(!failure.error.is_empty());

    let created = report.created().next().unwrap();
    assert_eq!(created.name, "Imported");
    assert_eq!(created.stage, "QUALIFIED");
    // Probability defaults to the hint of the canonical stage, Discovery.
    assert_eq!(created.probability, 20);

    let view = service.get_pipeline(tenant_id).await.unwrap();
    assert_eq!(view.bucket("Discovery").unwrap().deals.len(), 1);
}

#[tokio::test]
async fn bulk_import_continues_past_failures() {
    let service = setup().await;
    let tenant_id = Uuid::new_v4();

    let report = service
        .bulk_import(
            tenant_id,
            vec![
                json!({"name": "First", "value": 1}),
                json!("not an object"),
                json!({"name": "Negative", "value": -5}),
                json!({"name": "Last", "value": 2}),
            ],
        )
        .await;

    let (created, errors) = report.into_parts();
    let names: Vec<_> = created.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, ["First", "Last"]);
    let indexes: Vec<_> = errors.iter().map(|e| e.index).collect();
    assert_eq!(indexes, [1, 2]);
}

#[tokio::test]
async fn custom_catalog_changes_won_stages() {
    let catalog = StageCatalog {
        won_stages: vec!["Contract".into()],
        ..StageCatalog::builtin()
    }
    .with_alias("signed", "Contract");
    let service = setup_with(EngineConfig::with_catalog(catalog)).await;
    let tenant_id = Uuid::new_v4();

    service
        .create(tenant_id, new_deal("Signed", 10.0, "SIGNED"))
        .await
        .unwrap();
    service
        .create(tenant_id, new_deal("Done", 10.0, "Complete"))
        .await
        .unwrap();

    let metrics = service.calculate_pipeline_metrics(tenant_id).await.unwrap();
    assert_eq!(metrics.won_deals, 1);
    assert_eq!(metrics.count_for("Contract"), 1);
}

/// Deal store whose `create` fails for one deal name, as a database
/// would on a write error.
struct FlakyDeals {
    inner: SurrealDealRepository<Db>,
    fail_on: &'static str,
}

impl DealRepository for FlakyDeals {
    async fn create(&self, input: CreateDeal) -> DealflowResult<Deal> {
        if input.name == self.fail_on {
            return Err(DealflowError::Database("write conflict".into()));
        }
        self.inner.create(input).await
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> DealflowResult<Deal> {
        self.inner.get_by_id(tenant_id, id).await
    }

    async fn update(&self, tenant_id: Uuid, id: Uuid, input: UpdateDeal) -> DealflowResult<Deal> {
        self.inner.update(tenant_id, id, input).await
    }

    async fn update_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        status: DealStatus,
    ) -> DealflowResult<Deal> {
        self.inner.update_status(tenant_id, id, status).await
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> DealflowResult<()> {
        self.inner.delete(tenant_id, id).await
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: DealFilter,
        sort: DealSort,
        pagination: Pagination,
    ) -> DealflowResult<PaginatedResult<Deal>> {
        self.inner.list(tenant_id, filter, sort, pagination).await
    }

    async fn count(&self, tenant_id: Uuid, filter: DealFilter) -> DealflowResult<u64> {
        self.inner.count(tenant_id, filter).await
    }
}

#[tokio::test]
async fn bulk_import_isolates_store_failures() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    dealflow_db::run_migrations(&db).await.unwrap();
    let service = DealService::new(
        FlakyDeals {
            inner: SurrealDealRepository::new(db.clone()),
            fail_on: "Broken",
        },
        SurrealPipelineStageRepository::new(db.clone()),
        SurrealActivityRepository::new(db),
        EngineConfig::default(),
    )
    .unwrap();
    let tenant_id = Uuid::new_v4();
    let broken = json!({"name": "Broken", "value": 7, "stage": "Proposal"});

    let report = service
        .bulk_import(
            tenant_id,
            vec![
                json!({"name": "Before", "value": 1}),
                broken.clone(),
                json!({"name": "After", "value": 2}),
            ],
        )
        .await;

    let (created, errors) = report.into_parts();
    let names: Vec<_> = created.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, ["Before", "After"]);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].index, 1);
    assert_eq!(errors[0].item, broken);
    assert!(errors[0].error.contains("write conflict"));

    let view = service.get_pipeline(tenant_id).await.unwrap();
    assert_eq!(view.total_deals, 2);
}
