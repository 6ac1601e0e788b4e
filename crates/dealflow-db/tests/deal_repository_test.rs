//! Integration tests for the Deal repository using in-memory SurrealDB.

use dealflow_core::error::DealflowError;
use dealflow_core::models::deal::{CreateDeal, DealPriority, DealStatus, UpdateDeal};
use dealflow_core::repository::{
    DealFilter, DealRepository, DealSort, DealSortField, LifecycleFilter, Pagination,
    SortDirection,
};
use dealflow_db::repository::SurrealDealRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> SurrealDealRepository<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    dealflow_db::run_migrations(&db).await.unwrap();
    SurrealDealRepository::new(db)
}

fn new_deal(tenant_id: Uuid, name: &str, value: f64, stage: &str) -> CreateDeal {
    CreateDeal {
        tenant_id,
        name: name.into(),
        value,
        stage: stage.into(),
        priority: DealPriority::Medium,
        probability: 10,
        contact_id: None,
        owner_id: None,
        expected_close_at: None,
        description: None,
        metadata: None,
    }
}

#[tokio::test]
async fn create_and_get_deal() {
    let repo = setup().await;
    let tenant_id = Uuid::new_v4();
    let contact_id = Uuid::new_v4();

    let deal = repo
        .create(CreateDeal {
            contact_id: Some(contact_id),
            description: Some("Warehouse roof".into()),
            ..new_deal(tenant_id, "Acme roof", 12_500.0, "Lead")
        })
        .await
        .unwrap();

    assert_eq!(deal.tenant_id, tenant_id);
    assert_eq!(deal.name, "Acme roof");
    assert_eq!(deal.value, 12_500.0);
    assert_eq!(deal.stage, "Lead");
    assert_eq!(deal.status, DealStatus::Open);
    assert_eq!(deal.contact_id, Some(contact_id));
    assert!(deal.metadata.is_object());

    let fetched = repo.get_by_id(tenant_id, deal.id).await.unwrap();
    assert_eq!(fetched.id, deal.id);
    assert_eq!(fetched.description.as_deref(), Some("Warehouse roof"));
}

#[tokio::test]
async fn get_from_other_tenant_is_not_found() {
    let repo = setup().await;
    let deal = repo
        .create(new_deal(Uuid::new_v4(), "Hidden", 10.0, "Lead"))
        .await
        .unwrap();

    let err = repo.get_by_id(Uuid::new_v4(), deal.id).await.unwrap_err();
    assert!(matches!(err, DealflowError::NotFound { .. }));
}

#[tokio::test]
async fn update_changes_only_given_fields() {
    let repo = setup().await;
    let tenant_id = Uuid::new_v4();
    let deal = repo
        .create(new_deal(tenant_id, "Original", 100.0, "Lead"))
        .await
        .unwrap();

    let updated = repo
        .update(
            tenant_id,
            deal.id,
            UpdateDeal {
                value: Some(250.0),
                priority: Some(DealPriority::High),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "Original");
    assert_eq!(updated.value, 250.0);
    assert_eq!(updated.priority, DealPriority::High);
    assert!(updated.updated_at >= deal.updated_at);
}

#[tokio::test]
async fn status_round_trips_through_columns() {
    let repo = setup().await;
    let tenant_id = Uuid::new_v4();
    let deal = repo
        .create(new_deal(tenant_id, "Lossy", 80.0, "Negotiation"))
        .await
        .unwrap();

    let lost = repo
        .update_status(
            tenant_id,
            deal.id,
            DealStatus::Lost {
                reason: "price too high".into(),
                at: chrono::Utc::now(),
                stage_at_loss: "Negotiation".into(),
            },
        )
        .await
        .unwrap();
    assert!(lost.is_lost());
    assert_eq!(lost.status.stage_at_loss(), Some("Negotiation"));
    assert_eq!(lost.status.loss_reason(), Some("price too high"));

    let reopened = repo
        .update_status(tenant_id, deal.id, DealStatus::Open)
        .await
        .unwrap();
    assert_eq!(reopened.status, DealStatus::Open);
    assert!(reopened.status.lost_at().is_none());
}

#[tokio::test]
async fn update_status_in_other_tenant_is_not_found() {
    let repo = setup().await;
    let deal = repo
        .create(new_deal(Uuid::new_v4(), "Mine", 1.0, "Lead"))
        .await
        .unwrap();

    let err = repo
        .update_status(Uuid::new_v4(), deal.id, DealStatus::Open)
        .await
        .unwrap_err();
    assert!(matches!(err, DealflowError::NotFound { .. }));
}

#[tokio::test]
async fn list_filters_by_lifecycle() {
    let repo = setup().await;
    let tenant_id = Uuid::new_v4();

    let open = repo
        .create(new_deal(tenant_id, "Open", 10.0, "Lead"))
        .await
        .unwrap();
    let archived = repo
        .create(new_deal(tenant_id, "Archived", 20.0, "Lead"))
        .await
        .unwrap();
    repo.update_status(
        tenant_id,
        archived.id,
        DealStatus::Archived {
            reason: None,
            at: chrono::Utc::now(),
        },
    )
    .await
    .unwrap();
    // Another tenant's deal never shows up.
    repo.create(new_deal(Uuid::new_v4(), "Foreign", 30.0, "Lead"))
        .await
        .unwrap();

    let active = repo
        .list(
            tenant_id,
            DealFilter::active(),
            DealSort::default(),
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(active.total, 1);
    assert_eq!(active.items[0].id, open.id);

    let archived_only = repo
        .count(
            tenant_id,
            DealFilter {
                lifecycle: Some(LifecycleFilter::Archived),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(archived_only, 1);

    let all = repo.count(tenant_id, DealFilter::default()).await.unwrap();
    assert_eq!(all, 2);
}

#[tokio::test]
async fn list_sorts_and_paginates() {
    let repo = setup().await;
    let tenant_id = Uuid::new_v4();
    for (name, value) in [("Small", 5.0), ("Large", 500.0), ("Medium", 50.0)] {
        repo.create(new_deal(tenant_id, name, value, "Lead"))
            .await
            .unwrap();
    }

    let page = repo
        .list(
            tenant_id,
            DealFilter::default(),
            DealSort {
                field: DealSortField::Value,
                direction: SortDirection::Desc,
            },
            Pagination {
                offset: 0,
                limit: 2,
            },
        )
        .await
        .unwrap();

    assert_eq!(page.total, 3);
    let names: Vec<_> = page.items.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, ["Large", "Medium"]);
}

#[tokio::test]
async fn list_matches_name_case_insensitively() {
    let repo = setup().await;
    let tenant_id = Uuid::new_v4();
    repo.create(new_deal(tenant_id, "ACME Kitchen", 5.0, "Lead"))
        .await
        .unwrap();
    repo.create(new_deal(tenant_id, "Globex Patio", 5.0, "Lead"))
        .await
        .unwrap();

    let found = repo
        .list(
            tenant_id,
            DealFilter {
                name_contains: Some("acme".into()),
                ..Default::default()
            },
            DealSort::default(),
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(found.total, 1);
    assert_eq!(found.items[0].name, "ACME Kitchen");
}

#[tokio::test]
async fn delete_removes_deal() {
    let repo = setup().await;
    let tenant_id = Uuid::new_v4();
    let deal = repo
        .create(new_deal(tenant_id, "Doomed", 1.0, "Lead"))
        .await
        .unwrap();

    repo.delete(tenant_id, deal.id).await.unwrap();

    let err = repo.get_by_id(tenant_id, deal.id).await.unwrap_err();
    assert!(matches!(err, DealflowError::NotFound { .. }));

    let err = repo.delete(tenant_id, deal.id).await.unwrap_err();
    assert!(matches!(err, DealflowError::NotFound { .. }));
}
