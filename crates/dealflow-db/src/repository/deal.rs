//! SurrealDB implementation of [`DealRepository`].
//!
//! The lifecycle status is flattened into a `status` label plus the
//! archive and loss columns. Reads rebuild a single [`DealStatus`] and
//! reject rows whose columns disagree with each other.

use chrono::{DateTime, Utc};
use dealflow_core::error::DealflowResult;
use dealflow_core::models::deal::{CreateDeal, Deal, DealPriority, DealStatus, UpdateDeal};
use dealflow_core::repository::{
    DealFilter, DealRepository, DealSort, DealSortField, LifecycleFilter, PaginatedResult,
    Pagination, SortDirection,
};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_optional_uuid, parse_uuid, probability_from_row};
use crate::error::DbError;

/// DB-side row struct, always selected with `meta::id(id) AS record_id`.
#[derive(Debug, SurrealValue)]
struct DealRow {
    record_id: String,
    tenant_id: String,
    name: String,
    amount: f64,
    stage: String,
    priority: String,
    probability: i64,
    status: String,
    is_archived: bool,
    archived_at: Option<DateTime<Utc>>,
    archive_reason: Option<String>,
    is_lost: bool,
    lost_at: Option<DateTime<Utc>>,
    loss_reason: Option<String>,
    stage_at_loss: Option<String>,
    contact_id: Option<String>,
    owner_id: Option<String>,
    expected_close_at: Option<DateTime<Utc>>,
    description: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DealRow {
    fn try_into_deal(self) -> Result<Deal, DbError> {
        let id = parse_uuid(&self.record_id, "deal")?;
        let invalid = |what: &str| {
            DbError::InvalidRecord(format!(
                "deal {id}: status '{}' without {what}",
                self.status
            ))
        };

        let status = match (self.status.as_str(), self.is_archived, self.is_lost) {
            ("open", false, false) => DealStatus::Open,
            ("archived", true, false) => DealStatus::Archived {
                reason: self.archive_reason.clone(),
                at: self.archived_at.ok_or_else(|| invalid("archived_at"))?,
            },
            ("lost", false, true) => DealStatus::Lost {
                reason: self.loss_reason.clone().ok_or_else(|| invalid("loss_reason"))?,
                at: self.lost_at.ok_or_else(|| invalid("lost_at"))?,
                stage_at_loss: self
                    .stage_at_loss
                    .clone()
                    .ok_or_else(|| invalid("stage_at_loss"))?,
            },
            (label, archived, lost) => {
                return Err(DbError::InvalidRecord(format!(
                    "deal {id}: inconsistent lifecycle columns \
                     (status={label}, is_archived={archived}, is_lost={lost})"
                )));
            }
        };

        let priority = DealPriority::parse(&self.priority).ok_or_else(|| {
            DbError::InvalidRecord(format!("unknown deal priority: {}", self.priority))
        })?;

        Ok(Deal {
            id,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            name: self.name,
            value: self.amount,
            stage: self.stage,
            priority,
            probability: probability_from_row(self.probability, "deal probability")?,
            status,
            contact_id: parse_optional_uuid(self.contact_id, "contact")?,
            owner_id: parse_optional_uuid(self.owner_id, "owner")?,
            expected_close_at: self.expected_close_at,
            description: self.description,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Column values written for a lifecycle status.
struct StatusColumns {
    status: &'static str,
    is_archived: bool,
    archived_at: Option<DateTime<Utc>>,
    archive_reason: Option<String>,
    is_lost: bool,
    lost_at: Option<DateTime<Utc>>,
    loss_reason: Option<String>,
    stage_at_loss: Option<String>,
}

impl From<DealStatus> for StatusColumns {
    fn from(status: DealStatus) -> Self {
        let label = status.label();
        let mut columns = Self {
            status: label,
            is_archived: false,
            archived_at: None,
            archive_reason: None,
            is_lost: false,
            lost_at: None,
            loss_reason: None,
            stage_at_loss: None,
        };
        match status {
            DealStatus::Open => {}
            DealStatus::Archived { reason, at } => {
                columns.is_archived = true;
                columns.archived_at = Some(at);
                columns.archive_reason = reason;
            }
            DealStatus::Lost {
                reason,
                at,
                stage_at_loss,
            } => {
                columns.is_lost = true;
                columns.lost_at = Some(at);
                columns.loss_reason = Some(reason);
                columns.stage_at_loss = Some(stage_at_loss);
            }
        }
        columns
    }
}

fn where_clause(filter: &DealFilter) -> String {
    let mut conditions = vec!["tenant_id = $tenant_id"];
    match filter.lifecycle {
        Some(LifecycleFilter::Active) => {
            conditions.push("is_archived = false AND is_lost = false");
        }
        Some(LifecycleFilter::Archived) => conditions.push("is_archived = true"),
        Some(LifecycleFilter::Lost) => conditions.push("is_lost = true"),
        None => {}
    }
    if filter.stage.is_some() {
        conditions.push("stage = $stage");
    }
    if filter.contact_id.is_some() {
        conditions.push("contact_id = $contact_id");
    }
    if filter.owner_id.is_some() {
        conditions.push("owner_id = $owner_id");
    }
    if filter.name_contains.is_some() {
        conditions.push("string::contains(string::lowercase(name), $name_contains)");
    }
    conditions.join(" AND ")
}

fn order_clause(sort: DealSort) -> String {
    let field = match sort.field {
        DealSortField::CreatedAt => "created_at",
        DealSortField::UpdatedAt => "updated_at",
        DealSortField::Value => "amount",
        DealSortField::Name => "name",
    };
    let direction = match sort.direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    };
    // id breaks ties so offset paging is stable
    format!("ORDER BY {field} {direction}, id ASC")
}

/// Owned bind values for a [`DealFilter`]. Unused ones bind as NONE.
struct FilterParams {
    stage: Option<String>,
    contact_id: Option<String>,
    owner_id: Option<String>,
    name_contains: Option<String>,
}

impl From<&DealFilter> for FilterParams {
    fn from(filter: &DealFilter) -> Self {
        Self {
            stage: filter.stage.clone(),
            contact_id: filter.contact_id.map(|id| id.to_string()),
            owner_id: filter.owner_id.map(|id| id.to_string()),
            name_contains: filter.name_contains.as_ref().map(|s| s.to_lowercase()),
        }
    }
}

fn single_row(rows: Vec<DealRow>, id: String) -> Result<Deal, DbError> {
    let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
        entity: "deal".into(),
        id,
    })?;
    row.try_into_deal()
}

/// SurrealDB implementation of the Deal repository.
#[derive(Clone)]
pub struct SurrealDealRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealDealRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> DealRepository for SurrealDealRepository<C> {
    async fn create(&self, input: CreateDeal) -> DealflowResult<Deal> {
        let id_str = Uuid::new_v4().to_string();

        let metadata = input
            .metadata
            .unwrap_or(serde_json::Value::Object(Default::default()));

        let result = self
            .db
            .query(
                "CREATE type::record('deal', $id) SET \
                 tenant_id = $tenant_id, name = $name, amount = $amount, \
                 stage = $stage, priority = $priority, \
                 probability = $probability, \
                 status = 'open', is_archived = false, is_lost = false, \
                 contact_id = $contact_id, owner_id = $owner_id, \
                 expected_close_at = $expected_close_at, \
                 description = $description, metadata = $metadata; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('deal', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("name", input.name))
            .bind(("amount", input.value))
            .bind(("stage", input.stage))
            .bind(("priority", input.priority.as_str()))
            .bind(("probability", i64::from(input.probability)))
            .bind(("contact_id", input.contact_id.map(|id| id.to_string())))
            .bind(("owner_id", input.owner_id.map(|id| id.to_string())))
            .bind(("expected_close_at", input.expected_close_at))
            .bind(("description", input.description))
            .bind(("metadata", metadata))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<DealRow> = result.take(1).map_err(DbError::from)?;
        Ok(single_row(rows, id_str)?)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> DealflowResult<Deal> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('deal', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DealRow> = result.take(0).map_err(DbError::from)?;
        Ok(single_row(rows, id_str)?)
    }

    async fn update(&self, tenant_id: Uuid, id: Uuid, input: UpdateDeal) -> DealflowResult<Deal> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.value.is_some() {
            sets.push("amount = $amount");
        }
        if input.stage.is_some() {
            sets.push("stage = $stage");
        }
        if input.priority.is_some() {
            sets.push("priority = $priority");
        }
        if input.probability.is_some() {
            sets.push("probability = $probability");
        }
        if input.contact_id.is_some() {
            sets.push("contact_id = $contact_id");
        }
        if input.owner_id.is_some() {
            sets.push("owner_id = $owner_id");
        }
        if input.expected_close_at.is_some() {
            sets.push("expected_close_at = $expected_close_at");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.metadata.is_some() {
            sets.push("metadata = $metadata");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('deal', $id) SET {} \
             WHERE tenant_id = $tenant_id; \
             SELECT meta::id(id) AS record_id, * \
             FROM type::record('deal', $id) \
             WHERE tenant_id = $tenant_id;",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(value) = input.value {
            builder = builder.bind(("amount", value));
        }
        if let Some(stage) = input.stage {
            builder = builder.bind(("stage", stage));
        }
        if let Some(priority) = input.priority {
            builder = builder.bind(("priority", priority.as_str()));
        }
        if let Some(probability) = input.probability {
            builder = builder.bind(("probability", i64::from(probability)));
        }
        if let Some(contact_id) = input.contact_id {
            builder = builder.bind(("contact_id", contact_id.map(|id| id.to_string())));
        }
        if let Some(owner_id) = input.owner_id {
            builder = builder.bind(("owner_id", owner_id.map(|id| id.to_string())));
        }
        if let Some(expected_close_at) = input.expected_close_at {
            builder = builder.bind(("expected_close_at", expected_close_at));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(metadata) = input.metadata {
            builder = builder.bind(("metadata", metadata));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<DealRow> = result.take(1).map_err(DbError::from)?;
        Ok(single_row(rows, id_str)?)
    }

    async fn update_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        status: DealStatus,
    ) -> DealflowResult<Deal> {
        let id_str = id.to_string();
        let columns = StatusColumns::from(status);

        let result = self
            .db
            .query(
                "UPDATE type::record('deal', $id) SET \
                 status = $status, \
                 is_archived = $is_archived, archived_at = $archived_at, \
                 archive_reason = $archive_reason, \
                 is_lost = $is_lost, lost_at = $lost_at, \
                 loss_reason = $loss_reason, stage_at_loss = $stage_at_loss, \
                 updated_at = time::now() \
                 WHERE tenant_id = $tenant_id; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('deal', $id) \
                 WHERE tenant_id = $tenant_id;",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("status", columns.status))
            .bind(("is_archived", columns.is_archived))
            .bind(("archived_at", columns.archived_at))
            .bind(("archive_reason", columns.archive_reason))
            .bind(("is_lost", columns.is_lost))
            .bind(("lost_at", columns.lost_at))
            .bind(("loss_reason", columns.loss_reason))
            .bind(("stage_at_loss", columns.stage_at_loss))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<DealRow> = result.take(1).map_err(DbError::from)?;
        Ok(single_row(rows, id_str)?)
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> DealflowResult<()> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM type::record('deal', $id) \
                 WHERE tenant_id = $tenant_id GROUP ALL; \
                 DELETE type::record('deal', $id) WHERE tenant_id = $tenant_id;",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        if rows.first().map(|r| r.total).unwrap_or(0) == 0 {
            return Err(DbError::NotFound {
                entity: "deal".into(),
                id: id_str,
            }
            .into());
        }
        Ok(())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: DealFilter,
        sort: DealSort,
        pagination: Pagination,
    ) -> DealflowResult<PaginatedResult<Deal>> {
        let conditions = where_clause(&filter);
        let params = FilterParams::from(&filter);

        let query = format!(
            "SELECT count() AS total FROM deal WHERE {conditions} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM deal \
             WHERE {conditions} {} \
             LIMIT $limit START $offset;",
            order_clause(sort)
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("stage", params.stage))
            .bind(("contact_id", params.contact_id))
            .bind(("owner_id", params.owner_id))
            .bind(("name_contains", params.name_contains))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let rows: Vec<DealRow> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(DealRow::try_into_deal)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn count(&self, tenant_id: Uuid, filter: DealFilter) -> DealflowResult<u64> {
        let query = format!(
            "SELECT count() AS total FROM deal WHERE {} GROUP ALL",
            where_clause(&filter)
        );
        let params = FilterParams::from(&filter);

        let mut result = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("stage", params.stage))
            .bind(("contact_id", params.contact_id))
            .bind(("owner_id", params.owner_id))
            .bind(("name_contains", params.name_contains))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}
