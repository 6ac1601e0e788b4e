//! SurrealDB implementation of [`ActivityRepository`].
//!
//! Append-only: there is no update or delete path.

use chrono::{DateTime, Utc};
use dealflow_core::error::DealflowResult;
use dealflow_core::models::activity::{Activity, ActivityType, CreateActivity};
use dealflow_core::repository::{
    ActivityFilter, ActivityRepository, PaginatedResult, Pagination,
};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_optional_uuid, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ActivityRow {
    record_id: String,
    tenant_id: String,
    activity_type: String,
    subject: String,
    description: String,
    deal_id: String,
    user_id: Option<String>,
    occurred_at: DateTime<Utc>,
}

impl ActivityRow {
    fn try_into_activity(self) -> Result<Activity, DbError> {
        let activity_type = ActivityType::parse(&self.activity_type).ok_or_else(|| {
            DbError::InvalidRecord(format!("unknown activity type: {}", self.activity_type))
        })?;
        Ok(Activity {
            id: parse_uuid(&self.record_id, "activity")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            activity_type,
            subject: self.subject,
            description: self.description,
            deal_id: parse_uuid(&self.deal_id, "deal")?,
            user_id: parse_optional_uuid(self.user_id, "user")?,
            timestamp: self.occurred_at,
        })
    }
}

/// SurrealDB implementation of the activity log.
#[derive(Clone)]
pub struct SurrealActivityRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealActivityRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ActivityRepository for SurrealActivityRepository<C> {
    async fn append(&self, input: CreateActivity) -> DealflowResult<Activity> {
        let id_str = Uuid::new_v4().to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('activity', $id) SET \
                 tenant_id = $tenant_id, activity_type = $activity_type, \
                 subject = $subject, description = $description, \
                 deal_id = $deal_id, user_id = $user_id, \
                 occurred_at = $occurred_at; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('activity', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("activity_type", input.activity_type.as_str()))
            .bind(("subject", input.subject))
            .bind(("description", input.description))
            .bind(("deal_id", input.deal_id.to_string()))
            .bind(("user_id", input.user_id.map(|id| id.to_string())))
            .bind(("occurred_at", input.timestamp))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ActivityRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "activity".into(),
            id: id_str,
        })?;
        Ok(row.try_into_activity()?)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: ActivityFilter,
        pagination: Pagination,
    ) -> DealflowResult<PaginatedResult<Activity>> {
        let mut conditions = vec!["tenant_id = $tenant_id"];
        if filter.deal_id.is_some() {
            conditions.push("deal_id = $deal_id");
        }
        if filter.activity_type.is_some() {
            conditions.push("activity_type = $activity_type");
        }
        let conditions = conditions.join(" AND ");

        let query = format!(
            "SELECT count() AS total FROM activity WHERE {conditions} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM activity \
             WHERE {conditions} \
             ORDER BY occurred_at DESC \
             LIMIT $limit START $offset;"
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("deal_id", filter.deal_id.map(|id| id.to_string())))
            .bind((
                "activity_type",
                filter.activity_type.map(|t| t.as_str().to_string()),
            ))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let rows: Vec<ActivityRow> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(ActivityRow::try_into_activity)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
