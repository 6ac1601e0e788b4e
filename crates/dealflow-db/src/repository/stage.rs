//! SurrealDB implementation of [`PipelineStageRepository`].

use chrono::{DateTime, Utc};
use dealflow_core::error::DealflowResult;
use dealflow_core::models::stage::{CreatePipelineStage, PipelineStage, UpdatePipelineStage};
use dealflow_core::repository::PipelineStageRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_uuid, probability_from_row};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct StageRow {
    record_id: String,
    tenant_id: String,
    name: String,
    position: i64,
    probability_hint: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StageRow {
    fn try_into_stage(self) -> Result<PipelineStage, DbError> {
        let order = i32::try_from(self.position)
            .map_err(|_| DbError::InvalidRecord(format!("stage order out of range: {}", self.position)))?;
        Ok(PipelineStage {
            id: parse_uuid(&self.record_id, "stage")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            name: self.name,
            order,
            probability_hint: probability_from_row(self.probability_hint, "probability hint")?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the pipeline stage repository.
#[derive(Clone)]
pub struct SurrealPipelineStageRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPipelineStageRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Whether another stage of the tenant already has `name`. `except`
    /// is left out of the check, so a stage may keep its own name.
    async fn name_taken(
        &self,
        tenant_id: Uuid,
        name: &str,
        except: Option<Uuid>,
    ) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM pipeline_stage \
                 WHERE tenant_id = $tenant_id AND name = $name \
                 AND meta::id(id) != $except GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("name", name.to_string()))
            .bind(("except", except.map(|id| id.to_string()).unwrap_or_default()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }
}

impl<C: Connection> PipelineStageRepository for SurrealPipelineStageRepository<C> {
    async fn create(&self, input: CreatePipelineStage) -> DealflowResult<PipelineStage> {
        if self.name_taken(input.tenant_id, &input.name, None).await? {
            return Err(DbError::AlreadyExists {
                entity: format!("pipeline_stage '{}'", input.name),
            }
            .into());
        }

        let id_str = Uuid::new_v4().to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('pipeline_stage', $id) SET \
                 tenant_id = $tenant_id, name = $name, \
                 position = $position, probability_hint = $probability_hint; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('pipeline_stage', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("name", input.name))
            .bind(("position", i64::from(input.order)))
            .bind(("probability_hint", i64::from(input.probability_hint.min(100))))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<StageRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "pipeline_stage".into(),
            id: id_str,
        })?;
        Ok(row.try_into_stage()?)
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdatePipelineStage,
    ) -> DealflowResult<PipelineStage> {
        if let Some(name) = input.name.as_deref() {
            if self.name_taken(tenant_id, name, Some(id)).await? {
                return Err(DbError::AlreadyExists {
                    entity: format!("pipeline_stage '{name}'"),
                }
                .into());
            }
        }

        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.order.is_some() {
            sets.push("position = $position");
        }
        if input.probability_hint.is_some() {
            sets.push("probability_hint = $probability_hint");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('pipeline_stage', $id) SET {} \
             WHERE tenant_id = $tenant_id; \
             SELECT meta::id(id) AS record_id, * \
             FROM type::record('pipeline_stage', $id) \
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
        if let Some(order) = input.order {
            builder = builder.bind(("position", i64::from(order)));
        }
        if let Some(hint) = input.probability_hint {
            builder = builder.bind(("probability_hint", i64::from(hint.min(100))));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<StageRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "pipeline_stage".into(),
            id: id_str,
        })?;
        Ok(row.try_into_stage()?)
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> DealflowResult<()> {
        self.db
            .query(
                "DELETE type::record('pipeline_stage', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list(&self, tenant_id: Uuid) -> DealflowResult<Vec<PipelineStage>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM pipeline_stage \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY position ASC, name ASC",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<StageRow> = result.take(0).map_err(DbError::from)?;
        let stages = rows
            .into_iter()
            .map(StageRow::try_into_stage)
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(stages)
    }
}
