//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async and tenant-scoped: every call
//! takes the owning `tenant_id`, and a record belonging to another
//! tenant is reported as not found.

use uuid::Uuid;

use crate::error::DealflowResult;
use crate::models::{
    activity::{Activity, ActivityType, CreateActivity},
    deal::{CreateDeal, Deal, DealStatus, UpdateDeal},
    stage::{CreatePipelineStage, PipelineStage, UpdatePipelineStage},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Deals
// ---------------------------------------------------------------------------

/// Restricts a deal query to one lifecycle bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleFilter {
    /// Neither archived nor lost.
    Active,
    Archived,
    Lost,
}

/// Query filters for deals. All set fields must match.
#[derive(Debug, Clone, Default)]
pub struct DealFilter {
    pub lifecycle: Option<LifecycleFilter>,
    /// Exact raw stage label.
    pub stage: Option<String>,
    pub contact_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
    /// Case-insensitive substring of the deal name.
    pub name_contains: Option<String>,
}

impl DealFilter {
    pub fn active() -> Self {
        Self {
            lifecycle: Some(LifecycleFilter::Active),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DealSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Value,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DealSort {
    pub field: DealSortField,
    pub direction: SortDirection,
}

pub trait DealRepository: Send + Sync {
    fn create(&self, input: CreateDeal) -> impl Future<Output = DealflowResult<Deal>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = DealflowResult<Deal>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateDeal,
    ) -> impl Future<Output = DealflowResult<Deal>> + Send;
    /// Replace the lifecycle status. All archive and loss fields are
    /// written together in one statement.
    fn update_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        status: DealStatus,
    ) -> impl Future<Output = DealflowResult<Deal>> + Send;
    fn delete(&self, tenant_id: Uuid, id: Uuid)
    -> impl Future<Output = DealflowResult<()>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        filter: DealFilter,
        sort: DealSort,
        pagination: Pagination,
    ) -> impl Future<Output = DealflowResult<PaginatedResult<Deal>>> + Send;
    fn count(
        &self,
        tenant_id: Uuid,
        filter: DealFilter,
    ) -> impl Future<Output = DealflowResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Pipeline stages
// ---------------------------------------------------------------------------

pub trait PipelineStageRepository: Send + Sync {
    fn create(
        &self,
        input: CreatePipelineStage,
    ) -> impl Future<Output = DealflowResult<PipelineStage>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdatePipelineStage,
    ) -> impl Future<Output = DealflowResult<PipelineStage>> + Send;
    fn delete(&self, tenant_id: Uuid, id: Uuid)
    -> impl Future<Output = DealflowResult<()>> + Send;
    /// All stages of a tenant, ordered by `order` then name.
    fn list(
        &self,
        tenant_id: Uuid,
    ) -> impl Future<Output = DealflowResult<Vec<PipelineStage>>> + Send;
}

// ---------------------------------------------------------------------------
// Activities (append-only)
// ---------------------------------------------------------------------------

/// Query filters for activity entries.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub deal_id: Option<Uuid>,
    pub activity_type: Option<ActivityType>,
}

pub trait ActivityRepository: Send + Sync {
    /// Append a new activity. No update or delete operations exist.
    fn append(
        &self,
        input: CreateActivity,
    ) -> impl Future<Output = DealflowResult<Activity>> + Send;
    /// Newest first.
    fn list(
        &self,
        tenant_id: Uuid,
        filter: ActivityFilter,
        pagination: Pagination,
    ) -> impl Future<Output = DealflowResult<PaginatedResult<Activity>>> + Send;
}
