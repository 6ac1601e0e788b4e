//! Dealflow Engine: deal lifecycle state machine, stage registry,
//! pipeline aggregation, metrics, and bulk import.
//!
//! [`DealService`] is generic over the `dealflow-core` repository traits,
//! so the engine has no dependency on a particular store.

pub mod catalog;
pub mod config;
pub mod error;
pub mod import;
pub mod lifecycle;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod service;

pub use catalog::StageCatalog;
pub use config::EngineConfig;
pub use error::EngineError;
pub use import::{ImportFailure, ImportOutcome, ImportReport};
pub use metrics::{PipelineMetrics, StageCount};
pub use pipeline::{PipelineView, StageBucket};
pub use registry::{ResolvedStages, StageRegistry, StageSource};
pub use service::{DealService, NewDeal};
