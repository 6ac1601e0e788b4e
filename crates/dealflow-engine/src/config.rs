//! Engine configuration.

use crate::catalog::StageCatalog;

/// Configuration for the deal service.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Page size used when an aggregate view reads a tenant's full deal
    /// set from the store (default: 200).
    pub page_size: u64,
    /// Default stages, alias table, and won stages.
    pub catalog: StageCatalog,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: 200,
            catalog: StageCatalog::builtin(),
        }
    }
}

impl EngineConfig {
    pub fn with_catalog(catalog: StageCatalog) -> Self {
        Self {
            catalog,
            ..Default::default()
        }
    }
}
