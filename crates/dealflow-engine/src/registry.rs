//! Stage registry: resolves a tenant's ordered pipeline stages and maps
//! raw stage labels onto them.

use std::sync::Arc;

use dealflow_core::error::DealflowResult;
use dealflow_core::models::stage::StageDefinition;
use dealflow_core::repository::PipelineStageRepository;
use tracing::debug;
use uuid::Uuid;

use crate::catalog::StageCatalog;
use crate::error::EngineError;

/// Where a resolved stage set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageSource {
    /// The tenant's own persisted stages.
    Tenant,
    /// The catalog defaults, for tenants with no stages.
    Builtin,
}

/// A tenant's stage set, ordered by `order` then name. Never empty.
#[derive(Debug, Clone)]
pub struct ResolvedStages {
    stages: Vec<StageDefinition>,
    source: StageSource,
    catalog: Arc<StageCatalog>,
}

impl ResolvedStages {
    /// Build a stage set, falling back to the catalog defaults when
    /// `stages` is empty.
    pub fn new(
        mut stages: Vec<StageDefinition>,
        catalog: Arc<StageCatalog>,
    ) -> Result<Self, EngineError> {
        let source = if stages.is_empty() {
            stages = catalog.default_stages.clone();
            StageSource::Builtin
        } else {
            StageSource::Tenant
        };
        if stages.is_empty() {
            return Err(EngineError::InvalidCatalog(
                "no stages available for tenant".into(),
            ));
        }
        stages.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));

        Ok(Self {
            stages,
            source,
            catalog,
        })
    }

    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    pub fn source(&self) -> StageSource {
        self.source
    }

    pub fn catalog(&self) -> &StageCatalog {
        &self.catalog
    }

    /// The lowest-ordered stage, used as the bucket of last resort.
    pub fn first(&self) -> &StageDefinition {
        &self.stages[0]
    }

    pub fn get(&self, name: &str) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Index into [`stages`](Self::stages) of the bucket a raw label
    /// belongs to.
    ///
    /// Tries an exact name match, then the alias table (only if the alias
    /// target is one of this tenant's stages), then falls back to the
    /// first stage.
    pub fn position(&self, label: &str) -> usize {
        let exact = |name: &str| self.stages.iter().position(|s| s.name == name);

        exact(label)
            .or_else(|| self.catalog.lookup_alias(label).and_then(exact))
            .unwrap_or(0)
    }

    /// The stage definition a raw label canonicalizes to.
    pub fn resolve(&self, label: &str) -> &StageDefinition {
        &self.stages[self.position(label)]
    }

    /// Canonical stage name for a raw label. Always a member of this set.
    pub fn canonicalize(&self, label: &str) -> &str {
        &self.resolve(label).name
    }

    /// Whether a raw label canonicalizes to a closed-won stage.
    pub fn is_won(&self, label: &str) -> bool {
        self.catalog.is_won(self.canonicalize(label))
    }
}

/// Resolves stage sets for tenants.
pub struct StageRegistry<S: PipelineStageRepository> {
    repo: S,
    catalog: Arc<StageCatalog>,
}

impl<S: PipelineStageRepository> StageRegistry<S> {
    /// Create a registry. The catalog is validated here.
    pub fn new(repo: S, catalog: StageCatalog) -> Result<Self, EngineError> {
        Ok(Self {
            repo,
            catalog: Arc::new(catalog.validated()?),
        })
    }

    pub fn catalog(&self) -> &StageCatalog {
        &self.catalog
    }

    /// Stage store, for tenant stage configuration.
    pub fn repository(&self) -> &S {
        &self.repo
    }

    /// The tenant's ordered stages, or the catalog defaults if it has none.
    pub async fn resolve(&self, tenant_id: Uuid) -> DealflowResult<ResolvedStages> {
        let stages: Vec<StageDefinition> = self
            .repo
            .list(tenant_id)
            .await?
            .into_iter()
            .map(StageDefinition::from)
            .collect();

        let resolved = ResolvedStages::new(stages, Arc::clone(&self.catalog))?;
        debug!(
            tenant_id = %tenant_id,
            source = ?resolved.source(),
            stages = resolved.stages().len(),
            "Resolved pipeline stages"
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant_stages(stages: &[(&str, i32)]) -> ResolvedStages {
        let defs = stages
            .iter()
            .map(|(name, order)| StageDefinition::new(*name, *order, 0))
            .collect();
        ResolvedStages::new(defs, Arc::new(StageCatalog::builtin())).unwrap()
    }

    #[test]
    fn empty_tenant_uses_builtin_defaults() {
        let resolved = ResolvedStages::new(Vec::new(), Arc::new(StageCatalog::builtin())).unwrap();
        assert_eq!(resolved.source(), StageSource::Builtin);
        let names: Vec<_> = resolved.stages().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "Lead",
                "Discovery",
                "Estimating",
                "Proposal",
                "Negotiation",
                "Contract",
                "Production",
                "Complete",
                "Closed Lost"
            ]
        );
    }

    #[test]
    fn tenant_stages_are_sorted_by_order() {
        let resolved = tenant_stages(&[("Proposal", 2), ("Lead", 1), ("Won", 3)]);
        assert_eq!(resolved.source(), StageSource::Tenant);
        assert_eq!(resolved.first().name, "Lead");
        assert_eq!(resolved.stages()[2].name, "Won");
    }

    #[test]
    fn exact_match_wins_over_alias() {
        // "Lost" is an alias for "Closed Lost", but this tenant has a
        // stage literally named "Lost".
        let resolved = tenant_stages(&[("Lead", 1), ("Lost", 2), ("Closed Lost", 3)]);
        assert_eq!(resolved.canonicalize("Lost"), "Lost");
    }

    #[test]
    fn alias_maps_legacy_labels() {
        let resolved = tenant_stages(&[("Lead", 1), ("Proposal", 2)]);
        assert_eq!(resolved.canonicalize("PROSPECT"), "Lead");
        assert_eq!(resolved.canonicalize("proposal_sent"), "Proposal");
    }

    #[test]
    fn alias_to_missing_stage_falls_back_to_first() {
        let resolved = tenant_stages(&[("Intake", 5), ("Proposal", 9)]);
        // CLOSED_WON aliases to "Complete", which this tenant lacks.
        assert_eq!(resolved.canonicalize("CLOSED_WON"), "Intake");
    }

    #[test]
    fn unknown_labels_fall_back_to_first_stage() {
        let resolved = tenant_stages(&[("Proposal", 2), ("Lead", 1)]);
        for label in ["", "   ", "no such stage", "🚀"] {
            assert_eq!(resolved.canonicalize(label), "Lead");
        }
    }

    #[test]
    fn canonicalize_always_returns_member() {
        let resolved = ResolvedStages::new(Vec::new(), Arc::new(StageCatalog::builtin())).unwrap();
        let labels = [
            "PROSPECT",
            "QUALIFIED",
            "CLOSED_WON",
            "closed lost",
            "Negotiation",
            "garbage",
            "",
        ];
        for label in labels {
            let canonical = resolved.canonicalize(label);
            assert!(resolved.get(canonical).is_some(), "{label} -> {canonical}");
        }
    }

    #[test]
    fn won_detection_uses_canonical_stage() {
        let resolved = ResolvedStages::new(Vec::new(), Arc::new(StageCatalog::builtin())).unwrap();
        assert!(resolved.is_won("CLOSED_WON"));
        assert!(resolved.is_won("Complete"));
        assert!(!resolved.is_won("Negotiation"));
        assert!(!resolved.is_won("unknown"));
    }
}
