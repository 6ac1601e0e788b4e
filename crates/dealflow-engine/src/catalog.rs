//! Versioned stage catalog.
//!
//! The catalog carries everything stage canonicalization depends on: the
//! built-in default stages used by tenants that configured none, the
//! alias table for legacy labels, and which canonical stages count as
//! closed-won. It is injected into the registry rather than hard-coded,
//! so deployments and tests can swap it.

use std::collections::{BTreeMap, HashSet};

use dealflow_core::models::stage::StageDefinition;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub const CATALOG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageCatalog {
    pub version: u32,
    /// Stages used when a tenant has none of its own. Never persisted.
    pub default_stages: Vec<StageDefinition>,
    /// Normalised legacy label to canonical stage name.
    pub aliases: BTreeMap<String, String>,
    /// Canonical stage names denoting a closed-won outcome.
    pub won_stages: Vec<String>,
}

impl Default for StageCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Normalise a label for alias lookup: trimmed, upper case, with
/// spaces and hyphens folded to underscores.
pub fn normalize_label(label: &str) -> String {
    label
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

impl StageCatalog {
    /// The built-in catalog.
    pub fn builtin() -> Self {
        let default_stages = [
            ("Lead", 10),
            ("Discovery", 20),
            ("Estimating", 30),
            ("Proposal", 50),
            ("Negotiation", 70),
            ("Contract", 85),
            ("Production", 95),
            ("Complete", 100),
            ("Closed Lost", 0),
        ]
        .into_iter()
        .zip(1..)
        .map(|((name, hint), order)| StageDefinition::new(name, order, hint))
        .collect();

        let aliases = [
            ("LEAD", "Lead"),
            ("PROSPECT", "Lead"),
            ("NEW", "Lead"),
            ("QUALIFIED", "Discovery"),
            ("QUALIFYING", "Discovery"),
            ("DISCOVERY", "Discovery"),
            ("ESTIMATING", "Estimating"),
            ("ESTIMATE", "Estimating"),
            ("PROPOSAL", "Proposal"),
            ("PROPOSAL_SENT", "Proposal"),
            ("QUOTED", "Proposal"),
            ("NEGOTIATION", "Negotiation"),
            ("NEGOTIATING", "Negotiation"),
            ("CONTRACT", "Contract"),
            ("CONTRACT_SENT", "Contract"),
            ("PRODUCTION", "Production"),
            ("IN_PRODUCTION", "Production"),
            ("COMPLETE", "Complete"),
            ("COMPLETED", "Complete"),
            ("CLOSED_WON", "Complete"),
            ("WON", "Complete"),
            ("CLOSED_LOST", "Closed Lost"),
            ("LOST", "Closed Lost"),
        ]
        .into_iter()
        .map(|(alias, target)| (alias.to_string(), target.to_string()))
        .collect();

        Self {
            version: CATALOG_VERSION,
            default_stages,
            aliases,
            won_stages: vec!["Complete".into()],
        }
    }

    /// Parse a catalog from JSON and validate it.
    pub fn from_json(raw: &str) -> Result<Self, EngineError> {
        let catalog: Self = serde_json::from_str(raw)
            .map_err(|e| EngineError::InvalidCatalog(format!("malformed catalog: {e}")))?;
        catalog.validated()
    }

    /// Add or replace an alias.
    pub fn with_alias(mut self, alias: &str, target: impl Into<String>) -> Self {
        self.aliases.insert(normalize_label(alias), target.into());
        self
    }

    /// Normalise alias keys and check the catalog is usable.
    pub fn validated(mut self) -> Result<Self, EngineError> {
        if self.default_stages.is_empty() {
            return Err(EngineError::InvalidCatalog(
                "at least one default stage is required".into(),
            ));
        }

        let mut seen = HashSet::new();
        for stage in &self.default_stages {
            if stage.name.trim().is_empty() {
                return Err(EngineError::InvalidCatalog("blank default stage name".into()));
            }
            if !seen.insert(stage.name.as_str()) {
                return Err(EngineError::InvalidCatalog(format!(
                    "duplicate default stage '{}'",
                    stage.name
                )));
            }
        }

        let mut aliases = BTreeMap::new();
        for (alias, target) in std::mem::take(&mut self.aliases) {
            let key = normalize_label(&alias);
            if key.is_empty() || target.trim().is_empty() {
                return Err(EngineError::InvalidCatalog(format!(
                    "blank alias entry '{alias}' -> '{target}'"
                )));
            }
            aliases.insert(key, target);
        }
        self.aliases = aliases;

        Ok(self)
    }

    /// Canonical target for a raw label, if the alias table knows it.
    pub fn lookup_alias(&self, label: &str) -> Option<&str> {
        self.aliases.get(&normalize_label(label)).map(String::as_str)
    }

    pub fn is_won(&self, canonical: &str) -> bool {
        self.won_stages.iter().any(|s| s == canonical)
    }
}
