//! Schema definitions and migration runner for SurrealDB.
//!
//! Tables are SCHEMAFULL. UUIDs are stored as strings, enums as
//! lower-case strings guarded by ASSERT constraints. Deal lifecycle
//! status is stored flattened: a `status` label plus the archive and
//! loss columns, which the repository maps back to a single
//! `DealStatus`.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "deal_pipeline",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Deals (tenant scope)
-- =======================================================================
DEFINE TABLE deal SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE deal TYPE string;
DEFINE FIELD name ON TABLE deal TYPE string;
DEFINE FIELD amount ON TABLE deal TYPE float ASSERT $value >= 0;
DEFINE FIELD stage ON TABLE deal TYPE string;
DEFINE FIELD priority ON TABLE deal TYPE string \
    ASSERT $value IN ['low', 'medium', 'high', 'urgent'];
DEFINE FIELD probability ON TABLE deal TYPE int \
    ASSERT $value >= 0 AND $value <= 100;
DEFINE FIELD status ON TABLE deal TYPE string \
    ASSERT $value IN ['open', 'archived', 'lost'];
DEFINE FIELD is_archived ON TABLE deal TYPE bool DEFAULT false;
DEFINE FIELD archived_at ON TABLE deal TYPE option<datetime>;
DEFINE FIELD archive_reason ON TABLE deal TYPE option<string>;
DEFINE FIELD is_lost ON TABLE deal TYPE bool DEFAULT false;
DEFINE FIELD lost_at ON TABLE deal TYPE option<datetime>;
DEFINE FIELD loss_reason ON TABLE deal TYPE option<string>;
DEFINE FIELD stage_at_loss ON TABLE deal TYPE option<string>;
DEFINE FIELD contact_id ON TABLE deal TYPE option<string>;
DEFINE FIELD owner_id ON TABLE deal TYPE option<string>;
DEFINE FIELD expected_close_at ON TABLE deal TYPE option<datetime>;
DEFINE FIELD description ON TABLE deal TYPE option<string>;
DEFINE FIELD metadata ON TABLE deal TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD created_at ON TABLE deal TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE deal TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_deal_tenant ON TABLE deal COLUMNS tenant_id;
DEFINE INDEX idx_deal_tenant_stage ON TABLE deal \
    COLUMNS tenant_id, stage;
DEFINE INDEX idx_deal_tenant_contact ON TABLE deal \
    COLUMNS tenant_id, contact_id;

-- =======================================================================
-- Pipeline stages (tenant scope)
-- =======================================================================
DEFINE TABLE pipeline_stage SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE pipeline_stage TYPE string;
DEFINE FIELD name ON TABLE pipeline_stage TYPE string;
DEFINE FIELD position ON TABLE pipeline_stage TYPE int;
DEFINE FIELD probability_hint ON TABLE pipeline_stage TYPE int \
    ASSERT $value >= 0 AND $value <= 100;
DEFINE FIELD created_at ON TABLE pipeline_stage TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE pipeline_stage TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_pipeline_stage_tenant_name ON TABLE pipeline_stage \
    COLUMNS tenant_id, name UNIQUE;

-- =======================================================================
-- Activities (tenant scope, append-only)
-- =======================================================================
DEFINE TABLE activity SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE activity TYPE string;
DEFINE FIELD activity_type ON TABLE activity TYPE string \
    ASSERT $value IN ['stage_change', 'deal_archived', 'deal_lost', \
    'deal_restored'];
DEFINE FIELD subject ON TABLE activity TYPE string;
DEFINE FIELD description ON TABLE activity TYPE string;
DEFINE FIELD deal_id ON TABLE activity TYPE string;
DEFINE FIELD user_id ON TABLE activity TYPE option<string>;
DEFINE FIELD occurred_at ON TABLE activity TYPE datetime;
DEFINE INDEX idx_activity_tenant_deal ON TABLE activity \
    COLUMNS tenant_id, deal_id;
";

/// Run all pending migrations against the database.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "could not record v{}: {}",
                    migration.version, e,
                ))
            })?;
    }

    info!(version = current_version.max(latest_version()), "Schema up to date");
    Ok(())
}

fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }

    #[test]
    fn schema_defines_engine_tables() {
        for table in ["deal", "pipeline_stage", "activity"] {
            assert!(
                SCHEMA_V1.contains(&format!("DEFINE TABLE {table} SCHEMAFULL")),
                "missing table {table}"
            );
        }
    }
}
