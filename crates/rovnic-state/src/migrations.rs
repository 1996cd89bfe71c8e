//! Table and index definitions for the Rovnic store.
//!
//! Every statement uses `IF NOT EXISTS`, so `init_schema` runs on each new
//! connection.

use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Prediction outcomes, append-only.
///
/// ```text
/// outcomes {
///   record_id:        STRING (unique)
///   domain:           STRING
///   predicted_label:  STRING
///   confidence:       FLOAT
///   actual_correct:   BOOL? (NONE until settled)
///   features:         ARRAY<FLOAT>
///   observed_at:      DATETIME
/// }
/// ```
const OUTCOMES: &str = r#"
    DEFINE TABLE IF NOT EXISTS outcomes SCHEMALESS
        PERMISSIONS FOR create, select FULL FOR update, delete NONE;
    DEFINE INDEX IF NOT EXISTS outcomes_record_id ON TABLE outcomes COLUMNS record_id UNIQUE;
    DEFINE INDEX IF NOT EXISTS outcomes_domain_time ON TABLE outcomes COLUMNS domain, observed_at;
"#;

/// One row per promotion. The highest `revision` for a domain is the active
/// artifact; weights and normalizer share the row.
///
/// ```text
/// artifacts {
///   domain, version:                 STRING
///   revision:                        INT ((domain, revision) unique)
///   weights_hex, normalizer_hex:     STRING
///   digest:                          STRING
///   fitted_at:                       DATETIME
///   validation_accuracy:             FLOAT?
///   sample_count:                    INT
/// }
/// ```
const ARTIFACTS: &str = r#"
    DEFINE TABLE IF NOT EXISTS artifacts SCHEMALESS
        PERMISSIONS FOR create, select FULL FOR update, delete NONE;
    DEFINE INDEX IF NOT EXISTS artifacts_domain_revision ON TABLE artifacts COLUMNS domain, revision UNIQUE;
"#;

/// Retraining attempts, one row each.
const AUDIT_LOG: &str = r#"
    DEFINE TABLE IF NOT EXISTS audit_log SCHEMALESS
        PERMISSIONS FOR create, select FULL FOR update, delete NONE;
    DEFINE INDEX IF NOT EXISTS audit_log_domain_time ON TABLE audit_log COLUMNS domain, timestamp;
"#;

const TABLES: [(&str, &str); 3] = [
    ("outcomes", OUTCOMES),
    ("artifacts", ARTIFACTS),
    ("audit_log", AUDIT_LOG),
];

/// Define every table and index the storage traits rely on.
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    for (table, ddl) in TABLES {
        db.query(ddl).await?.check()?;
        debug!(table, "Table defined");
    }
    info!(tables = TABLES.len(), "Schema ready");
    Ok(())
}
