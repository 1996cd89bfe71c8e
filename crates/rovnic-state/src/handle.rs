//! SurrealDB Store - Connection and Operations
//!
//! `SurrealStore` implements every storage trait against one SurrealDB
//! connection:
//! - `OutcomeStore` over the `outcomes` table
//! - `ArtifactRegistry` over the `artifacts` table
//! - `AuditLog` over the `audit_log` table
//!
//! Supports in-memory, URL and cloud (WebSocket) connections.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::error::{StateError, StorageError};
use crate::migrations;
use crate::schema::{AuditStatus, ModelArtifact, OutcomeRecord, RetrainingAuditEntry};
use crate::storage_traits::{
    ArtifactRegistry, AuditLog, ContentDigest, OutcomeQuery, OutcomeStore, StorageResult,
};
use crate::Result;

const DEFAULT_NAMESPACE: &str = "rovnic";
const DEFAULT_DATABASE: &str = "main";

/// Serialize chrono timestamps as native SurrealDB datetimes so that
/// range filters and `ORDER BY` compare instants, not strings.
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// `outcomes` row. The record's own id is stored as `record_id` so it does
/// not collide with the SurrealDB record id.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbOutcome {
    record_id: String,
    domain: String,
    predicted_label: String,
    confidence: f64,
    actual_correct: Option<bool>,
    #[serde(default)]
    features: Vec<f64>,
    #[serde(with = "surreal_datetime")]
    observed_at: DateTime<Utc>,
}

impl From<OutcomeRecord> for DbOutcome {
    fn from(record: OutcomeRecord) -> Self {
        Self {
            record_id: record.id,
            domain: record.domain,
            predicted_label: record.predicted_label,
            confidence: record.confidence,
            actual_correct: record.actual_correct,
            features: record.features,
            observed_at: record.observed_at,
        }
    }
}

impl From<DbOutcome> for OutcomeRecord {
    fn from(row: DbOutcome) -> Self {
        Self {
            id: row.record_id,
            domain: row.domain,
            predicted_label: row.predicted_label,
            confidence: row.confidence,
            actual_correct: row.actual_correct,
            features: row.features,
            observed_at: row.observed_at,
        }
    }
}

/// `artifacts` row: one per promotion, blobs hex-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbArtifact {
    domain: String,
    version: String,
    revision: u64,
    weights_hex: String,
    normalizer_hex: String,
    digest: String,
    #[serde(with = "surreal_datetime")]
    fitted_at: DateTime<Utc>,
    validation_accuracy: Option<f64>,
    sample_count: u64,
}

impl From<&ModelArtifact> for DbArtifact {
    fn from(artifact: &ModelArtifact) -> Self {
        Self {
            domain: artifact.domain.clone(),
            version: artifact.version.clone(),
            revision: artifact.revision,
            weights_hex: hex::encode(&artifact.weights_blob),
            normalizer_hex: hex::encode(&artifact.normalizer_blob),
            digest: artifact.digest.as_str().to_string(),
            fitted_at: artifact.fitted_at,
            validation_accuracy: artifact.validation_accuracy,
            sample_count: artifact.sample_count as u64,
        }
    }
}

impl TryFrom<DbArtifact> for ModelArtifact {
    type Error = StorageError;

    fn try_from(row: DbArtifact) -> StorageResult<Self> {
        let decode = |field: &str, value: &str| {
            hex::decode(value).map_err(|e| {
                StorageError::Backend(format!(
                    "artifact {} has undecodable {field}: {e}",
                    row.version
                ))
            })
        };
        let weights_blob = decode("weights_hex", &row.weights_hex)?;
        let normalizer_blob = decode("normalizer_hex", &row.normalizer_hex)?;
        let digest = ContentDigest::try_from(row.digest.clone())?;

        Ok(ModelArtifact {
            domain: row.domain,
            version: row.version,
            revision: row.revision,
            weights_blob,
            normalizer_blob,
            digest,
            fitted_at: row.fitted_at,
            validation_accuracy: row.validation_accuracy,
            sample_count: row.sample_count as usize,
        })
    }
}

/// `audit_log` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbAuditEntry {
    domain: String,
    status: AuditStatus,
    reason: Option<String>,
    resulting_accuracy: Option<f64>,
    sample_count: u64,
    artifact_version: Option<String>,
    #[serde(with = "surreal_datetime")]
    timestamp: DateTime<Utc>,
}

impl From<RetrainingAuditEntry> for DbAuditEntry {
    fn from(entry: RetrainingAuditEntry) -> Self {
        Self {
            domain: entry.domain,
            status: entry.status,
            reason: entry.reason,
            resulting_accuracy: entry.resulting_accuracy,
            sample_count: entry.sample_count as u64,
            artifact_version: entry.artifact_version,
            timestamp: entry.timestamp,
        }
    }
}

impl From<DbAuditEntry> for RetrainingAuditEntry {
    fn from(row: DbAuditEntry) -> Self {
        Self {
            domain: row.domain,
            status: row.status,
            reason: row.reason,
            resulting_accuracy: row.resulting_accuracy,
            sample_count: row.sample_count as usize,
            artifact_version: row.artifact_version,
            timestamp: row.timestamp,
        }
    }
}

/// Credentials for a remote (WebSocket) SurrealDB deployment.
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// e.g. "wss://rovnic.aws-use1.surrealdb.cloud"
    pub endpoint: String,
    pub username: String,
    pub password: String,
    pub namespace: String,
    pub database: String,
    /// Sign in as a root user rather than a database user
    pub is_root: bool,
}

impl CloudConfig {
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            is_root: false,
        }
    }

    /// Build from `SURREALDB_ENDPOINT`, `SURREALDB_USERNAME` and
    /// `SURREALDB_PASSWORD`, with `SURREALDB_NAMESPACE`, `SURREALDB_DATABASE`
    /// and `SURREALDB_ROOT` as optional overrides. `None` unless all three
    /// required variables are set.
    pub fn from_env() -> Option<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let mut config = Self::new(
            var("SURREALDB_ENDPOINT")?,
            var("SURREALDB_USERNAME")?,
            var("SURREALDB_PASSWORD")?,
        );
        if let Some(namespace) = var("SURREALDB_NAMESPACE") {
            config.namespace = namespace;
        }
        if let Some(database) = var("SURREALDB_DATABASE") {
            config.database = database;
        }
        config.is_root = var("SURREALDB_ROOT").is_some_and(|v| v.eq_ignore_ascii_case("true"));
        Some(config)
    }

    async fn sign_in(&self, db: &Surreal<Any>) -> Result<()> {
        let signed_in = if self.is_root {
            db.signin(Root {
                username: &self.username,
                password: &self.password,
            })
            .await
            .map(|_| ())
        } else {
            db.signin(Database {
                namespace: &self.namespace,
                database: &self.database,
                username: &self.username,
                password: &self.password,
            })
            .await
            .map(|_| ())
        };
        signed_in.map_err(|e| {
            StateError::Connection(format!("sign-in as {} rejected: {e}", self.username))
        })
    }
}

// ---------------------------------------------------------------------------
// SurrealStore
// ---------------------------------------------------------------------------

/// SurrealDB connection implementing all Rovnic storage traits.
#[derive(Clone)]
pub struct SurrealStore {
    db: Surreal<Any>,
}

impl SurrealStore {
    /// Fresh in-memory database with the schema applied.
    pub async fn in_memory() -> Result<Self> {
        Self::connect_url("mem://").await
    }

    /// Connect to an explicit URL (`mem://`, `surrealkv://path`, `ws://host`).
    #[instrument(skip_all, fields(url = %url))]
    pub async fn connect_url(url: &str) -> Result<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StateError::Connection(format!("{url}: {e}")))?;

        db.use_ns(DEFAULT_NAMESPACE)
            .use_db(DEFAULT_DATABASE)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;
        Ok(Self { db })
    }

    /// Connect to a remote deployment, sign in and prepare the schema.
    #[instrument(skip(config), fields(endpoint = %config.endpoint, root = config.is_root))]
    pub async fn setup_cloud(config: CloudConfig) -> Result<Self> {
        let db = surrealdb::engine::any::connect(config.endpoint.as_str())
            .await
            .map_err(|e| StateError::Connection(format!("{}: {e}", config.endpoint)))?;
        config.sign_in(&db).await?;
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| {
                StateError::Connection(format!(
                    "cannot use {}/{}: {e}",
                    config.namespace, config.database
                ))
            })?;

        migrations::init_schema(&db).await?;
        info!(namespace = %config.namespace, database = %config.database, "Remote store ready");
        Ok(Self { db })
    }

    /// Pick a backend from the environment: remote credentials first, then
    /// `SURREALDB_URL`, then an in-memory database.
    #[instrument(skip_all)]
    pub async fn setup_from_env() -> Result<Self> {
        if let Some(config) = CloudConfig::from_env() {
            return Self::setup_cloud(config).await;
        }
        match std::env::var("SURREALDB_URL") {
            Ok(url) if !url.is_empty() => Self::connect_url(&url).await,
            _ => {
                info!("No database configured, outcomes and models will not persist");
                Self::in_memory().await
            }
        }
    }

    async fn latest_artifact_row(&self, domain: &str) -> StorageResult<Option<DbArtifact>> {
        let mut result = self
            .db
            .query("SELECT * FROM artifacts WHERE domain = $domain ORDER BY revision DESC LIMIT 1")
            .bind(("domain", domain.to_string()))
            .await?;
        let rows: Vec<DbArtifact> = result.take(0)?;
        Ok(rows.into_iter().next())
    }

    async fn insert_artifact(&self, row: DbArtifact) -> StorageResult<DbArtifact> {
        let created: Option<DbArtifact> = self.db.create("artifacts").content(row).await?;
        created.ok_or_else(|| StorageError::Backend("failed to create artifact record".to_string()))
    }
}

#[async_trait]
impl OutcomeStore for SurrealStore {
    #[instrument(skip(self, record), fields(domain = %record.domain))]
    async fn append(&self, record: OutcomeRecord) -> StorageResult<()> {
        record.validate()?;
        let row = DbOutcome::from(record);
        let _created: Option<DbOutcome> = self.db.create("outcomes").content(row).await?;
        debug!("Outcome appended");
        Ok(())
    }

    #[instrument(skip(self), fields(domain = %query.domain, limit = query.limit))]
    async fn query(&self, query: &OutcomeQuery) -> StorageResult<Vec<OutcomeRecord>> {
        let mut result = match query.since {
            Some(since) => {
                let sql = format!(
                    "SELECT * FROM outcomes WHERE domain = $domain AND observed_at >= $since \
                     ORDER BY observed_at DESC LIMIT {}",
                    query.limit
                );
                self.db
                    .query(sql)
                    .bind(("domain", query.domain.clone()))
                    .bind(("since", surrealdb::sql::Datetime::from(since)))
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT * FROM outcomes WHERE domain = $domain \
                     ORDER BY observed_at DESC LIMIT {}",
                    query.limit
                );
                self.db
                    .query(sql)
                    .bind(("domain", query.domain.clone()))
                    .await?
            }
        };

        let rows: Vec<DbOutcome> = result.take(0)?;
        Ok(rows.into_iter().map(OutcomeRecord::from).collect())
    }
}

#[async_trait]
impl ArtifactRegistry for SurrealStore {
    #[instrument(skip(self))]
    async fn current(&self, domain: &str) -> StorageResult<Option<ModelArtifact>> {
        self.latest_artifact_row(domain)
            .await?
            .map(ModelArtifact::try_from)
            .transpose()
    }

    #[instrument(skip(self, artifact), fields(domain = %artifact.domain, version = %artifact.version))]
    async fn promote(&self, mut artifact: ModelArtifact) -> StorageResult<ModelArtifact> {
        artifact.verify()?;
        let next = self
            .latest_artifact_row(&artifact.domain)
            .await?
            .map(|r| r.revision + 1)
            .unwrap_or(1);
        artifact.revision = next;

        // Weights and normalizer are written in one record, so a failed
        // create leaves the previous revision active.
        let created = self.insert_artifact(DbArtifact::from(&artifact)).await?;
        info!(revision = created.revision, "Artifact promoted");
        ModelArtifact::try_from(created)
    }

    #[instrument(skip(self))]
    async fn rollback(&self, domain: &str) -> StorageResult<ModelArtifact> {
        let history = self.history(domain).await?;
        if history.is_empty() {
            return Err(StorageError::ArtifactNotFound {
                domain: domain.to_string(),
            });
        }
        if history.len() < 2 {
            return Err(StorageError::NoPreviousArtifact {
                domain: domain.to_string(),
            });
        }

        let mut previous = history[1].clone();
        previous.revision = history[0].revision + 1;
        let created = self.insert_artifact(DbArtifact::from(&previous)).await?;
        ModelArtifact::try_from(created)
    }

    #[instrument(skip(self))]
    async fn history(&self, domain: &str) -> StorageResult<Vec<ModelArtifact>> {
        let mut result = self
            .db
            .query("SELECT * FROM artifacts WHERE domain = $domain ORDER BY revision DESC")
            .bind(("domain", domain.to_string()))
            .await?;
        let rows: Vec<DbArtifact> = result.take(0)?;
        rows.into_iter().map(ModelArtifact::try_from).collect()
    }
}

#[async_trait]
impl AuditLog for SurrealStore {
    #[instrument(skip(self, entry), fields(domain = %entry.domain, status = %entry.status))]
    async fn append_audit(&self, entry: RetrainingAuditEntry) -> StorageResult<()> {
        let row = DbAuditEntry::from(entry);
        let _created: Option<DbAuditEntry> = self.db.create("audit_log").content(row).await?;
        Ok(())
    }

    async fn audit_history(
        &self,
        domain: Option<&str>,
        limit: usize,
    ) -> StorageResult<Vec<RetrainingAuditEntry>> {
        let mut result = match domain {
            Some(domain) => {
                let sql = format!(
                    "SELECT * FROM audit_log WHERE domain = $domain ORDER BY timestamp DESC LIMIT {}",
                    limit
                );
                self.db
                    .query(sql)
                    .bind(("domain", domain.to_string()))
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT * FROM audit_log ORDER BY timestamp DESC LIMIT {}",
                    limit
                );
                self.db.query(sql).await?
            }
        };
        let rows: Vec<DbAuditEntry> = result.take(0)?;
        Ok(rows.into_iter().map(RetrainingAuditEntry::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_row_hex_encodes_blobs_and_decodes_back() {
        let artifact = ModelArtifact::new("nba", vec![0, 15, 255], vec![7], 20)
            .with_validation_accuracy(0.8);
        let row = DbArtifact::from(&artifact);
        assert_eq!(row.weights_hex, "000fff");
        assert_eq!(row.normalizer_hex, "07");
        assert_eq!(row.digest, artifact.digest.as_str());

        let back = ModelArtifact::try_from(row).unwrap();
        assert_eq!(back, artifact);
    }

    #[test]
    fn artifact_row_with_bad_hex_or_digest_is_rejected() {
        let artifact = ModelArtifact::new("nba", vec![1], vec![2], 3);

        let mut row = DbArtifact::from(&artifact);
        row.weights_hex = "zz".to_string();
        assert!(matches!(
            ModelArtifact::try_from(row).unwrap_err(),
            StorageError::Backend(msg) if msg.contains("weights_hex")
        ));

        let mut row = DbArtifact::from(&artifact);
        row.digest = "short".to_string();
        assert!(matches!(
            ModelArtifact::try_from(row).unwrap_err(),
            StorageError::InvalidDigest { .. }
        ));
    }

    #[test]
    fn outcome_row_keeps_record_id_apart_from_surreal_id() {
        let record = OutcomeRecord::new("nfl", "Loss", 0.3, None).with_features(vec![0.4, 0.6]);
        let row = DbOutcome::from(record.clone());
        assert_eq!(row.record_id, record.id);
        assert_eq!(OutcomeRecord::from(row), record);
    }
}
