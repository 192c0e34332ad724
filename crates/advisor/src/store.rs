//! SQLite persistence for generated recommendations.
//!
//! A connection is opened per operation on the blocking pool; the schema is
//! created on first use.

use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::alert::AlertRecord;
use crate::error::AdvisorResult;
use crate::evidence::EvidenceBundle;
use crate::text::truncate_chars;

/// Maximum characters stored for each serialized JSON column.
pub const MAX_SERIALIZED_CHARS: usize = 200_000;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS recommendations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ts INTEGER NOT NULL,
    alertname TEXT,
    severity TEXT,
    namespace TEXT,
    resource_name TEXT,
    deployment TEXT,
    summary TEXT,
    recommendation TEXT,
    evidence_json TEXT,
    raw_json TEXT
)";

/// A persisted recommendation, as listed back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecommendation {
    pub id: i64,
    /// Unix timestamp (seconds)
    pub ts: i64,
    pub alert: AlertRecord,
    pub recommendation: String,
    /// Serialized evidence bundle (possibly truncated)
    pub evidence_json: String,
}

/// Recommendation history backed by a SQLite file.
#[derive(Debug, Clone)]
pub struct RecommendationStore {
    db_path: PathBuf,
}

impl RecommendationStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Persist one recommendation and return its row id.
    pub async fn record(
        &self,
        alert: &AlertRecord,
        evidence: &EvidenceBundle,
        recommendation: &str,
        payload: &serde_json::Value,
    ) -> AdvisorResult<i64> {
        let evidence_json = capped_json(evidence)?;
        let raw_json = capped_json(payload)?;
        let alert = alert.clone();
        let recommendation = recommendation.to_string();
        let db_path = self.db_path.clone();

        let id = tokio::task::spawn_blocking(move || -> AdvisorResult<i64> {
            let conn = open(&db_path)?;
            conn.execute(
                "INSERT INTO recommendations (ts, alertname, severity, namespace, resource_name, \
                 deployment, summary, recommendation, evidence_json, raw_json) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    Utc::now().timestamp(),
                    alert.alertname,
                    alert.severity,
                    alert.namespace,
                    alert.resource_name,
                    alert.deployment_name,
                    alert.summary,
                    recommendation,
                    evidence_json,
                    raw_json,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await??;

        debug!(id, path = %self.db_path.display(), "Stored recommendation");
        Ok(id)
    }

    /// Most recent recommendations, newest first.
    pub async fn recent(&self, limit: usize) -> AdvisorResult<Vec<StoredRecommendation>> {
        let db_path = self.db_path.clone();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        tokio::task::spawn_blocking(move || -> AdvisorResult<Vec<StoredRecommendation>> {
            let conn = open(&db_path)?;
            let mut stmt = conn.prepare(
                "SELECT id, ts, alertname, severity, namespace, resource_name, deployment, \
                 summary, recommendation, evidence_json \
                 FROM recommendations ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(StoredRecommendation {
                    id: row.get(0)?,
                    ts: row.get(1)?,
                    alert: AlertRecord {
                        alertname: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        severity: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                        namespace: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                        resource_name: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                        deployment_name: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                        summary: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
                    },
                    recommendation: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
                    evidence_json: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
                })
            })?;
            let rows = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await?
    }
}

/// Open the database, creating its directory and schema when missing.
fn open(db_path: &Path) -> AdvisorResult<Connection> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(db_path)?;
    conn.execute(SCHEMA, [])?;
    Ok(conn)
}

fn capped_json<T: Serialize + ?Sized>(value: &T) -> AdvisorResult<String> {
    let json = serde_json::to_string(value)?;
    Ok(truncate_chars(&json, MAX_SERIALIZED_CHARS).to_string())
}
