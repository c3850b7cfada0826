use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, Pool, Sqlite};

use crate::chaos::Worker;
use crate::models::{ResourceDescriptor, ResourceKind, Suite, SuiteState};
use crate::suite::{CreatedResources, TrackerError, TrackerStore};

pub type DbPool = Pool<Sqlite>;

#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

#[derive(FromRow)]
struct SuiteRow {
    id: String,
    name: String,
    state: String,
    data: String,
    created_at: String,
    updated_at: String,
}

#[derive(FromRow)]
struct CreatedRow {
    kind: String,
    name: String,
}

/// Declared part of a suite, stored as JSON
#[derive(serde::Serialize, serde::Deserialize)]
struct SuiteData {
    #[serde(default)]
    resources: Vec<ResourceDescriptor>,
    #[serde(default)]
    workers: Vec<Worker>,
}

const SUITE_COLUMNS: &str = "id, name, state, data, created_at, updated_at";
const INSERT_CREATED: &str =
    "INSERT INTO suite_created_resources (suite_id, kind, name) VALUES (?, ?, ?)";

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let in_memory = database_url.contains(":memory:");

        // Create database file if it doesn't exist
        if !in_memory {
            let db_path = database_url.trim_start_matches("sqlite://");
            if let Some(parent) = std::path::Path::new(db_path).parent() {
                std::fs::create_dir_all(parent)?;
            }
            if !std::path::Path::new(db_path).exists() {
                std::fs::File::create(db_path)?;
            }
        }

        // Every in-memory connection is its own database
        let mut options = SqlitePoolOptions::new().max_connections(5);
        if in_memory {
            options = options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = options.connect(database_url).await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // ==================== Suites ====================

    /// Insert or update a suite's declaration and state.
    ///
    /// Created resources are not written here; they go through [`TrackerStore`].
    pub async fn save_suite(&self, suite: &Suite) -> Result<(), sqlx::Error> {
        let data = serde_json::to_string(&SuiteData {
            resources: suite.resources.clone(),
            workers: suite.workers.clone(),
        })
        .map_err(|e| sqlx::Error::Protocol(format!("failed to encode suite data: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO suites (id, name, state, data, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                state = excluded.state,
                data = excluded.data,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&suite.id)
        .bind(&suite.name)
        .bind(suite.state.to_string())
        .bind(&data)
        .bind(suite.created_at.to_rfc3339())
        .bind(suite.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a suite by ID, with its created resources
    pub async fn get_suite(&self, id: &str) -> Result<Option<Suite>, sqlx::Error> {
        let row: Option<SuiteRow> =
            sqlx::query_as(&format!("SELECT {SUITE_COLUMNS} FROM suites WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(Some(self.row_to_suite(row).await?)),
            None => Ok(None),
        }
    }

    /// List all suites, newest first
    pub async fn list_suites(&self) -> Result<Vec<Suite>, sqlx::Error> {
        let rows: Vec<SuiteRow> = sqlx::query_as(&format!(
            "SELECT {SUITE_COLUMNS} FROM suites ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut suites = Vec::with_capacity(rows.len());
        for row in rows {
            suites.push(self.row_to_suite(row).await?);
        }
        Ok(suites)
    }

    /// Suites that may still own cluster resources
    pub async fn list_live_suites(&self) -> Result<Vec<Suite>, sqlx::Error> {
        let rows: Vec<SuiteRow> = sqlx::query_as(&format!(
            "SELECT {SUITE_COLUMNS} FROM suites WHERE state != ? ORDER BY created_at"
        ))
        .bind(SuiteState::Stopped.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut suites = Vec::with_capacity(rows.len());
        for row in rows {
            suites.push(self.row_to_suite(row).await?);
        }
        Ok(suites)
    }

    async fn row_to_suite(&self, row: SuiteRow) -> Result<Suite, sqlx::Error> {
        let data: SuiteData =
            serde_json::from_str(&row.data).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let state = row
            .state
            .parse::<SuiteState>()
            .map_err(|e| sqlx::Error::Decode(e.into()))?;
        let created_resources = self.created_resources(&row.id).await?;

        Ok(Suite {
            id: row.id,
            name: row.name,
            state,
            resources: data.resources,
            workers: data.workers,
            created_resources,
            created_at: row
                .created_at
                .parse::<DateTime<Utc>>()
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            updated_at: row
                .updated_at
                .parse::<DateTime<Utc>>()
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        })
    }

    // ==================== Created resources ====================

    async fn created_rows(
        &self,
        suite_id: &str,
        kind: Option<ResourceKind>,
    ) -> Result<Vec<CreatedRow>, sqlx::Error> {
        match kind {
            Some(kind) => {
                sqlx::query_as(
                    "SELECT kind, name FROM suite_created_resources WHERE suite_id = ? AND kind = ? ORDER BY seq",
                )
                .bind(suite_id)
                .bind(kind.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as(
                    "SELECT kind, name FROM suite_created_resources WHERE suite_id = ? ORDER BY seq",
                )
                .bind(suite_id)
                .fetch_all(&self.pool)
                .await
            }
        }
    }

    /// Kind -> names snapshot of a suite's created resources
    pub async fn created_resources(&self, suite_id: &str) -> Result<CreatedResources, sqlx::Error> {
        let mut map: BTreeMap<ResourceKind, Vec<String>> = BTreeMap::new();
        for row in self.created_rows(suite_id, None).await? {
            let kind = parse_kind(&row.kind).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
            map.entry(kind).or_default().push(row.name);
        }
        Ok(map.into())
    }
}

fn parse_kind(raw: &str) -> Result<ResourceKind, TrackerError> {
    raw.parse()
        .map_err(|_| TrackerError::UnknownKind(raw.to_string()))
}

#[async_trait]
impl TrackerStore for Database {
    async fn record(
        &self,
        suite_id: &str,
        kind: ResourceKind,
        name: &str,
    ) -> Result<(), TrackerError> {
        sqlx::query(INSERT_CREATED)
            .bind(suite_id)
            .bind(kind.as_str())
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn kinds(&self, suite_id: &str) -> Result<Vec<ResourceKind>, TrackerError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT kind FROM suite_created_resources WHERE suite_id = ?",
        )
        .bind(suite_id)
        .fetch_all(&self.pool)
        .await?;

        let mut kinds = rows
            .iter()
            .map(|(kind,)| parse_kind(kind))
            .collect::<Result<Vec<_>, _>>()?;
        kinds.sort();
        Ok(kinds)
    }

    async fn list(&self, suite_id: &str, kind: ResourceKind) -> Result<Vec<String>, TrackerError> {
        Ok(self
            .created_rows(suite_id, Some(kind))
            .await?
            .into_iter()
            .map(|row| row.name)
            .collect())
    }

    async fn replace(
        &self,
        suite_id: &str,
        kind: ResourceKind,
        names: Vec<String>,
    ) -> Result<(), TrackerError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM suite_created_resources WHERE suite_id = ? AND kind = ?")
            .bind(suite_id)
            .bind(kind.as_str())
            .execute(&mut *tx)
            .await?;
        for name in &names {
            sqlx::query(INSERT_CREATED)
                .bind(suite_id)
                .bind(kind.as_str())
                .bind(name)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn clear(&self, suite_id: &str) -> Result<(), TrackerError> {
        sqlx::query("DELETE FROM suite_created_resources WHERE suite_id = ?")
            .bind(suite_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
