//! SQLite lead store.
//!
//! Each lead is stored as a JSON document next to the columns needed for
//! ranking queries. Good for:
//! - Local runs from the CLI
//! - Single-machine deployments
//! - Tests with persistent data

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

use crate::error::{StoreError, StoreResult};
use crate::traits::store::LeadStore;
use crate::types::lead::Lead;

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(Box::new(e))
}

/// SQLite-backed lead store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect and create the schema if needed.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - in-memory database (use [`Self::in_memory`])
    /// - `sqlite://leadgen.db?mode=rwc` - file-based, created if missing
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        Self::connect(database_url, 5).await
    }

    /// In-memory store. Single connection, since every SQLite memory
    /// connection is its own database.
    pub async fn in_memory() -> StoreResult<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(backend)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS leads (
                id TEXT PRIMARY KEY,
                company TEXT NOT NULL,
                industry TEXT NOT NULL,
                status TEXT NOT NULL,
                overall REAL NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL,
                body TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_leads_overall ON leads(overall DESC, id ASC);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[derive(FromRow)]
struct LeadRow {
    body: String,
}

impl LeadRow {
    fn into_lead(self) -> StoreResult<Lead> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

#[async_trait]
impl LeadStore for SqliteStore {
    async fn put(&self, lead: &Lead) -> StoreResult<()> {
        let body = serde_json::to_string(lead)?;
        let overall = lead.score().map(|s| s.overall()).unwrap_or(0.0);

        sqlx::query(
            r#"
            INSERT INTO leads (id, company, industry, status, overall, updated_at, body)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                company = excluded.company,
                industry = excluded.industry,
                status = excluded.status,
                overall = excluded.overall,
                updated_at = excluded.updated_at,
                body = excluded.body
            "#,
        )
        .bind(lead.id())
        .bind(&lead.company().name)
        .bind(lead.industry().as_str())
        .bind(lead.status().as_str())
        .bind(overall)
        .bind(lead.updated_at().to_rfc3339())
        .bind(&body)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Lead>> {
        let row = sqlx::query_as::<_, LeadRow>("SELECT body FROM leads WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(LeadRow::into_lead).transpose()
    }

    async fn query_top(&self, limit: usize) -> StoreResult<Vec<Lead>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, LeadRow>(
            "SELECT body FROM leads ORDER BY overall DESC, id ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(LeadRow::into_lead).collect()
    }

    async fn count(&self) -> StoreResult<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM leads")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
