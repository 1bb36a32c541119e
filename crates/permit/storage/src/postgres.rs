//! PostgreSQL adapter for the permit repository.
//!
//! Each permit is one row: the full snapshot as JSONB plus a few indexed
//! columns for listing. Saves are compare-and-swap on the `version`
//! column.

use crate::model::{PermitFilter, PermitUpdate, QueryWindow, StoredPermit};
use crate::traits::PermitRepository;
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use permit_types::{PermitEntity, PermitId};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};

/// PostgreSQL-backed permit repository.
#[derive(Clone)]
pub struct PostgresPermitRepository {
    pool: PgPool,
}

impl PostgresPermitRepository {
    /// Connect to PostgreSQL and initialize required schema.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 10, 5).await
    }

    /// Connect with explicit pool parameters.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to connect postgres: {e}")))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create adapter from an existing pool.
    pub async fn from_pool(pool: PgPool) -> StorageResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS permits (
                permit_id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                parent_id TEXT,
                department TEXT NOT NULL,
                status TEXT NOT NULL,
                assigned_to TEXT,
                snapshot JSONB NOT NULL,
                version BIGINT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS permits_parent_idx ON permits (parent_id)",
            "CREATE INDEX IF NOT EXISTS permits_status_idx ON permits (kind, status)",
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }

    async fn update_in(
        tx: &mut Transaction<'_, Postgres>,
        entity: &PermitEntity,
        expected_version: u64,
        now: DateTime<Utc>,
    ) -> StorageResult<StoredPermit> {
        let snapshot = serde_json::to_value(entity)?;
        let expected = to_i64(expected_version)?;

        let result = sqlx::query(
            r#"
            UPDATE permits
               SET status = $1,
                   assigned_to = $2,
                   snapshot = $3,
                   version = version + 1,
                   updated_at = $4
             WHERE permit_id = $5 AND version = $6
            "#,
        )
        .bind(entity.status.as_str())
        .bind(entity.assigned_to.map(|a| a.as_str()))
        .bind(snapshot)
        .bind(now)
        .bind(entity.id.as_str())
        .bind(expected)
        .execute(&mut **tx)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            let current = sqlx::query("SELECT version FROM permits WHERE permit_id = $1")
                .bind(entity.id.as_str())
                .fetch_optional(&mut **tx)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            return Err(match current {
                None => StorageError::NotFound(format!("permit {} not found", entity.id)),
                Some(row) => {
                    let version: i64 = row
                        .try_get("version")
                        .map_err(|e| StorageError::Backend(e.to_string()))?;
                    StorageError::Conflict(format!(
                        "permit {} is at version {}, expected {}",
                        entity.id, version, expected_version
                    ))
                }
            });
        }

        Ok(StoredPermit {
            entity: entity.clone(),
            version: expected_version + 1,
            updated_at: now,
        })
    }
}

#[async_trait]
impl PermitRepository for PostgresPermitRepository {
    async fn insert(&self, entity: &PermitEntity) -> StorageResult<StoredPermit> {
        let snapshot = serde_json::to_value(entity)?;
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO permits
                (permit_id, kind, parent_id, department, status, assigned_to, snapshot, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 1, $8, $9)
            "#,
        )
        .bind(entity.id.as_str())
        .bind(entity.kind.as_str())
        .bind(entity.parent_id.as_ref().map(|p| p.as_str()))
        .bind(entity.department.as_str())
        .bind(entity.status.as_str())
        .bind(entity.assigned_to.map(|a| a.as_str()))
        .bind(snapshot)
        .bind(entity.created_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        Ok(StoredPermit {
            entity: entity.clone(),
            version: 1,
            updated_at: now,
        })
    }

    async fn load(&self, id: &PermitId) -> StorageResult<StoredPermit> {
        let row = sqlx::query("SELECT snapshot, version, updated_at FROM permits WHERE permit_id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .ok_or_else(|| StorageError::NotFound(format!("permit {} not found", id)))?;
        row_to_stored(row)
    }

    async fn save(
        &self,
        entity: &PermitEntity,
        expected_version: u64,
    ) -> StorageResult<StoredPermit> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let stored = Self::update_in(&mut tx, entity, expected_version, Utc::now()).await?;
        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(stored)
    }

    async fn save_batch(&self, updates: &[PermitUpdate]) -> StorageResult<Vec<StoredPermit>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let now = Utc::now();
        let mut stored = Vec::with_capacity(updates.len());
        for update in updates {
            // an error drops `tx`, which rolls the batch back
            stored.push(Self::update_in(&mut tx, &update.entity, update.expected_version, now).await?);
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(stored)
    }

    async fn list(
        &self,
        filter: &PermitFilter,
        window: QueryWindow,
    ) -> StorageResult<Vec<StoredPermit>> {
        let rows = sqlx::query(
            r#"
            SELECT snapshot, version, updated_at
              FROM permits
             WHERE ($1::TEXT IS NULL OR kind = $1)
               AND ($2::TEXT IS NULL OR status = $2)
               AND ($3::TEXT IS NULL OR department = $3)
             ORDER BY created_at DESC, permit_id ASC
             LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.department.as_ref().map(|d| d.as_str()))
        .bind(to_i64(window.limit as u64)?)
        .bind(to_i64(window.offset as u64)?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter().map(row_to_stored).collect()
    }

    async fn children(&self, parent_id: &PermitId) -> StorageResult<Vec<StoredPermit>> {
        let rows = sqlx::query(
            "SELECT snapshot, version, updated_at FROM permits WHERE parent_id = $1 ORDER BY created_at ASC",
        )
        .bind(parent_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter().map(row_to_stored).collect()
    }
}

fn row_to_stored(row: PgRow) -> StorageResult<StoredPermit> {
    let snapshot: serde_json::Value = row
        .try_get("snapshot")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let version: i64 = row
        .try_get("version")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let updated_at: DateTime<Utc> = row
        .try_get("updated_at")
        .map_err(|e| StorageError::Backend(e.to_string()))?;

    Ok(StoredPermit {
        entity: serde_json::from_value(snapshot)?,
        version: u64::try_from(version)
            .map_err(|_| StorageError::Serialization(format!("negative version {version}")))?,
        updated_at,
    })
}

fn map_sqlx_conflict(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return StorageError::Conflict(db_err.message().to_string());
        }
    }
    StorageError::Backend(err.to_string())
}

fn to_i64(value: u64) -> StorageResult<i64> {
    i64::try_from(value).map_err(|_| StorageError::InvalidInput("value too large".to_string()))
}
