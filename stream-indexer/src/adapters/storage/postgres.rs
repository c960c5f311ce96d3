//! PostgreSQL projection store
//!
//! Documents live as JSONB rows keyed by (collection, key); the undo journal
//! is an append-only table ordered by a sequence.

use crate::core::{
    BlockRef, Collection, Domain, DocumentUpdate, IndexerResult, JournalEntry, ProjectionStore,
    StorageError,
};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tracing::info;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS projection_documents (
        collection TEXT NOT NULL,
        key TEXT NOT NULL,
        doc JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (collection, key)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS projection_journal (
        seq BIGSERIAL PRIMARY KEY,
        domain TEXT NOT NULL,
        block_index BIGINT NOT NULL,
        block_hash TEXT NOT NULL,
        collection TEXT NOT NULL,
        key TEXT NOT NULL,
        previous JSONB,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS projection_journal_block ON projection_journal (domain, block_hash, seq)",
    "CREATE INDEX IF NOT EXISTS projection_journal_height ON projection_journal (domain, block_index)",
];

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to PostgreSQL
    pub async fn connect(url: &str, max_connections: u32) -> IndexerResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        info!("PostgreSQL connected successfully");

        Ok(Self { pool })
    }

    /// Create the document and journal tables if they do not exist
    pub async fn ensure_schema(&self) -> IndexerResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProjectionStore for PostgresStore {
    async fn get(&self, collection: Collection, key: &str) -> IndexerResult<Option<Value>> {
        let row = sqlx::query("SELECT doc FROM projection_documents WHERE collection = $1 AND key = $2")
            .bind(collection.as_str())
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            Some(row) => Some(row.try_get("doc")?),
            None => None,
        })
    }

    async fn put(&self, collection: Collection, key: &str, doc: Value) -> IndexerResult<Option<Value>> {
        let query = r#"
            WITH previous AS (
                SELECT doc FROM projection_documents
                WHERE collection = $1 AND key = $2
                FOR UPDATE
            )
            INSERT INTO projection_documents (collection, key, doc)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, key) DO UPDATE SET
                doc = EXCLUDED.doc,
                updated_at = NOW()
            RETURNING (SELECT doc FROM previous) AS previous
        "#;

        let row = sqlx::query(query)
            .bind(collection.as_str())
            .bind(key)
            .bind(doc)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get("previous")?)
    }

    async fn delete(&self, collection: Collection, key: &str) -> IndexerResult<Option<Value>> {
        let row = sqlx::query("DELETE FROM projection_documents WHERE collection = $1 AND key = $2 RETURNING doc")
            .bind(collection.as_str())
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            Some(row) => Some(row.try_get("doc")?),
            None => None,
        })
    }

    async fn insert_if_absent(&self, collection: Collection, key: &str, doc: Value) -> IndexerResult<bool> {
        let result = sqlx::query(
            "INSERT INTO projection_documents (collection, key, doc) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(collection.as_str())
        .bind(key)
        .bind(doc)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update(&self, collection: Collection, key: &str, apply: DocumentUpdate) -> IndexerResult<Option<Value>> {
        let mut tx = self.pool.begin().await?;

        // Row locks miss keys that do not exist yet; the advisory lock covers both
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1 || '/' || $2, 0))")
            .bind(collection.as_str())
            .bind(key)
            .execute(&mut *tx)
            .await?;

        let previous: Option<Value> =
            sqlx::query("SELECT doc FROM projection_documents WHERE collection = $1 AND key = $2")
                .bind(collection.as_str())
                .bind(key)
                .fetch_optional(&mut *tx)
                .await?
                .map(|row| row.try_get::<Value, _>("doc"))
                .transpose()?;

        let next = apply(previous.clone())?;
        sqlx::query(
            r#"
            INSERT INTO projection_documents (collection, key, doc)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, key) DO UPDATE SET
                doc = EXCLUDED.doc,
                updated_at = NOW()
            "#,
        )
        .bind(collection.as_str())
        .bind(key)
        .bind(next)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(previous)
    }

    async fn find_by(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> IndexerResult<Vec<(String, Value)>> {
        let rows = sqlx::query(
            "SELECT key, doc FROM projection_documents WHERE collection = $1 AND doc -> $2 = $3 ORDER BY key",
        )
        .bind(collection.as_str())
        .bind(field)
        .bind(value)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> IndexerResult<(String, Value)> { Ok((row.try_get("key")?, row.try_get("doc")?)) })
            .collect()
    }

    async fn append_journal(
        &self,
        domain: Domain,
        block: &BlockRef,
        collection: Collection,
        key: &str,
        previous: Option<Value>,
    ) -> IndexerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO projection_journal (domain, block_index, block_hash, collection, key, previous)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(domain.as_str())
        .bind(block.index as i64)
        .bind(&block.hash)
        .bind(collection.as_str())
        .bind(key)
        .bind(previous)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_journal(&self, domain: Domain, block_hash: &str) -> IndexerResult<Vec<JournalEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT seq, collection, key, previous FROM projection_journal
            WHERE domain = $1 AND block_hash = $2
            ORDER BY seq
            "#,
        )
        .bind(domain.as_str())
        .bind(block_hash)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> IndexerResult<JournalEntry> {
                let name: String = row.try_get("collection")?;
                let key: String = row.try_get("key")?;
                let collection = Collection::parse(&name).ok_or_else(|| StorageError::CorruptDocument {
                    collection: name.clone(),
                    key: key.clone(),
                    reason: "unknown collection in journal".to_string(),
                })?;
                let seq: i64 = row.try_get("seq")?;

                Ok(JournalEntry {
                    seq: seq as u64,
                    collection,
                    key,
                    previous: row.try_get("previous")?,
                })
            })
            .collect()
    }

    async fn clear_journal(&self, domain: Domain, block_hash: &str) -> IndexerResult<()> {
        sqlx::query("DELETE FROM projection_journal WHERE domain = $1 AND block_hash = $2")
            .bind(domain.as_str())
            .bind(block_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn discard_journal_from(&self, domain: Domain, block_hash: &str, from_seq: u64) -> IndexerResult<()> {
        sqlx::query("DELETE FROM projection_journal WHERE domain = $1 AND block_hash = $2 AND seq >= $3")
            .bind(domain.as_str())
            .bind(block_hash)
            .bind(from_seq as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn prune_journal(&self, domain: Domain, below_index: u64) -> IndexerResult<u64> {
        let result = sqlx::query("DELETE FROM projection_journal WHERE domain = $1 AND block_index < $2")
            .bind(domain.as_str())
            .bind(below_index as i64)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> IndexerResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
