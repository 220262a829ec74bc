//! SQLite-backed vector collection.
//!
//! A collection is identified by `(persist_dir, name)`. The `collections`
//! table pins the embedding model, dimensionality, and similarity metric
//! at creation time; reopening with a different model or dims is a
//! configuration error, which is what prevents mixing embedding models
//! in one collection. Entries are upserted with `ON CONFLICT ... DO
//! UPDATE`, and similarity queries are brute-force cosine over the
//! collection's vectors.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{PipelineError, Result};
use crate::models::{RetrievedPassage, SourceKind};

use super::{IndexedEntry, VectorStore};

const METRIC: &str = "cosine";

pub struct SqliteCollection {
    pool: SqlitePool,
    collection_id: i64,
    dims: usize,
}

impl SqliteCollection {
    /// Open (or create) the collection at `persist_dir/name`.
    ///
    /// Creation pins `(model, dims, cosine)`; opening an existing
    /// collection verifies they match.
    pub async fn open(persist_dir: &Path, name: &str, model: &str, dims: usize) -> Result<Self> {
        if dims == 0 {
            return Err(PipelineError::Config("embedding dims must be > 0".into()));
        }

        std::fs::create_dir_all(persist_dir).map_err(|e| {
            PipelineError::Store(format!(
                "failed to create {}: {}",
                persist_dir.display(),
                e
            ))
        })?;

        let db_path = persist_dir.join("store.sqlite");
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
            .map_err(|e| PipelineError::Store(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        migrate(&pool).await?;
        let collection_id = ensure_collection(&pool, name, model, dims).await?;

        Ok(Self {
            pool,
            collection_id,
            dims,
        })
    }

}

async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            metric TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            collection_id INTEGER NOT NULL,
            chunk_id TEXT NOT NULL,
            issue_number INTEGER NOT NULL,
            source TEXT NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            embedding BLOB NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (collection_id, chunk_id),
            FOREIGN KEY (collection_id) REFERENCES collections(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_collection ON entries(collection_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn ensure_collection(
    pool: &SqlitePool,
    name: &str,
    model: &str,
    dims: usize,
) -> Result<i64> {
    let existing = sqlx::query("SELECT id, model, dims, metric FROM collections WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    if let Some(row) = existing {
        let stored_model: String = row.get("model");
        let stored_dims: i64 = row.get("dims");
        let stored_metric: String = row.get("metric");

        if stored_model != model || stored_dims != dims as i64 {
            return Err(PipelineError::Config(format!(
                "collection '{}' was created with model '{}' ({} dims); \
                 refusing to open with model '{}' ({} dims)",
                name, stored_model, stored_dims, model, dims
            )));
        }
        if stored_metric != METRIC {
            return Err(PipelineError::Config(format!(
                "collection '{}' uses metric '{}', expected '{}'",
                name, stored_metric, METRIC
            )));
        }
        return Ok(row.get("id"));
    }

    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query(
        "INSERT INTO collections (name, model, dims, metric, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(name)
    .bind(model)
    .bind(dims as i64)
    .bind(METRIC)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

fn parse_source(source: &str) -> SourceKind {
    match source {
        "comment" => SourceKind::Comment,
        _ => SourceKind::Body,
    }
}

#[async_trait]
impl VectorStore for SqliteCollection {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn upsert(&self, entries: &[IndexedEntry]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for entry in entries {
            if entry.embedding.len() != self.dims {
                return Err(PipelineError::Config(format!(
                    "entry {} has {} dims, collection expects {}",
                    entry.chunk_id,
                    entry.embedding.len(),
                    self.dims
                )));
            }

            sqlx::query(
                r#"
                INSERT INTO entries (collection_id, chunk_id, issue_number, source, text, hash, embedding, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection_id, chunk_id) DO UPDATE SET
                    issue_number = excluded.issue_number,
                    source = excluded.source,
                    text = excluded.text,
                    hash = excluded.hash,
                    embedding = excluded.embedding,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(self.collection_id)
            .bind(&entry.chunk_id)
            .bind(entry.issue_number)
            .bind(entry.source.to_string())
            .bind(&entry.text)
            .bind(&entry.text_hash)
            .bind(vec_to_blob(&entry.embedding))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<RetrievedPassage>> {
        if embedding.len() != self.dims {
            return Err(PipelineError::Config(format!(
                "query embedding has {} dims, collection expects {}",
                embedding.len(),
                self.dims
            )));
        }

        let rows = sqlx::query(
            "SELECT chunk_id, issue_number, source, text, embedding FROM entries WHERE collection_id = ?",
        )
        .bind(self.collection_id)
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<(f32, String, RetrievedPassage)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vector = blob_to_vec(&blob);
                let similarity = cosine_similarity(embedding, &vector);
                let source: String = row.get("source");
                let chunk_id: String = row.get("chunk_id");
                let passage = RetrievedPassage {
                    text: row.get("text"),
                    issue_number: row.get("issue_number"),
                    source: parse_source(&source),
                };
                (similarity, chunk_id, passage)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });
        scored.truncate(top_k);

        Ok(scored.into_iter().map(|(_, _, p)| p).collect())
    }

    async fn entry_hash(&self, chunk_id: &str) -> Result<Option<String>> {
        let hash: Option<String> = sqlx::query_scalar(
            "SELECT hash FROM entries WHERE collection_id = ? AND chunk_id = ?",
        )
        .bind(self.collection_id)
        .bind(chunk_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(hash)
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE collection_id = ?")
            .bind(self.collection_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }
}
