//! Indexer: chunk records in, vector store entries out.
//!
//! Loads chunk record files, drops the ones whose stored hash already
//! matches, embeds the remainder in batches, and upserts the results.
//! A failed batch is logged and skipped so one flaky embedding call
//! does not abort a long run.

use std::path::Path;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::warn;
use walkdir::WalkDir;

use crate::embedding::EmbeddingClient;
use crate::error::{PipelineError, Result};
use crate::models::ChunkRecord;
use crate::store::{IndexedEntry, VectorStore};

/// Outcome counters for an indexing run.
#[derive(Debug, Default)]
pub struct IndexSummary {
    pub records_seen: u64,
    pub records_malformed: u64,
    pub records_unchanged: u64,
    pub entries_indexed: u64,
    pub batches_failed: u64,
}

/// Hex SHA-256 of a chunk's text, stored alongside the embedding so a
/// later run can tell whether the text changed.
pub fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Read every `*.json` chunk record under `data_dir`, sorted by file
/// name. Malformed records are counted and skipped.
pub fn load_chunk_records(data_dir: &Path) -> Result<(Vec<ChunkRecord>, u64)> {
    let mut records = Vec::new();
    let mut malformed = 0u64;

    for dir_entry in WalkDir::new(data_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let dir_entry = dir_entry.map_err(|e| PipelineError::Store(e.to_string()))?;
        let path = dir_entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable record");
                malformed += 1;
                continue;
            }
        };

        match serde_json::from_str::<ChunkRecord>(&content) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping malformed record");
                malformed += 1;
            }
        }
    }

    Ok((records, malformed))
}

/// Embed and upsert every changed chunk record under `data_dir`.
///
/// Errors only when nothing could be indexed at all: every embedding
/// batch failed. Partial failure is reported through the summary.
pub async fn run_index(
    data_dir: &Path,
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    batch_size: usize,
) -> Result<IndexSummary> {
    if batch_size == 0 {
        return Err(PipelineError::Config("batch_size must be > 0".into()));
    }

    let (records, malformed) = load_chunk_records(data_dir)?;
    let mut summary = IndexSummary {
        records_seen: records.len() as u64 + malformed,
        records_malformed: malformed,
        ..IndexSummary::default()
    };

    let mut pending: Vec<(ChunkRecord, String)> = Vec::new();
    for record in records {
        let hash = text_hash(&record.text);
        if store.entry_hash(&record.chunk_id).await? == Some(hash.clone()) {
            summary.records_unchanged += 1;
            continue;
        }
        pending.push((record, hash));
    }

    let mut attempted_batches = 0u64;
    for batch in pending.chunks(batch_size) {
        attempted_batches += 1;
        let texts: Vec<String> = batch.iter().map(|(r, _)| r.text.clone()).collect();

        let vectors = match embedder.embed_batch(&texts).await {
            Ok(vectors) => vectors,
            Err(e) => {
                warn!(
                    batch_size = batch.len(),
                    error = %e,
                    "embedding batch failed, skipping"
                );
                summary.batches_failed += 1;
                continue;
            }
        };

        let entries: Vec<IndexedEntry> = batch
            .iter()
            .zip(vectors)
            .map(|((record, hash), embedding)| IndexedEntry {
                chunk_id: record.chunk_id.clone(),
                text: record.text.clone(),
                embedding,
                issue_number: record.issue_number,
                source: record.source,
                text_hash: hash.clone(),
            })
            .collect();

        store.upsert(&entries).await?;
        summary.entries_indexed += entries.len() as u64;
    }

    if attempted_batches > 0 && summary.batches_failed == attempted_batches {
        return Err(PipelineError::EmbeddingService(format!(
            "all {} embedding batches failed",
            attempted_batches
        )));
    }

    Ok(summary)
}
