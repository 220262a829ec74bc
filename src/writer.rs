//! Chunk store writer.
//!
//! Turns ingested issue documents into durable chunk records: the issue
//! title+body is chunked as `source = body`, and each comment body is
//! chunked independently as `source = comment`. One JSON record file is
//! written per chunk, named by its deterministic chunk id, so a re-run
//! over the same documents rewrites identical files.

use std::path::Path;

use tracing::warn;
use walkdir::WalkDir;

use crate::chunker::{chunk_text, detokenize};
use crate::error::{PipelineError, Result};
use crate::models::{ChunkRecord, IssueDocument, SourceKind};

/// Outcome counters for a chunking run.
#[derive(Debug, Default)]
pub struct ChunkSummary {
    pub documents: u64,
    pub skipped: u64,
    pub chunks_written: u64,
}

/// Chunk one document into records (no I/O).
pub fn chunk_document(
    doc: &IssueDocument,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<ChunkRecord>> {
    let mut records = Vec::new();

    let body_text = format!("{} {}", doc.title, doc.body);
    for (idx, tokens) in chunk_text(body_text.trim(), chunk_size, overlap)?
        .iter()
        .enumerate()
    {
        records.push(ChunkRecord {
            chunk_id: ChunkRecord::make_id(doc.number, SourceKind::Body, None, idx),
            issue_number: doc.number,
            source: SourceKind::Body,
            comment_id: None,
            text: detokenize(tokens),
        });
    }

    for comment in &doc.comments {
        for (idx, tokens) in chunk_text(&comment.body, chunk_size, overlap)?
            .iter()
            .enumerate()
        {
            records.push(ChunkRecord {
                chunk_id: ChunkRecord::make_id(
                    doc.number,
                    SourceKind::Comment,
                    Some(&comment.id),
                    idx,
                ),
                issue_number: doc.number,
                source: SourceKind::Comment,
                comment_id: Some(comment.id.clone()),
                text: detokenize(tokens),
            });
        }
    }

    Ok(records)
}

/// Read every `*.json` document under `input_dir`, chunk it, and write
/// one record file per chunk into `output_dir`.
///
/// A document that fails to parse is skipped with a warning; the rest of
/// the run continues. Invalid chunking parameters abort immediately.
pub fn run_chunk(
    input_dir: &Path,
    output_dir: &Path,
    chunk_size: usize,
    overlap: usize,
) -> Result<ChunkSummary> {
    crate::config::validate_chunking(chunk_size, overlap)?;

    std::fs::create_dir_all(output_dir).map_err(|e| {
        PipelineError::Store(format!("failed to create {}: {}", output_dir.display(), e))
    })?;

    let mut summary = ChunkSummary::default();

    for dir_entry in WalkDir::new(input_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let dir_entry = dir_entry.map_err(|e| PipelineError::Store(e.to_string()))?;
        let path = dir_entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        let doc = match read_document(path) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping malformed document");
                summary.skipped += 1;
                continue;
            }
        };

        let records = chunk_document(&doc, chunk_size, overlap)?;
        for record in &records {
            let out_path = output_dir.join(format!("{}.json", record.chunk_id));
            let json = serde_json::to_string_pretty(record)
                .map_err(|e| PipelineError::Store(e.to_string()))?;
            std::fs::write(&out_path, json).map_err(|e| {
                PipelineError::Store(format!("failed to write {}: {}", out_path.display(), e))
            })?;
        }

        summary.documents += 1;
        summary.chunks_written += records.len() as u64;
    }

    Ok(summary)
}

fn read_document(path: &Path) -> Result<IssueDocument> {
    let content = std::fs::read_to_string(path).map_err(|e| PipelineError::IngestionFormat {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    serde_json::from_str(&content).map_err(|e| PipelineError::IngestionFormat {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
