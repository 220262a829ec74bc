//! Core data models for the support pipeline.
//!
//! These types represent the ingested issue documents, the chunk records
//! derived from them, and the passages that come back from retrieval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A self-contained tracker issue as written by the ingestion step.
///
/// The pipeline reads these but never mutates them. Unknown fields in the
/// JSON (state, labels, url, ...) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueDocument {
    /// Issue number within the tracker; the stable source-document id.
    pub number: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A single comment on an issue.
#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    /// Trackers emit numeric comment ids; normalized to a string here.
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Whether a chunk came from the issue body or from one of its comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Body,
    Comment,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Body => write!(f, "body"),
            SourceKind::Comment => write!(f, "comment"),
        }
    }
}

/// One durable chunk record, written by the chunk writer and consumed by
/// the indexer. `chunk_id` is a pure function of the provenance fields,
/// so re-chunking the same document reproduces identical ids and
/// re-indexing overwrites in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub issue_number: i64,
    pub source: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<String>,
    pub text: String,
}

impl ChunkRecord {
    /// Deterministic chunk identifier:
    /// `issue_{n}_body_{idx}` or `issue_{n}_comment_{cid}_{idx}`.
    pub fn make_id(
        issue_number: i64,
        source: SourceKind,
        comment_id: Option<&str>,
        sequence_index: usize,
    ) -> String {
        match source {
            SourceKind::Body => format!("issue_{}_body_{}", issue_number, sequence_index),
            SourceKind::Comment => format!(
                "issue_{}_comment_{}_{}",
                issue_number,
                comment_id.unwrap_or("x"),
                sequence_index
            ),
        }
    }
}

/// A passage returned from similarity retrieval, ranked best-first.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedPassage {
    pub text: String,
    pub issue_number: i64,
    pub source: SourceKind,
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(i64),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}
