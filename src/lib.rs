//! # Issue Pilot
//!
//! A retrieval-augmented question-answering pipeline over GitHub issue
//! archives, built for Apache Solr support workflows.
//!
//! Issue documents are chunked into deterministic, id-stable records,
//! embedded and upserted into a local vector store, and served back at
//! query time as citation-numbered context for an LLM answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────┐   ┌───────────┐
//! │  Issues   │──▶│ Chunker  │──▶│  Indexer  │
//! │  (JSON)   │   │ + Writer │   │ embed+put │
//! └───────────┘   └──────────┘   └─────┬─────┘
//!                                      ▼
//!                                ┌───────────┐
//!                                │  SQLite   │
//!                                │  vectors  │
//!                                └─────┬─────┘
//!                                      ▼
//!                  ┌───────────┐  ┌───────────┐  ┌───────────┐
//!                  │ Retriever │─▶│  Prompt   │─▶│    LLM    │
//!                  └───────────┘  └───────────┘  └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pilot chunk --input-dir ./issues --output-dir ./chunks
//! pilot index --data-dir ./chunks
//! pilot ask "why does my replica stay in recovery?"
//! pilot tool list
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`chunker`] | Deterministic token-window chunking |
//! | [`writer`] | Chunk record files on disk |
//! | [`embedding`] | Embedding client abstraction |
//! | [`store`] | Vector store backends |
//! | [`indexer`] | Batch embedding and upsert |
//! | [`retriever`] | Query-time similarity search |
//! | [`prompt`] | Grounded prompt assembly |
//! | [`llm`] | Completion client |
//! | [`pipeline`] | End-to-end answer orchestration |
//! | [`tools`] | Agent-facing tools |

pub mod chunker;
pub mod config;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod retriever;
pub mod store;
pub mod tools;
pub mod writer;
