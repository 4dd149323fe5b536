//! Directory-aware chunking, vector indexing and reranked retrieval.
//!
//! Index path: [`scanner`] walks the tree, [`chunker`] splits each file into
//! bounded fragments, and [`store::VectorIndex`] embeds and persists them.
//! Query path: [`expander`] augments the query, the index returns an
//! oversampled pool, [`retriever`] reranks it against the literal query and
//! [`format`] renders the citation block.

pub mod chunker;
pub mod collection;
pub mod error;
pub mod expander;
pub mod format;
pub mod in_memory_store;
pub mod indexer;
pub mod languages;
pub mod qdrant_ops;
pub mod retriever;
pub mod scanner;
pub mod sqlite_store;
pub mod store;
pub mod vector_store;

pub use error::{ErrorKind, IndexError, Result};
