//! Model backends used by the codelens retrieval pipeline.
//!
//! Generation and embedding go through [`LlmProvider`]; pairwise relevance
//! scoring goes through [`Reranker`].

#[cfg(feature = "candle")]
pub mod candle_provider;
pub mod error;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod provider;
pub mod rerank;
pub mod retry;

pub use error::LlmError;
pub use provider::{EmbedFn, GenerationOptions, LlmProvider, Message, Role, embed_fn};
pub use rerank::{LexicalReranker, Reranker};
