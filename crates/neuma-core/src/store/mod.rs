//! Vector-store collaborator used by the retrieval path.

mod embeddings;
mod local;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::NeumaError;

pub use embeddings::{Embedder, OpenAIEmbedder};
pub use local::{IndexedChunk, LocalStoreCatalog, LocalVectorStore};

/// One chunk returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    /// Provenance, usually the path of the source document.
    pub source: String,
    pub score: f32,
}

#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Up to `k` chunks, most similar first.
    async fn similarity_search(
        &self,
        query_text: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, NeumaError>;
}

/// Opens stores by their opaque name.
#[async_trait::async_trait]
pub trait VectorStoreProvider: Send + Sync {
    async fn open(&self, name: &str) -> Result<Arc<dyn VectorStore>, NeumaError>;
}
