use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::constants::retrieval::INDEX_FILE;
use crate::error::NeumaError;
use crate::store::{Embedder, RetrievedChunk, VectorStore, VectorStoreProvider};

/// A chunk with its precomputed embedding, as stored in `index.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub content: String,
    pub source: String,
    pub embedding: Vec<f32>,
}

/// A topic store loaded from a prebuilt index, ranked by cosine similarity.
pub struct LocalVectorStore {
    chunks: Vec<IndexedChunk>,
    embedder: Arc<dyn Embedder>,
}

impl LocalVectorStore {
    pub fn new(chunks: Vec<IndexedChunk>, embedder: Arc<dyn Embedder>) -> Self {
        Self { chunks, embedder }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait::async_trait]
impl VectorStore for LocalVectorStore {
    async fn similarity_search(
        &self,
        query_text: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, NeumaError> {
        if self.chunks.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query = self.embedder.embed(query_text).await?;
        let mut scored: Vec<(f32, &IndexedChunk)> = self
            .chunks
            .iter()
            .map(|chunk| (cosine_similarity(&query, &chunk.embedding), chunk))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, chunk)| RetrievedChunk {
                content: chunk.content.clone(),
                source: chunk.source.clone(),
                score,
            })
            .collect())
    }
}

/// Topic stores kept as directories under one persist folder.
pub struct LocalStoreCatalog {
    persist_folder: PathBuf,
    embedder: Arc<dyn Embedder>,
}

impl LocalStoreCatalog {
    pub fn new(persist_folder: impl Into<PathBuf>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            persist_folder: persist_folder.into(),
            embedder,
        }
    }

    fn store_dir(&self, name: &str) -> Result<PathBuf, NeumaError> {
        let invalid = name.is_empty()
            || name.starts_with('.')
            || name.contains(['/', '\\'])
            || name.contains("..");
        if invalid {
            return Err(NeumaError::Store(format!("Invalid store name: {:?}", name)));
        }
        Ok(self.persist_folder.join(name))
    }

    /// Names of all stores, sorted. A missing persist folder means no stores.
    pub fn list(&self) -> Result<Vec<String>, NeumaError> {
        if !self.persist_folder.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.persist_folder)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Make sure the store's directory exists so it can be selected.
    pub fn ensure(&self, name: &str) -> Result<PathBuf, NeumaError> {
        let dir = self.store_dir(name)?;
        fs::create_dir_all(&dir)
            .map_err(|e| NeumaError::Store(format!("Failed to create store {}: {}", name, e)))?;
        Ok(dir)
    }

    /// Remove a store and its index.
    pub fn trash(&self, name: &str) -> Result<(), NeumaError> {
        let dir = self.store_dir(name)?;
        if !dir.is_dir() {
            return Err(NeumaError::Store(format!("Store not found: {}", name)));
        }
        fs::remove_dir_all(&dir)
            .map_err(|e| NeumaError::Store(format!("Failed to remove store {}: {}", name, e)))?;
        tracing::info!(store = name, "vector store trashed");
        Ok(())
    }

    fn load_index(&self, dir: &Path) -> Result<Vec<IndexedChunk>, NeumaError> {
        let path = dir.join(INDEX_FILE);
        if !path.exists() {
            tracing::warn!(path = %path.display(), "store has no index, searches return nothing");
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| NeumaError::Store(format!("Failed to read index: {}", e)))?;
        serde_json::from_str(&content)
            .map_err(|e| NeumaError::Store(format!("Failed to parse index: {}", e)))
    }
}

#[async_trait::async_trait]
impl VectorStoreProvider for LocalStoreCatalog {
    async fn open(&self, name: &str) -> Result<Arc<dyn VectorStore>, NeumaError> {
        let dir = self.store_dir(name)?;
        if !dir.is_dir() {
            return Err(NeumaError::Store(format!("Store not found: {}", name)));
        }
        let chunks = self.load_index(&dir)?;
        tracing::debug!(store = name, chunks = chunks.len(), "vector store opened");
        Ok(Arc::new(LocalVectorStore::new(chunks, self.embedder.clone())))
    }
}
