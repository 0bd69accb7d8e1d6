//! Chooses between a direct chat completion and a retrieval-augmented query.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::constants::retrieval::{CONTEXT_PLACEHOLDER, CONTEXT_SEPARATOR, TOP_K};
use crate::error::NeumaError;
use crate::llm::{Completion, LlmClient, Message, TokenUsage};
use crate::session::Session;
use crate::store::{RetrievedChunk, VectorStoreProvider};

/// Which branch served a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPath {
    Direct,
    Retrieval,
}

#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub text: String,
    pub usage: TokenUsage,
    /// Deduplicated source basenames, retrieval path only.
    pub sources: Vec<String>,
    pub path: QueryPath,
}

pub struct QueryDispatcher {
    llm: Arc<dyn LlmClient>,
    stores: Arc<dyn VectorStoreProvider>,
    top_k: usize,
}

impl QueryDispatcher {
    pub fn new(llm: Arc<dyn LlmClient>, stores: Arc<dyn VectorStoreProvider>) -> Self {
        Self {
            llm,
            stores,
            top_k: TOP_K,
        }
    }

    /// Run the completion for `messages`.
    ///
    /// The direct path appends the answer to the session's conversation; the
    /// retrieval path never does. On error nothing is appended.
    pub async fn dispatch(
        &self,
        messages: &[Message],
        session: &mut Session,
    ) -> Result<DispatchResult, NeumaError> {
        if session.config.uses_retrieval() {
            self.dispatch_retrieval(messages, session).await
        } else {
            self.dispatch_direct(messages, session).await
        }
    }

    async fn dispatch_direct(
        &self,
        messages: &[Message],
        session: &mut Session,
    ) -> Result<DispatchResult, NeumaError> {
        let params = session.config.sampling();
        tracing::debug!(model = %params.model, messages = messages.len(), "direct completion");

        let completion = self.llm.complete(messages, &params).await.map_err(as_provider_error)?;
        let usage = usage_or_default(&completion);

        session.conversation.add_assistant_message(completion.content.clone());

        Ok(DispatchResult {
            text: completion.content,
            usage,
            sources: Vec::new(),
            path: QueryPath::Direct,
        })
    }

    async fn dispatch_retrieval(
        &self,
        messages: &[Message],
        session: &Session,
    ) -> Result<DispatchResult, NeumaError> {
        let store_name = &session.config.active_vector_store;
        // The whole conversation so far is the query, not only the latest turn.
        let query = serde_json::to_string(messages)?;
        tracing::debug!(store = %store_name, query_chars = query.len(), "retrieval query");

        let store = self.stores.open(store_name).await.map_err(as_store_error)?;
        let chunks = store
            .similarity_search(&query, self.top_k)
            .await
            .map_err(as_store_error)?;

        let prompt = inject_context(&query, &chunks);
        let params = session.config.sampling();
        let completion = self
            .llm
            .complete(&[Message::user(prompt)], &params)
            .await
            .map_err(as_provider_error)?;
        let usage = usage_or_default(&completion);

        let sources = source_names(&chunks);
        let text = append_sources(&completion.content, &sources);

        Ok(DispatchResult {
            text,
            usage,
            sources,
            path: QueryPath::Retrieval,
        })
    }
}

/// Replace the context placeholder with the retrieved chunk texts.
///
/// Without a placeholder the retrieved context is dropped and the query is
/// sent unchanged.
pub fn inject_context(query: &str, chunks: &[RetrievedChunk]) -> String {
    if !query.contains(CONTEXT_PLACEHOLDER) {
        if !chunks.is_empty() {
            tracing::debug!("query has no context placeholder, retrieved context discarded");
        }
        return query.to_string();
    }
    let context = chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);
    query.replace(CONTEXT_PLACEHOLDER, &context)
}

/// Basenames of chunk sources in first-seen order, without duplicates.
pub fn source_names(chunks: &[RetrievedChunk]) -> Vec<String> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .map(|c| {
            Path::new(&c.source)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(c.source.as_str())
                .to_string()
        })
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .collect()
}

fn append_sources(answer: &str, sources: &[String]) -> String {
    if sources.is_empty() {
        answer.to_string()
    } else {
        format!("{}\n\n{}", answer, sources.join("\n"))
    }
}

fn usage_or_default(completion: &Completion) -> TokenUsage {
    match completion.usage {
        Some(usage) => usage,
        None => {
            tracing::debug!("provider reported no usage");
            TokenUsage::default()
        }
    }
}

fn as_provider_error(e: NeumaError) -> NeumaError {
    match e {
        NeumaError::Provider(_) => e,
        other => NeumaError::Provider(other.to_string()),
    }
}

fn as_store_error(e: NeumaError) -> NeumaError {
    match e {
        NeumaError::Store(_) => e,
        other => NeumaError::Store(other.to_string()),
    }
}
