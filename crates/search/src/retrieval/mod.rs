//! Scripture retrieval
//!
//! Embeds a query and searches the verse index:
//! - Pinecone over its HTTP data-plane API
//! - Mock store with canned matches (tests and offline runs)
//! - Optional exact-match filter on book and chapter
//!
//! Verse bounds are never part of the filter. The index stores one point per
//! verse, and numbering differs between translations.

mod filter;
mod mock;
mod pinecone;
mod retriever;

pub use filter::MetadataFilter;
pub use mock::MockVectorStore;
pub use pinecone::PineconeStore;
pub use retriever::ScriptureRetriever;

use clarus_common::config::VectorStoreConfig;
use clarus_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// A verse returned by the vector store
///
/// Serializes with the Dutch keys the chat model sees in tool results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalHit {
    #[serde(rename = "tekst")]
    pub text: String,

    #[serde(rename = "boek")]
    pub book: String,

    #[serde(rename = "hoofdstuk")]
    pub chapter: Option<u32>,

    #[serde(rename = "vers")]
    pub verse: Option<u32>,

    /// Similarity reported by the backend
    pub score: f32,
}

/// Retrieval mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// Nearest neighbours over the whole index
    Semantic,
    /// Nearest neighbours within one book and chapter
    Filtered,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::Semantic => "semantic",
            RetrievalMode::Filtered => "filtered",
        }
    }
}

/// Query sent to a vector store
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub top_k: usize,
    pub filter: Option<MetadataFilter>,
}

/// Raw match as returned by a vector store
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VectorMatch {
    pub id: String,

    #[serde(default)]
    pub score: f32,

    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Nearest-neighbour search with an optional metadata filter
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Matches ordered by descending similarity
    async fn query(&self, query: &VectorQuery) -> Result<Vec<VectorMatch>>;

    /// Backend name for logs
    fn name(&self) -> &str;
}

/// Create a vector store based on configuration
pub fn create_vector_store(config: &VectorStoreConfig) -> Result<Arc<dyn VectorStore>> {
    match config.provider.as_str() {
        "pinecone" => {
            let host = config.host.clone().ok_or_else(|| AppError::Configuration {
                message: "Pinecone host required (vector_store.host or PINECONE_HOST)".to_string(),
            })?;
            let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
                message: "Pinecone API key required (vector_store.api_key or PINECONE_API_KEY)"
                    .to_string(),
            })?;

            let store = PineconeStore::new(
                &host,
                api_key,
                config.namespace.clone(),
                config.fields.clone(),
                Duration::from_secs(config.timeout_secs),
            )?;

            tracing::info!(
                host = %store.host(),
                index = config.index.as_deref().unwrap_or("-"),
                "Pinecone vector store configured"
            );
            Ok(Arc::new(store))
        }
        "mock" => Ok(Arc::new(MockVectorStore::empty())),
        other => Err(AppError::Configuration {
            message: format!("Unknown vector store provider: {}", other),
        }),
    }
}
