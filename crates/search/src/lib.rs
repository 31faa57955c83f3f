//! Clarus Search
//!
//! Scripture retrieval for the chat tool loop:
//! - Query embedding through the shared `Embedder`
//! - Vector search with an optional book/chapter filter
//! - Verse payload decoding (Dutch keys with English fallbacks)

pub mod retrieval;

pub use retrieval::{
    create_vector_store, MetadataFilter, MockVectorStore, PineconeStore, RetrievalHit,
    RetrievalMode, ScriptureRetriever, VectorMatch, VectorQuery, VectorStore,
};
