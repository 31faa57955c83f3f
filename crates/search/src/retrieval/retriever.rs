//! Query embedding, vector search and payload decoding

use super::{MetadataFilter, RetrievalHit, RetrievalMode, VectorMatch, VectorQuery, VectorStore};
use clarus_common::config::PayloadFields;
use clarus_common::errors::Result;
use clarus_common::{metrics, Embedder, ScriptureReference};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;

/// English keys tried after the configured ones
const FALLBACK_FIELDS: [&str; 4] = ["text", "book", "chapter", "verse"];

/// Retrieves verses for a free-text query
pub struct ScriptureRetriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    fields: PayloadFields,
}

impl ScriptureRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        fields: PayloadFields,
    ) -> Self {
        Self {
            embedder,
            store,
            fields,
        }
    }

    /// Embed `query` and return up to `top_k` verses.
    ///
    /// With a reference the search is limited to its book and chapter.
    /// Matches without text are dropped; backend order is kept.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        reference: Option<&ScriptureReference>,
    ) -> Result<Vec<RetrievalHit>> {
        let start = Instant::now();
        let mode = if reference.is_some() {
            RetrievalMode::Filtered
        } else {
            RetrievalMode::Semantic
        };

        let vector = self.embedder.embed(query).await?;
        let request = VectorQuery {
            vector,
            top_k,
            filter: reference.map(MetadataFilter::for_reference),
        };

        let matches = self.store.query(&request).await.map_err(|e| {
            tracing::warn!(store = self.store.name(), error = %e, "Vector search failed");
            e
        })?;

        let received = matches.len();
        let hits: Vec<RetrievalHit> = matches.iter().filter_map(|m| self.decode(m)).collect();

        metrics::record_search(start.elapsed().as_secs_f64(), mode.as_str(), hits.len());

        let label = reference.map_or_else(|| "-".to_string(), ToString::to_string);
        tracing::debug!(
            mode = mode.as_str(),
            top_k,
            received,
            dropped = received - hits.len(),
            reference = %label,
            "Scripture retrieval completed"
        );

        Ok(hits)
    }

    fn decode(&self, candidate: &VectorMatch) -> Option<RetrievalHit> {
        let meta = &candidate.metadata;
        let [text_key, book_key, chapter_key, verse_key] = FALLBACK_FIELDS;

        let text = payload_str(meta, &[self.fields.text.as_str(), text_key])
            .filter(|text| !text.trim().is_empty())?;

        Some(RetrievalHit {
            text: text.to_string(),
            book: payload_str(meta, &[self.fields.book.as_str(), book_key])
                .unwrap_or_default()
                .to_string(),
            chapter: payload_number(meta, &[self.fields.chapter.as_str(), chapter_key]),
            verse: payload_number(meta, &[self.fields.verse.as_str(), verse_key]),
            score: candidate.score,
        })
    }
}

/// First string value found under `keys`
pub(crate) fn payload_str<'a>(meta: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| meta.get(*key).and_then(Value::as_str))
}

/// First non-negative whole number found under `keys`.
///
/// Vector stores keep numbers as floats, and older ingests wrote strings.
pub(crate) fn payload_number(meta: &Map<String, Value>, keys: &[&str]) -> Option<u32> {
    keys.iter().find_map(|key| match meta.get(*key)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u32>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u32::MAX as f64)
                    .map(|f| f as u32)
            })
        }
        _ => None,
    })
}
