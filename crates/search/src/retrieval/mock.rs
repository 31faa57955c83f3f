//! In-memory vector store for tests and offline runs

use super::retriever::{payload_number, payload_str};
use super::{VectorMatch, VectorQuery, VectorStore};
use clarus_common::config::PayloadFields;
use clarus_common::errors::{AppError, Result};
use serde_json::{json, Map};
use std::sync::Mutex;

/// Returns canned matches in insertion order and records every query.
///
/// A filter is honoured against the Dutch payload keys, so a reference
/// outside the canned verses yields no matches.
pub struct MockVectorStore {
    matches: Vec<VectorMatch>,
    failure: Option<String>,
    fields: PayloadFields,
    queries: Mutex<Vec<VectorQuery>>,
}

impl MockVectorStore {
    pub fn new(matches: Vec<VectorMatch>) -> Self {
        Self {
            matches,
            failure: None,
            fields: PayloadFields::default(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// A store whose every query fails with a vector store error
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::empty()
        }
    }

    /// A verse match with Dutch payload keys
    pub fn verse(book: &str, chapter: u32, verse: u32, text: &str, score: f32) -> VectorMatch {
        let mut metadata = Map::new();
        metadata.insert("tekst".to_string(), json!(text));
        metadata.insert("boek".to_string(), json!(book));
        metadata.insert("hoofdstuk".to_string(), json!(chapter));
        metadata.insert("vers".to_string(), json!(verse));

        VectorMatch {
            id: format!("{}-{}-{}", book.to_lowercase().replace(' ', "-"), chapter, verse),
            score,
            metadata,
        }
    }

    /// Every query received so far
    pub fn queries(&self) -> Vec<VectorQuery> {
        self.queries
            .lock()
            .map(|queries| queries.clone())
            .unwrap_or_default()
    }

    pub fn last_query(&self) -> Option<VectorQuery> {
        self.queries().pop()
    }

    fn accepts(&self, candidate: &VectorMatch, query: &VectorQuery) -> bool {
        let Some(filter) = &query.filter else {
            return true;
        };

        let book_matches = payload_str(&candidate.metadata, &[self.fields.book.as_str()])
            .is_some_and(|book| book == filter.book);
        let chapter_matches = filter.chapter.map_or(true, |chapter| {
            payload_number(&candidate.metadata, &[self.fields.chapter.as_str()]) == Some(chapter)
        });

        book_matches && chapter_matches
    }
}

#[async_trait::async_trait]
impl VectorStore for MockVectorStore {
    async fn query(&self, query: &VectorQuery) -> Result<Vec<VectorMatch>> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.clone());
        }

        if let Some(message) = &self.failure {
            return Err(AppError::VectorStore {
                message: message.clone(),
            });
        }

        Ok(self
            .matches
            .iter()
            .filter(|candidate| self.accepts(candidate, query))
            .take(query.top_k)
            .cloned()
            .collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::MetadataFilter;

    fn query(filter: Option<MetadataFilter>, top_k: usize) -> VectorQuery {
        VectorQuery {
            vector: vec![0.0; 4],
            top_k,
            filter,
        }
    }

    #[tokio::test]
    async fn test_filter_and_limit() {
        let store = MockVectorStore::new(vec![
            MockVectorStore::verse("Johannes", 3, 16, "Want zo lief", 0.9),
            MockVectorStore::verse("Johannes", 3, 17, "Want God heeft", 0.8),
            MockVectorStore::verse("Psalmen", 23, 1, "De HEERE is mijn Herder", 0.7),
        ]);

        let all = store.query(&query(None, 2)).await.unwrap();
        assert_eq!(all.len(), 2);

        let filter = MetadataFilter {
            book: "Psalmen".to_string(),
            chapter: Some(23),
        };
        let psalms = store.query(&query(Some(filter), 5)).await.unwrap();
        assert_eq!(psalms.len(), 1);
        assert_eq!(psalms[0].id, "psalmen-23-1");

        assert_eq!(store.queries().len(), 2);
        assert_eq!(store.last_query().unwrap().top_k, 5);
    }

    #[tokio::test]
    async fn test_failing_store_records_query() {
        let store = MockVectorStore::failing("quota exceeded");
        let err = store.query(&query(None, 1)).await.unwrap_err();
        assert!(matches!(err, AppError::VectorStore { .. }));
        assert!(store.last_query().is_some());
    }
}
